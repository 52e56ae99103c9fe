//! ASTRA 축 순서 검사
//!
//! 툴박스는 볼륨을 (vertical, horizontal_y, horizontal_x), 투영을
//! (vertical, angle, horizontal) 순서로만 받는다. 순서가 다르면 재배열하지
//! 않고 거부한다.

use crate::error::{AstraError, Result};
use crate::framework::DimensionLabel;
use crate::framework::DimensionLabel::{Angle, Channel, Horizontal, HorizontalX, HorizontalY, Vertical};

pub const ASTRA_LABELS_VOL_3D: [DimensionLabel; 3] = [Vertical, HorizontalY, HorizontalX];
pub const ASTRA_LABELS_PROJ_3D: [DimensionLabel; 3] = [Vertical, Angle, Horizontal];
pub const ASTRA_LABELS_VOL_2D: [DimensionLabel; 2] = [HorizontalY, HorizontalX];
pub const ASTRA_LABELS_PROJ_2D: [DimensionLabel; 2] = [Angle, Horizontal];

/// 관측된 축 순서를 2D/3D 기대 순서와 비교
pub fn validate(
    observed: &[DimensionLabel],
    expected_2d: &[DimensionLabel],
    expected_3d: &[DimensionLabel],
) -> Result<()> {
    let expected = match observed.len() {
        2 => expected_2d,
        3 => expected_3d,
        n => return Err(AstraError::UnsupportedDimensionality(n)),
    };
    if observed != expected {
        return Err(AstraError::DimensionOrder {
            expected: expected.to_vec(),
            found: observed.to_vec(),
        });
    }
    Ok(())
}

/// 데이터의 역할별 고정 순서
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Volume,
    Projection,
}

impl Role {
    pub fn expected_2d(&self) -> &'static [DimensionLabel] {
        match self {
            Role::Volume => &ASTRA_LABELS_VOL_2D,
            Role::Projection => &ASTRA_LABELS_PROJ_2D,
        }
    }

    pub fn expected_3d(&self) -> &'static [DimensionLabel] {
        match self {
            Role::Volume => &ASTRA_LABELS_VOL_3D,
            Role::Projection => &ASTRA_LABELS_PROJ_3D,
        }
    }

    pub fn check(&self, observed: &[DimensionLabel]) -> Result<()> {
        validate(observed, self.expected_2d(), self.expected_3d())
    }
}

/// 맨 앞 channel 축 + 역할별 순서
pub fn validate_multichannel(observed: &[DimensionLabel], role: Role) -> Result<()> {
    match observed.split_first() {
        Some((&Channel, rest)) if rest.len() == 2 || rest.len() == 3 => role.check(rest),
        Some((&Channel, rest)) => Err(AstraError::UnsupportedDimensionality(rest.len())),
        _ => {
            let spatial = if observed.len() == 4 {
                role.expected_3d()
            } else {
                role.expected_2d()
            };
            let mut expected = vec![Channel];
            expected.extend_from_slice(spatial);
            Err(AstraError::DimensionOrder {
                expected,
                found: observed.to_vec(),
            })
        }
    }
}
