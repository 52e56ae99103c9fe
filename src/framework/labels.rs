//! 데이터 축 레이블

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 프레임워크 데이터 컨테이너의 축 이름
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionLabel {
    Channel,
    Vertical,
    HorizontalY,
    HorizontalX,
    Angle,
    Horizontal,
}

impl DimensionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionLabel::Channel => "channel",
            DimensionLabel::Vertical => "vertical",
            DimensionLabel::HorizontalY => "horizontal_y",
            DimensionLabel::HorizontalX => "horizontal_x",
            DimensionLabel::Angle => "angle",
            DimensionLabel::Horizontal => "horizontal",
        }
    }

    /// 이미지(볼륨) 지오메트리에 허용되는 레이블
    pub const IMAGE: [DimensionLabel; 4] = [
        DimensionLabel::Channel,
        DimensionLabel::Vertical,
        DimensionLabel::HorizontalY,
        DimensionLabel::HorizontalX,
    ];

    /// 획득(사이노그램) 지오메트리에 허용되는 레이블
    pub const ACQUISITION: [DimensionLabel; 4] = [
        DimensionLabel::Channel,
        DimensionLabel::Vertical,
        DimensionLabel::Angle,
        DimensionLabel::Horizontal,
    ];
}

impl fmt::Display for DimensionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel" => Ok(DimensionLabel::Channel),
            "vertical" => Ok(DimensionLabel::Vertical),
            "horizontal_y" => Ok(DimensionLabel::HorizontalY),
            "horizontal_x" => Ok(DimensionLabel::HorizontalX),
            "angle" => Ok(DimensionLabel::Angle),
            "horizontal" => Ok(DimensionLabel::Horizontal),
            other => Err(format!("unknown dimension label '{}'", other)),
        }
    }
}
