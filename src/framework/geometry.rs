//! 프레임워크 지오메트리: 재구성 볼륨(ImageGeometry)과 획득 데이터(AcquisitionGeometry)

use crate::error::{AstraError, Result};
use crate::framework::container::{DataContainer, FillMode};
use crate::framework::labels::DimensionLabel;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::Debug;

/// 데이터 컨테이너의 형상을 결정하는 지오메트리 공통 인터페이스
pub trait Geometry: Clone + Debug {
    /// 축 레이블 (저장 순서대로)
    fn dimension_labels(&self) -> &[DimensionLabel];

    /// 레이블에 해당하는 축 크기. 이 지오메트리에 없는 축이면 None
    fn size_of(&self, label: DimensionLabel) -> Option<usize>;

    fn channels(&self) -> usize;

    /// 레이블 순서에 따른 배열 형상
    fn shape(&self) -> Vec<usize> {
        self.dimension_labels()
            .iter()
            .map(|&label| self.size_of(label).unwrap_or(0))
            .collect()
    }

    /// 같은 레이블 순서와 형상을 갖는지 확인
    fn is_compatible(&self, other: &Self) -> bool {
        self.dimension_labels() == other.dimension_labels() && self.shape() == other.shape()
    }

    /// 이 지오메트리로 태그된 새 컨테이너 할당
    fn allocate(&self, mode: FillMode) -> DataContainer<Self>
    where
        Self: Sized,
    {
        DataContainer::allocate(self.clone(), mode)
    }
}

/// 주어진 레이블 목록이 기본 레이블 집합의 순열인지 검사
///
/// 순서 자체는 여기서 강제하지 않는다 (ASTRA 순서 검사는 validate 모듈 담당).
fn check_label_set(
    labels: &[DimensionLabel],
    defaults: &[DimensionLabel],
    allowed: &[DimensionLabel],
    kind: &str,
) -> Result<()> {
    for (i, label) in labels.iter().enumerate() {
        if !allowed.contains(label) {
            return Err(AstraError::UnsupportedGeometry(format!(
                "label '{}' is not valid for {} geometry",
                label, kind
            )));
        }
        if labels[..i].contains(label) {
            return Err(AstraError::UnsupportedGeometry(format!(
                "label '{}' appears more than once",
                label
            )));
        }
    }
    if labels.len() != defaults.len() || defaults.iter().any(|d| !labels.contains(d)) {
        return Err(AstraError::UnsupportedGeometry(format!(
            "{} geometry has axes {:?}, labels {:?} do not cover them",
            kind, defaults, labels
        )));
    }
    Ok(())
}

/// numpy.linspace와 같은 등간격 값 (끝점 포함)
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

/// 재구성 볼륨 격자
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub voxel_num_x: usize,
    pub voxel_num_y: usize,
    /// 0이면 2D 이미지
    pub voxel_num_z: usize,
    pub voxel_size_x: f64,
    pub voxel_size_y: f64,
    pub voxel_size_z: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub center_z: f64,
    pub channels: usize,
    dimension_labels: Vec<DimensionLabel>,
}

impl ImageGeometry {
    /// 2D 단일 채널 이미지 (voxel_num_y x voxel_num_x)
    pub fn new(voxel_num_x: usize, voxel_num_y: usize) -> Self {
        let mut geometry = Self {
            voxel_num_x,
            voxel_num_y,
            voxel_num_z: 0,
            voxel_size_x: 1.0,
            voxel_size_y: 1.0,
            voxel_size_z: 1.0,
            center_x: 0.0,
            center_y: 0.0,
            center_z: 0.0,
            channels: 1,
            dimension_labels: Vec::new(),
        };
        geometry.dimension_labels = geometry.default_labels();
        geometry
    }

    /// 슬라이스 수 지정 (3D). 레이블은 기본 순서로 재설정된다
    pub fn with_slices(mut self, voxel_num_z: usize) -> Self {
        self.voxel_num_z = voxel_num_z;
        self.dimension_labels = self.default_labels();
        self
    }

    /// 채널 수 지정. 레이블은 기본 순서로 재설정된다
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self.dimension_labels = self.default_labels();
        self
    }

    pub fn with_voxel_size(mut self, x: f64, y: f64, z: f64) -> Self {
        self.voxel_size_x = x;
        self.voxel_size_y = y;
        self.voxel_size_z = z;
        self
    }

    pub fn with_center(mut self, x: f64, y: f64, z: f64) -> Self {
        self.center_x = x;
        self.center_y = y;
        self.center_z = z;
        self
    }

    /// 축 순서 지정. 축 집합은 지오메트리와 일치해야 하지만 순서는 자유롭다
    pub fn with_dimension_labels(mut self, labels: Vec<DimensionLabel>) -> Result<Self> {
        check_label_set(&labels, &self.default_labels(), &DimensionLabel::IMAGE, "image")?;
        self.dimension_labels = labels;
        Ok(self)
    }

    /// 채널 축을 제외한 공간 차원 수
    pub fn spatial_ndim(&self) -> usize {
        if self.voxel_num_z > 0 {
            3
        } else {
            2
        }
    }

    /// 채널 수 1의 축소 지오메트리 (채널 축 제거, 나머지 순서 유지)
    pub fn single_channel(&self) -> Self {
        let mut reduced = self.clone();
        reduced.channels = 1;
        reduced
            .dimension_labels
            .retain(|&label| label != DimensionLabel::Channel);
        reduced
    }

    fn default_labels(&self) -> Vec<DimensionLabel> {
        let mut labels = Vec::with_capacity(4);
        if self.channels > 1 {
            labels.push(DimensionLabel::Channel);
        }
        if self.voxel_num_z > 0 {
            labels.push(DimensionLabel::Vertical);
        }
        labels.push(DimensionLabel::HorizontalY);
        labels.push(DimensionLabel::HorizontalX);
        labels
    }
}

impl Geometry for ImageGeometry {
    fn dimension_labels(&self) -> &[DimensionLabel] {
        &self.dimension_labels
    }

    fn size_of(&self, label: DimensionLabel) -> Option<usize> {
        match label {
            DimensionLabel::Channel => Some(self.channels),
            DimensionLabel::Vertical => Some(self.voxel_num_z),
            DimensionLabel::HorizontalY => Some(self.voxel_num_y),
            DimensionLabel::HorizontalX => Some(self.voxel_num_x),
            _ => None,
        }
    }

    fn channels(&self) -> usize {
        self.channels
    }
}

/// 빔 형태
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BeamGeometry {
    Parallel,
    /// 선원-회전중심, 회전중심-검출기 거리
    Cone {
        source_to_center: f64,
        center_to_detector: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleUnit {
    Radian,
    Degree,
}

/// 획득(사이노그램) 지오메트리
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionGeometry {
    pub beam: BeamGeometry,
    /// 라디안 단위 투영 각도
    pub angles: Vec<f64>,
    pub pixel_num_h: usize,
    pub pixel_size_h: f64,
    /// 0이면 2D 획득
    pub pixel_num_v: usize,
    pub pixel_size_v: f64,
    /// 검출기 중심 오프셋 (가로, 세로)
    pub detector_offset_h: f64,
    pub detector_offset_v: f64,
    /// 회전축의 가로 방향 이동량
    pub rotation_axis_offset: f64,
    pub channels: usize,
    dimension_labels: Vec<DimensionLabel>,
}

impl AcquisitionGeometry {
    fn build(beam: BeamGeometry, angles: &[f64], unit: AngleUnit, h: usize, v: usize) -> Self {
        let angles = match unit {
            AngleUnit::Radian => angles.to_vec(),
            AngleUnit::Degree => angles.iter().map(|a| a * PI / 180.0).collect(),
        };
        let mut geometry = Self {
            beam,
            angles,
            pixel_num_h: h,
            pixel_size_h: 1.0,
            pixel_num_v: v,
            pixel_size_v: 1.0,
            detector_offset_h: 0.0,
            detector_offset_v: 0.0,
            rotation_axis_offset: 0.0,
            channels: 1,
            dimension_labels: Vec::new(),
        };
        geometry.dimension_labels = geometry.default_labels();
        geometry
    }

    pub fn parallel_2d(angles: &[f64], unit: AngleUnit, pixel_num_h: usize) -> Self {
        Self::build(BeamGeometry::Parallel, angles, unit, pixel_num_h, 0)
    }

    pub fn parallel_3d(angles: &[f64], unit: AngleUnit, pixel_num_h: usize, pixel_num_v: usize) -> Self {
        Self::build(BeamGeometry::Parallel, angles, unit, pixel_num_h, pixel_num_v)
    }

    /// 팬빔 (2D 콘빔)
    pub fn cone_2d(
        angles: &[f64],
        unit: AngleUnit,
        pixel_num_h: usize,
        source_to_center: f64,
        center_to_detector: f64,
    ) -> Self {
        let beam = BeamGeometry::Cone { source_to_center, center_to_detector };
        Self::build(beam, angles, unit, pixel_num_h, 0)
    }

    pub fn cone_3d(
        angles: &[f64],
        unit: AngleUnit,
        pixel_num_h: usize,
        pixel_num_v: usize,
        source_to_center: f64,
        center_to_detector: f64,
    ) -> Self {
        let beam = BeamGeometry::Cone { source_to_center, center_to_detector };
        Self::build(beam, angles, unit, pixel_num_h, pixel_num_v)
    }

    pub fn with_pixel_size(mut self, h: f64, v: f64) -> Self {
        self.pixel_size_h = h;
        self.pixel_size_v = v;
        self
    }

    pub fn with_detector_offset(mut self, h: f64, v: f64) -> Self {
        self.detector_offset_h = h;
        self.detector_offset_v = v;
        self
    }

    pub fn with_rotation_axis_offset(mut self, offset: f64) -> Self {
        self.rotation_axis_offset = offset;
        self
    }

    /// 채널 수 지정. 레이블은 기본 순서로 재설정된다
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self.dimension_labels = self.default_labels();
        self
    }

    pub fn with_dimension_labels(mut self, labels: Vec<DimensionLabel>) -> Result<Self> {
        check_label_set(
            &labels,
            &self.default_labels(),
            &DimensionLabel::ACQUISITION,
            "acquisition",
        )?;
        self.dimension_labels = labels;
        Ok(self)
    }

    pub fn num_angles(&self) -> usize {
        self.angles.len()
    }

    pub fn spatial_ndim(&self) -> usize {
        if self.pixel_num_v > 0 {
            3
        } else {
            2
        }
    }

    pub fn single_channel(&self) -> Self {
        let mut reduced = self.clone();
        reduced.channels = 1;
        reduced
            .dimension_labels
            .retain(|&label| label != DimensionLabel::Channel);
        reduced
    }

    fn default_labels(&self) -> Vec<DimensionLabel> {
        let mut labels = Vec::with_capacity(4);
        if self.channels > 1 {
            labels.push(DimensionLabel::Channel);
        }
        if self.pixel_num_v > 0 {
            labels.push(DimensionLabel::Vertical);
        }
        labels.push(DimensionLabel::Angle);
        labels.push(DimensionLabel::Horizontal);
        labels
    }
}

impl Geometry for AcquisitionGeometry {
    fn dimension_labels(&self) -> &[DimensionLabel] {
        &self.dimension_labels
    }

    fn size_of(&self, label: DimensionLabel) -> Option<usize> {
        match label {
            DimensionLabel::Channel => Some(self.channels),
            DimensionLabel::Vertical => Some(self.pixel_num_v),
            DimensionLabel::Angle => Some(self.angles.len()),
            DimensionLabel::Horizontal => Some(self.pixel_num_h),
            _ => None,
        }
    }

    fn channels(&self) -> usize {
        self.channels
    }
}
