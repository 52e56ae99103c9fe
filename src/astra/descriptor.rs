//! 툴박스 네이티브 지오메트리 기술자
//!
//! ASTRA의 볼륨 지오메트리 딕셔너리와 벡터형 투영 지오메트리
//! (`parallel3d_vec`, `cone_vec`)에 대응한다. 배열 형상 규약:
//! 볼륨은 (slices, rows, cols), 투영은 (det_rows, angles, det_cols).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// 볼륨 격자와 월드 좌표 창(window)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGeometry3D {
    pub cols: usize,
    pub rows: usize,
    pub slices: usize,
    /// (x, y, z) 최소 좌표
    pub window_min: [f64; 3],
    /// (x, y, z) 최대 좌표
    pub window_max: [f64; 3],
}

impl VolumeGeometry3D {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.slices, self.rows, self.cols)
    }

    pub fn voxel_size(&self) -> Vector3<f64> {
        Vector3::new(
            (self.window_max[0] - self.window_min[0]) / self.cols as f64,
            (self.window_max[1] - self.window_min[1]) / self.rows as f64,
            (self.window_max[2] - self.window_min[2]) / self.slices as f64,
        )
    }

    /// 복셀 (z, y, x) 중심의 월드 좌표
    pub fn voxel_center(&self, z: usize, y: usize, x: usize) -> Vector3<f64> {
        let size = self.voxel_size();
        Vector3::new(
            self.window_min[0] + (x as f64 + 0.5) * size.x,
            self.window_min[1] + (y as f64 + 0.5) * size.y,
            self.window_min[2] + (z as f64 + 0.5) * size.z,
        )
    }
}

/// 투영 하나를 기술하는 12성분 벡터
///
/// `ray_or_source`는 평행빔에서는 광선 방향, 콘빔에서는 선원 위치.
/// `detector`는 검출기 중심, `u`/`v`는 검출기 픽셀 한 칸(열/행) 벡터.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionVector {
    pub ray_or_source: [f64; 3],
    pub detector: [f64; 3],
    pub u: [f64; 3],
    pub v: [f64; 3],
}

impl ProjectionVector {
    pub fn from_parts(ray_or_source: Vector3<f64>, detector: Vector3<f64>, u: Vector3<f64>, v: Vector3<f64>) -> Self {
        Self {
            ray_or_source: [ray_or_source.x, ray_or_source.y, ray_or_source.z],
            detector: [detector.x, detector.y, detector.z],
            u: [u.x, u.y, u.z],
            v: [v.x, v.y, v.z],
        }
    }

    /// ASTRA 벡터 행 순서 (rayX, rayY, rayZ, dX, dY, dZ, uX, uY, uZ, vX, vY, vZ)
    pub fn to_row(&self) -> [f64; 12] {
        let mut row = [0.0; 12];
        row[0..3].copy_from_slice(&self.ray_or_source);
        row[3..6].copy_from_slice(&self.detector);
        row[6..9].copy_from_slice(&self.u);
        row[9..12].copy_from_slice(&self.v);
        row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionKind {
    ParallelVec,
    ConeVec,
}

/// 벡터형 투영 지오메트리
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionGeometry3D {
    pub kind: ProjectionKind,
    pub det_rows: usize,
    pub det_cols: usize,
    pub vectors: Vec<ProjectionVector>,
}

impl ProjectionGeometry3D {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.det_rows, self.vectors.len(), self.det_cols)
    }

    /// ASTRA 지오메트리 타입 이름
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ProjectionKind::ParallelVec => "parallel3d_vec",
            ProjectionKind::ConeVec => "cone_vec",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Volume,
    Projection,
}

/// 데이터 객체 하나에 붙는 지오메트리
#[derive(Debug, Clone, PartialEq)]
pub enum DataGeometry {
    Volume(VolumeGeometry3D),
    Projection(ProjectionGeometry3D),
}

impl DataGeometry {
    pub fn kind(&self) -> DataKind {
        match self {
            DataGeometry::Volume(_) => DataKind::Volume,
            DataGeometry::Projection(_) => DataKind::Projection,
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        match self {
            DataGeometry::Volume(g) => g.shape(),
            DataGeometry::Projection(g) => g.shape(),
        }
    }

    pub fn byte_size(&self) -> usize {
        let (a, b, c) = self.shape();
        a * b * c * std::mem::size_of::<f32>()
    }
}

/// 어댑터 생성 시 한 번 계산되어 이후 변하지 않는 기술자 쌍
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorDescriptor {
    pub volume: VolumeGeometry3D,
    pub projection: ProjectionGeometry3D,
}

impl ProjectorDescriptor {
    pub fn data_geometry(&self, kind: DataKind) -> DataGeometry {
        match kind {
            DataKind::Volume => DataGeometry::Volume(self.volume.clone()),
            DataKind::Projection => DataGeometry::Projection(self.projection.clone()),
        }
    }

    pub fn shape_of(&self, kind: DataKind) -> (usize, usize, usize) {
        match kind {
            DataKind::Volume => self.volume.shape(),
            DataKind::Projection => self.projection.shape(),
        }
    }
}
