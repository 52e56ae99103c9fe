//! CPU 참조 툴박스
//!
//! 툴박스 원시 API를 CPU에서 그대로 구현한다. FP3D는 복셀 중심을 검출기에
//! 투사해 쌍선형 가중치로 뿌리고(splatting), BP3D는 같은 가중치로 모은다.
//! 두 연산이 정확히 전치 관계라서 거듭제곱법 노름 추정이 일관된다.
//! 커널 내부만 rayon으로 병렬화한다.

use crate::astra::descriptor::{
    DataGeometry, ProjectionGeometry3D, ProjectionKind, ProjectionVector, VolumeGeometry3D,
};
use crate::astra::toolbox::{AlgorithmConfig, AlgorithmId, AlgorithmKind, DataId, LinkResult, Toolbox};
use crate::error::{AstraError, Result};
use log::{debug, trace};
use nalgebra::{Matrix3, Vector3};
use ndarray::{s, Array2, Array3, ArrayView3, ArrayViewMut3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuToolboxConfig {
    /// 툴박스가 직접 할당하는 버퍼의 총량 상한. 링크된 저장소는 포함하지 않음
    pub memory_budget_bytes: Option<usize>,
}

struct DataObject {
    geometry: DataGeometry,
    array: Array3<f32>,
    linked: bool,
}

#[derive(Default)]
pub struct CpuToolbox {
    config: CpuToolboxConfig,
    next_id: u32,
    data: HashMap<u32, DataObject>,
    algorithms: HashMap<u32, AlgorithmConfig>,
    allocated_bytes: usize,
}

impl CpuToolbox {
    pub fn new(config: CpuToolboxConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_shape(geometry: &DataGeometry, array: &Array3<f32>) -> Result<()> {
        let (a, b, c) = geometry.shape();
        if array.shape() != [a, b, c] {
            return Err(AstraError::GeometryMismatch(format!(
                "buffer shape {:?} does not match {:?} geometry shape {:?}",
                array.shape(),
                geometry.kind(),
                (a, b, c)
            )));
        }
        Ok(())
    }

    fn reserve(&mut self, bytes: usize) -> Result<()> {
        if let Some(budget) = self.config.memory_budget_bytes {
            let available = budget.saturating_sub(self.allocated_bytes);
            if bytes > available {
                return Err(AstraError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }
        self.allocated_bytes += bytes;
        Ok(())
    }

    fn volume_of(&self, id: DataId) -> Result<(&VolumeGeometry3D, &Array3<f32>)> {
        match self.data.get(&id.0) {
            Some(DataObject {
                geometry: DataGeometry::Volume(g),
                array,
                ..
            }) => Ok((g, array)),
            Some(_) => Err(AstraError::execution("FP3D", format!("{} is not volume data", id))),
            None => Err(AstraError::InvalidHandle(id.0)),
        }
    }

    fn projection_of(&self, id: DataId) -> Result<(&ProjectionGeometry3D, &Array3<f32>)> {
        match self.data.get(&id.0) {
            Some(DataObject {
                geometry: DataGeometry::Projection(g),
                array,
                ..
            }) => Ok((g, array)),
            Some(_) => Err(AstraError::execution("BP3D", format!("{} is not projection data", id))),
            None => Err(AstraError::InvalidHandle(id.0)),
        }
    }

    fn run_forward(&mut self, config: &AlgorithmConfig) -> Result<()> {
        let (volume_geometry, volume) = self.volume_of(config.volume_data)?;
        let (projection_geometry, projection) = self.projection_of(config.projection_data)?;
        let mut result = Array3::zeros(projection.raw_dim());
        forward_project(volume_geometry, volume.view(), projection_geometry, result.view_mut());
        if let Some(object) = self.data.get_mut(&config.projection_data.0) {
            object.array.assign(&result);
        }
        Ok(())
    }

    fn run_backward(&mut self, config: &AlgorithmConfig) -> Result<()> {
        let (volume_geometry, volume) = self.volume_of(config.volume_data)?;
        let (projection_geometry, projection) = self.projection_of(config.projection_data)?;
        let mut result = Array3::zeros(volume.raw_dim());
        back_project(volume_geometry, result.view_mut(), projection_geometry, projection.view());
        if let Some(object) = self.data.get_mut(&config.volume_data.0) {
            object.array.assign(&result);
        }
        Ok(())
    }
}

impl Toolbox for CpuToolbox {
    fn name(&self) -> &str {
        "cpu-reference"
    }

    fn supports_link(&self) -> bool {
        true
    }

    fn data3d_create(&mut self, geometry: &DataGeometry, init: Option<Array3<f32>>) -> Result<DataId> {
        let array = match init {
            Some(array) => {
                Self::check_shape(geometry, &array)?;
                array
            }
            None => Array3::zeros(geometry.shape()),
        };
        self.reserve(geometry.byte_size())?;
        let id = self.next_id();
        trace!("data3d_create {:?} -> {}", geometry.shape(), DataId(id));
        self.data.insert(
            id,
            DataObject {
                geometry: geometry.clone(),
                array,
                linked: false,
            },
        );
        Ok(DataId(id))
    }

    fn data3d_link(&mut self, geometry: &DataGeometry, storage: Array3<f32>) -> LinkResult {
        if let Err(e) = Self::check_shape(geometry, &storage) {
            return Err((e, storage));
        }
        let id = self.next_id();
        trace!("data3d_link {:?} -> {}", geometry.shape(), DataId(id));
        self.data.insert(
            id,
            DataObject {
                geometry: geometry.clone(),
                array: storage,
                linked: true,
            },
        );
        Ok(DataId(id))
    }

    fn data3d_get(&self, id: DataId) -> Result<Array3<f32>> {
        self.data
            .get(&id.0)
            .map(|object| object.array.clone())
            .ok_or(AstraError::InvalidHandle(id.0))
    }

    fn data3d_release(&mut self, id: DataId) -> Result<Array3<f32>> {
        let object = self.data.remove(&id.0).ok_or(AstraError::InvalidHandle(id.0))?;
        if !object.linked {
            self.allocated_bytes -= object.geometry.byte_size();
        }
        trace!("data3d_release {}", id);
        Ok(object.array)
    }

    fn algorithm_create(&mut self, config: AlgorithmConfig) -> Result<AlgorithmId> {
        self.volume_of(config.volume_data)?;
        self.projection_of(config.projection_data)?;
        let id = self.next_id();
        debug!(
            "{} created as {} (gpu index {:?} ignored on cpu)",
            config.kind.name(),
            AlgorithmId(id),
            config.gpu_index
        );
        self.algorithms.insert(id, config);
        Ok(AlgorithmId(id))
    }

    fn algorithm_run(&mut self, id: AlgorithmId, iterations: u32) -> Result<()> {
        let config = *self
            .algorithms
            .get(&id.0)
            .ok_or(AstraError::InvalidHandle(id.0))?;
        // 투영 알고리즘은 반복해도 같은 결과
        for _ in 0..iterations.max(1) {
            match config.kind {
                AlgorithmKind::ForwardProjection3D => self.run_forward(&config)?,
                AlgorithmKind::BackProjection3D => self.run_backward(&config)?,
            }
        }
        Ok(())
    }

    fn algorithm_delete(&mut self, id: AlgorithmId) -> Result<()> {
        self.algorithms
            .remove(&id.0)
            .map(|_| ())
            .ok_or(AstraError::InvalidHandle(id.0))
    }

    fn live_handles(&self) -> usize {
        self.data.len() + self.algorithms.len()
    }
}

/// 투영 하나에 대한 검출기 좌표 계산기
struct DetectorFrame {
    kind: ProjectionKind,
    ray_or_source: Vector3<f64>,
    detector: Vector3<f64>,
    u: Vector3<f64>,
    v: Vector3<f64>,
    /// 평행빔: [u v -ray]의 역행렬
    parallel_inverse: Option<Matrix3<f64>>,
    /// 검출기 픽셀 면적 (광선에 수직인 성분)
    pixel_area: f64,
    det_rows: usize,
    det_cols: usize,
    /// 슬라이스 한 장과 검출기 한 줄: 세로 배율 없음
    planar: bool,
}

impl DetectorFrame {
    fn new(geometry: &ProjectionGeometry3D, vector: &ProjectionVector, planar: bool) -> Self {
        let ray_or_source = Vector3::from(vector.ray_or_source);
        let detector = Vector3::from(vector.detector);
        let u = Vector3::from(vector.u);
        let v = Vector3::from(vector.v);
        let normal = u.cross(&v);
        let (parallel_inverse, pixel_area) = match geometry.kind {
            ProjectionKind::ParallelVec => {
                let ray = ray_or_source;
                let inverse = Matrix3::from_columns(&[u, v, -ray]).try_inverse();
                let area = normal.dot(&ray.normalize()).abs();
                (inverse, area)
            }
            ProjectionKind::ConeVec => {
                let axis = detector - ray_or_source;
                let area = if axis.norm() > 0.0 {
                    normal.dot(&axis.normalize()).abs()
                } else {
                    0.0
                };
                (None, area)
            }
        };
        Self {
            kind: geometry.kind,
            ray_or_source,
            detector,
            u,
            v,
            parallel_inverse,
            pixel_area,
            det_rows: geometry.det_rows,
            det_cols: geometry.det_cols,
            planar,
        }
    }

    /// 점 p가 검출기에 떨어지는 (행, 열) 실수 좌표와 배율 제곱
    fn locate(&self, p: &Vector3<f64>) -> Option<(f64, f64, f64)> {
        let (a, b, magnification) = match self.kind {
            ProjectionKind::ParallelVec => {
                let solution = self.parallel_inverse? * (p - self.detector);
                (solution.x, solution.y, 1.0)
            }
            ProjectionKind::ConeVec => {
                let direction = p - self.ray_or_source;
                let system = Matrix3::from_columns(&[self.u, self.v, -direction]);
                let solution = system.lu().solve(&(self.ray_or_source - self.detector))?;
                // s: 선원에서 검출기까지의 광선 매개변수 (p는 s = 1)
                let s = solution.z;
                if s <= 0.0 {
                    return None;
                }
                (solution.x, solution.y, s * s)
            }
        };
        let row = b + self.det_rows as f64 / 2.0 - 0.5;
        let col = a + self.det_cols as f64 / 2.0 - 0.5;
        Some((row, col, magnification))
    }

    /// 복셀 하나의 검출기 기여 (행, 열, 가중치)
    fn for_each_tap(&self, p: &Vector3<f64>, voxel_volume: f64, mut f: impl FnMut(usize, usize, f64)) {
        if self.pixel_area <= 0.0 {
            return;
        }
        let Some((row, col, magnification)) = self.locate(p) else {
            return;
        };
        let magnification = if self.planar { magnification.sqrt() } else { magnification };
        let scale = voxel_volume * magnification / self.pixel_area;
        let r0 = row.floor();
        let c0 = col.floor();
        let wr = row - r0;
        let wc = col - c0;
        let taps = [
            (r0, c0, (1.0 - wr) * (1.0 - wc)),
            (r0, c0 + 1.0, (1.0 - wr) * wc),
            (r0 + 1.0, c0, wr * (1.0 - wc)),
            (r0 + 1.0, c0 + 1.0, wr * wc),
        ];
        for (r, c, w) in taps {
            if w <= 0.0 || r < 0.0 || c < 0.0 {
                continue;
            }
            let (r, c) = (r as usize, c as usize);
            if r < self.det_rows && c < self.det_cols {
                f(r, c, w * scale);
            }
        }
    }
}

fn voxel_volume(geometry: &VolumeGeometry3D) -> f64 {
    let size = geometry.voxel_size();
    size.x * size.y * size.z
}

/// 볼륨 -> 투영. 각도별로 병렬 계산
pub fn forward_project(
    volume_geometry: &VolumeGeometry3D,
    volume: ArrayView3<'_, f32>,
    projection_geometry: &ProjectionGeometry3D,
    mut projection: ArrayViewMut3<'_, f32>,
) {
    let (slices, rows, cols) = volume_geometry.shape();
    let (det_rows, _, det_cols) = projection_geometry.shape();
    let weight = voxel_volume(volume_geometry);
    let planar = slices == 1 && det_rows == 1;

    let per_angle: Vec<Array2<f32>> = projection_geometry
        .vectors
        .par_iter()
        .map(|vector| {
            let frame = DetectorFrame::new(projection_geometry, vector, planar);
            let mut plane = Array2::<f64>::zeros((det_rows, det_cols));
            for z in 0..slices {
                for y in 0..rows {
                    for x in 0..cols {
                        let value = volume[[z, y, x]];
                        if value == 0.0 {
                            continue;
                        }
                        let p = volume_geometry.voxel_center(z, y, x);
                        frame.for_each_tap(&p, weight, |r, c, w| {
                            plane[[r, c]] += w * value as f64;
                        });
                    }
                }
            }
            plane.mapv(|v| v as f32)
        })
        .collect();

    for (angle, plane) in per_angle.into_iter().enumerate() {
        projection.slice_mut(s![.., angle, ..]).assign(&plane);
    }
}

/// 투영 -> 볼륨. forward_project의 정확한 전치. 슬라이스별로 병렬 계산
pub fn back_project(
    volume_geometry: &VolumeGeometry3D,
    mut volume: ArrayViewMut3<'_, f32>,
    projection_geometry: &ProjectionGeometry3D,
    projection: ArrayView3<'_, f32>,
) {
    let (slices, rows, cols) = volume_geometry.shape();
    let weight = voxel_volume(volume_geometry);
    let planar = slices == 1 && projection_geometry.det_rows == 1;
    let frames: Vec<DetectorFrame> = projection_geometry
        .vectors
        .iter()
        .map(|vector| DetectorFrame::new(projection_geometry, vector, planar))
        .collect();

    let per_slice: Vec<Array2<f32>> = (0..slices)
        .into_par_iter()
        .map(|z| {
            let mut plane = Array2::<f32>::zeros((rows, cols));
            for y in 0..rows {
                for x in 0..cols {
                    let p = volume_geometry.voxel_center(z, y, x);
                    let mut sum = 0.0f64;
                    for (angle, frame) in frames.iter().enumerate() {
                        frame.for_each_tap(&p, weight, |r, c, w| {
                            sum += w * projection[[r, angle, c]] as f64;
                        });
                    }
                    plane[[y, x]] = sum as f32;
                }
            }
            plane
        })
        .collect();

    for (z, plane) in per_slice.into_iter().enumerate() {
        volume.slice_mut(s![z, .., ..]).assign(&plane);
    }
}
