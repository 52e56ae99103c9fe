//! 지오메트리로 태그된 수치 데이터 컨테이너

use crate::error::{AstraError, Result};
use crate::framework::geometry::{AcquisitionGeometry, Geometry, ImageGeometry};
use crate::framework::labels::DimensionLabel;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, IxDyn, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 컨테이너 할당 시 초기값
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillMode {
    Zeros,
    Value(f32),
    /// [0, 1) 균등분포. 시드를 주면 재현 가능
    Random { seed: Option<u64> },
}

/// 지오메트리와 함께 저장되는 f32 배열
#[derive(Debug, Clone)]
pub struct DataContainer<G> {
    array: ArrayD<f32>,
    geometry: G,
}

pub type ImageData = DataContainer<ImageGeometry>;
pub type AcquisitionData = DataContainer<AcquisitionGeometry>;

impl<G: Geometry> DataContainer<G> {
    /// 배열과 지오메트리를 묶는다. 형상이 다르면 GeometryMismatch
    pub fn new(array: ArrayD<f32>, geometry: G) -> Result<Self> {
        let expected = geometry.shape();
        if array.shape() != expected.as_slice() {
            return Err(AstraError::GeometryMismatch(format!(
                "array shape {:?} does not match geometry shape {:?}",
                array.shape(),
                expected
            )));
        }
        Ok(Self { array, geometry })
    }

    pub fn allocate(geometry: G, mode: FillMode) -> Self {
        let shape = IxDyn(&geometry.shape());
        let array = match mode {
            FillMode::Zeros => ArrayD::zeros(shape),
            FillMode::Value(value) => ArrayD::from_elem(shape, value),
            FillMode::Random { seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                ArrayD::from_shape_simple_fn(shape, || rng.gen::<f32>())
            }
        };
        Self { array, geometry }
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    pub fn dimension_labels(&self) -> &[DimensionLabel] {
        self.geometry.dimension_labels()
    }

    pub fn as_array(&self) -> ArrayViewD<'_, f32> {
        self.array.view()
    }

    pub fn as_array_mut(&mut self) -> ArrayViewMutD<'_, f32> {
        self.array.view_mut()
    }

    pub fn into_array(self) -> ArrayD<f32> {
        self.array
    }

    /// 같은 형상의 배열로 내용을 덮어쓴다
    pub fn fill(&mut self, source: &ArrayViewD<'_, f32>) -> Result<()> {
        if source.shape() != self.array.shape() {
            return Err(AstraError::GeometryMismatch(format!(
                "cannot fill container of shape {:?} with array of shape {:?}",
                self.array.shape(),
                source.shape()
            )));
        }
        self.array.assign(source);
        Ok(())
    }

    /// L2 노름 (f64 누적)
    pub fn norm(&self) -> f64 {
        self.array
            .iter()
            .map(|&v| (v as f64) * (v as f64))
            .sum::<f64>()
            .sqrt()
    }

    pub fn dot(&self, other: &Self) -> Result<f64> {
        if self.array.shape() != other.array.shape() {
            return Err(AstraError::GeometryMismatch(format!(
                "dot product of shapes {:?} and {:?}",
                self.array.shape(),
                other.array.shape()
            )));
        }
        let mut sum = 0.0f64;
        Zip::from(&self.array)
            .and(&other.array)
            .for_each(|&a, &b| sum += a as f64 * b as f64);
        Ok(sum)
    }

    pub fn scale(&mut self, factor: f32) {
        self.array.mapv_inplace(|v| v * factor);
    }

    /// 내부 저장소 자리. 툴박스 링크 시 저장소를 잠시 넘겨줄 때 사용
    pub(crate) fn storage_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.array
    }
}
