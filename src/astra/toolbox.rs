//! 외부 투영 툴박스의 원시 API 경계
//!
//! 데이터 객체 create/link/get/delete, 알고리즘 create/run/delete.
//! 계산은 전부 이 트레이트 뒤에서 일어난다.

use crate::astra::descriptor::DataGeometry;
use crate::error::{AstraError, Result};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlgorithmId(pub u32);

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data#{}", self.0)
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "algorithm#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// 볼륨 -> 투영
    ForwardProjection3D,
    /// 투영 -> 볼륨
    BackProjection3D,
}

impl AlgorithmKind {
    /// 툴박스 알고리즘 이름
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::ForwardProjection3D => "FP3D_CUDA",
            AlgorithmKind::BackProjection3D => "BP3D_CUDA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmConfig {
    pub kind: AlgorithmKind,
    pub volume_data: DataId,
    pub projection_data: DataId,
    pub gpu_index: Option<u32>,
}

/// 링크 실패 시 넘겨준 저장소를 오류와 함께 돌려받는다
pub type LinkResult = std::result::Result<DataId, (AstraError, Array3<f32>)>;

pub trait Toolbox {
    fn name(&self) -> &str;

    /// 호출자 저장소를 복사 없이 연결할 수 있는지
    fn supports_link(&self) -> bool;

    /// 새 데이터 객체. `init`이 없으면 0으로 채운다
    fn data3d_create(&mut self, geometry: &DataGeometry, init: Option<Array3<f32>>) -> Result<DataId>;

    /// 호출자 저장소를 그대로 데이터 객체로 사용
    fn data3d_link(&mut self, geometry: &DataGeometry, storage: Array3<f32>) -> LinkResult;

    /// 데이터 복사본. 객체는 살아 있다
    ///
    /// 어댑터의 실행 경로는 쓰지 않는다(결과는 `data3d_release`로 복사 없이
    /// 넘겨받는다). 툴박스 원시 API를 그대로 옮긴 것으로, 실행 중간의
    /// 버퍼를 들여다보는 진단과 테스트용이다.
    fn data3d_get(&self, id: DataId) -> Result<Array3<f32>>;

    /// 데이터 객체를 삭제하고 그 저장소를 넘겨받는다 (get_shared + delete)
    fn data3d_release(&mut self, id: DataId) -> Result<Array3<f32>>;

    fn data3d_delete(&mut self, id: DataId) -> Result<()> {
        self.data3d_release(id).map(|_| ())
    }

    fn algorithm_create(&mut self, config: AlgorithmConfig) -> Result<AlgorithmId>;

    fn algorithm_run(&mut self, id: AlgorithmId, iterations: u32) -> Result<()>;

    fn algorithm_delete(&mut self, id: AlgorithmId) -> Result<()>;

    /// 아직 삭제되지 않은 데이터 + 알고리즘 핸들 수
    fn live_handles(&self) -> usize;
}
