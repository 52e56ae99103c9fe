//! 플러그인 전체에서 쓰이는 오류 타입

use crate::framework::DimensionLabel;

pub type Result<T> = std::result::Result<T, AstraError>;

/// 어댑터 계층의 오류 분류
///
/// 모든 오류는 호출자에게 그대로 전달된다. 재시도나 다른 알고리즘으로의
/// 대체는 없다.
#[derive(Debug, thiserror::Error)]
pub enum AstraError {
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("ASTRA compatibility requires dimension label order {expected:?}, got {found:?}")]
    DimensionOrder {
        expected: Vec<DimensionLabel>,
        found: Vec<DimensionLabel>,
    },

    #[error("supports 2D and 3D data only, got {0} dimensions")]
    UnsupportedDimensionality(usize),

    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("toolbox algorithm {algorithm} failed: {reason}")]
    ToolboxExecution { algorithm: String, reason: String },

    #[error("toolbox could not allocate {requested} bytes ({available} available)")]
    OutOfMemory { requested: usize, available: usize },

    #[error("unknown toolbox handle {0}")]
    InvalidHandle(u32),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AstraError {
    pub(crate) fn execution(algorithm: impl Into<String>, reason: impl Into<String>) -> Self {
        AstraError::ToolboxExecution {
            algorithm: algorithm.into(),
            reason: reason.into(),
        }
    }
}
