//! # 투영 툴박스 경계
//!
//! 툴박스 네이티브 기술자, 원시 API 트레이트, 장치/컨텍스트 핸들,
//! 그리고 CPU 참조 구현.

pub mod context;
pub mod cpu;
pub mod descriptor;
pub mod toolbox;

pub use context::{AstraContext, Device};
pub use cpu::{CpuToolbox, CpuToolboxConfig};
pub use descriptor::{
    DataGeometry, DataKind, ProjectionGeometry3D, ProjectionKind, ProjectionVector, ProjectorDescriptor,
    VolumeGeometry3D,
};
pub use toolbox::{AlgorithmConfig, AlgorithmId, AlgorithmKind, DataId, LinkResult, Toolbox};
