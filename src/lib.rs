//! ASTRA 투영 툴박스 어댑터 라이브러리
//!
//! 재구성 프레임워크의 지오메트리/데이터 모델과 투영 툴박스의 벡터형
//! 기술자 및 데이터 핸들 사이를 잇는다. 순/역투영 프로세서와 선형 연산자
//! (`direct`, `adjoint`, `norm`)를 제공한다.

pub mod astra;
pub mod error;
pub mod framework;
pub mod plugin;

// 주요 타입 재수출
pub use astra::{AstraContext, CpuToolbox, CpuToolboxConfig, Device, Toolbox};
pub use error::{AstraError, Result};
pub use framework::{
    linspace, AcquisitionData, AcquisitionGeometry, AngleUnit, BeamGeometry, DataContainer, DimensionLabel,
    FillMode, Geometry, ImageData, ImageGeometry,
};
pub use plugin::{
    AstraBackProjector, AstraForwardProjector, AstraProjectorMC, AstraProjectorSimple, LinearOperator,
    OutputTarget, ProcessOutput, Processor, ProjectorConfig,
};
