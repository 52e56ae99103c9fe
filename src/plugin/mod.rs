//! # ASTRA 어댑터 계층
//!
//! 지오메트리 변환, 축 순서 검사, 핸들 수명 관리, 그리고 그 위에 올라가는
//! 프로세서와 선형 연산자.

mod buffer;
pub mod config;
pub mod convert;
pub mod multichannel;
pub mod operator;
pub mod power;
pub mod processor;
pub mod validate;

pub use config::ProjectorConfig;
pub use convert::convert_geometry_to_astra_vec;
pub use multichannel::AstraProjectorMC;
pub use operator::{AstraProjectorSimple, LinearOperator};
pub use power::{power_method, PowerMethodResult};
pub use processor::{
    AstraBackProjector, AstraForwardProjector, AstraProjector, Backward, Forward, OutputTarget, ProcessOutput,
    ProjectionDirection, Processor,
};
pub use validate::{validate, validate_multichannel, Role};
