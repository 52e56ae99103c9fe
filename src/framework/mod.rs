//! # 프레임워크 데이터 모델
//!
//! 재구성 프레임워크의 지오메트리와 데이터 컨테이너. 어댑터는 이 타입들만
//! 주고받고, 툴박스 쪽 표현으로의 변환은 plugin 모듈이 담당한다.

pub mod container;
pub mod geometry;
pub mod labels;

pub use container::{AcquisitionData, DataContainer, FillMode, ImageData};
pub use geometry::{linspace, AcquisitionGeometry, AngleUnit, BeamGeometry, Geometry, ImageGeometry};
pub use labels::DimensionLabel;
