//! 선형 연산자 인터페이스와 단일 채널 ASTRA 연산자

use crate::astra::AstraContext;
use crate::error::Result;
use crate::framework::{AcquisitionData, AcquisitionGeometry, DataContainer, Geometry, ImageData, ImageGeometry};
use crate::plugin::config::ProjectorConfig;
use crate::plugin::power::power_method;
use crate::plugin::processor::{AstraBackProjector, AstraForwardProjector, OutputTarget, ProcessOutput, Processor};
use once_cell::unsync::OnceCell;

/// 최적화 라이브러리가 소비하는 선형 연산자
pub trait LinearOperator {
    type Domain: Geometry;
    type Range: Geometry;

    fn domain_geometry(&self) -> &Self::Domain;

    fn range_geometry(&self) -> &Self::Range;

    fn direct_new(&self, x: &DataContainer<Self::Domain>) -> Result<DataContainer<Self::Range>>;

    fn direct_into(&self, x: &DataContainer<Self::Domain>, out: &mut DataContainer<Self::Range>) -> Result<()>;

    fn adjoint_new(&self, y: &DataContainer<Self::Range>) -> Result<DataContainer<Self::Domain>>;

    fn adjoint_into(&self, y: &DataContainer<Self::Range>, out: &mut DataContainer<Self::Domain>) -> Result<()>;

    /// 연산자 노름 (구현체가 캐시)
    fn norm(&self) -> Result<f64>;

    fn direct(
        &self,
        x: &DataContainer<Self::Domain>,
        target: OutputTarget<'_, DataContainer<Self::Range>>,
    ) -> Result<ProcessOutput<DataContainer<Self::Range>>> {
        match target {
            OutputTarget::Allocate => self.direct_new(x).map(ProcessOutput::Allocated),
            OutputTarget::Fill(out) => self.direct_into(x, out).map(|_| ProcessOutput::Filled),
        }
    }

    fn adjoint(
        &self,
        y: &DataContainer<Self::Range>,
        target: OutputTarget<'_, DataContainer<Self::Domain>>,
    ) -> Result<ProcessOutput<DataContainer<Self::Domain>>> {
        match target {
            OutputTarget::Allocate => self.adjoint_new(y).map(ProcessOutput::Allocated),
            OutputTarget::Fill(out) => self.adjoint_into(y, out).map(|_| ProcessOutput::Filled),
        }
    }
}

/// 2D/3D 단일 채널 ASTRA 투영 연산자
pub struct AstraProjectorSimple {
    fp: AstraForwardProjector,
    bp: AstraBackProjector,
    config: ProjectorConfig,
    /// 처음 계산될 때까지 비어 있음
    norm: OnceCell<f64>,
}

impl AstraProjectorSimple {
    pub fn new(volume_geometry: &ImageGeometry, sinogram_geometry: &AcquisitionGeometry, context: &AstraContext) -> Result<Self> {
        Self::with_config(volume_geometry, sinogram_geometry, context, ProjectorConfig::default())
    }

    pub fn with_config(
        volume_geometry: &ImageGeometry,
        sinogram_geometry: &AcquisitionGeometry,
        context: &AstraContext,
        config: ProjectorConfig,
    ) -> Result<Self> {
        let fp = AstraForwardProjector::new(context, volume_geometry, sinogram_geometry, config.clone())?;
        let bp = AstraBackProjector::new(context, volume_geometry, sinogram_geometry, config.clone())?;
        Ok(Self {
            fp,
            bp,
            config,
            norm: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// 아직 계산되지 않았으면 None
    pub fn cached_norm(&self) -> Option<f64> {
        self.norm.get().copied()
    }

    /// 캐시를 거치지 않는 거듭제곱법 추정
    pub fn calculate_norm(&self) -> Result<f64> {
        let result = power_method(self, self.config.power_iterations, self.config.tolerance, self.config.norm_seed)?;
        Ok(result.norm)
    }
}

impl LinearOperator for AstraProjectorSimple {
    type Domain = ImageGeometry;
    type Range = AcquisitionGeometry;

    fn domain_geometry(&self) -> &ImageGeometry {
        self.fp.volume_geometry()
    }

    fn range_geometry(&self) -> &AcquisitionGeometry {
        self.fp.sinogram_geometry()
    }

    fn direct_new(&self, x: &ImageData) -> Result<AcquisitionData> {
        self.fp.process_new(x)
    }

    fn direct_into(&self, x: &ImageData, out: &mut AcquisitionData) -> Result<()> {
        self.fp.process_into(x, out)
    }

    fn adjoint_new(&self, y: &AcquisitionData) -> Result<ImageData> {
        self.bp.process_new(y)
    }

    fn adjoint_into(&self, y: &AcquisitionData, out: &mut ImageData) -> Result<()> {
        self.bp.process_into(y, out)
    }

    fn norm(&self) -> Result<f64> {
        self.norm.get_or_try_init(|| self.calculate_norm()).copied()
    }
}
