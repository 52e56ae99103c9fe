//! 다채널 ASTRA 연산자
//!
//! 맨 앞 channel 축을 가진 지오메트리를 받아 채널마다 단일 채널 연산자를
//! 적용한다. 모든 채널이 같은 투영 연산자를 공유한다고 가정하므로, 노름은
//! 채널 수 1로 축소한 지오메트리에서만 추정한다. 이것은 정확성 요건이
//! 아니라 계산량을 줄이는 단축이다.

use crate::astra::AstraContext;
use crate::error::{AstraError, Result};
use crate::framework::{
    AcquisitionData, AcquisitionGeometry, DataContainer, FillMode, Geometry, ImageData, ImageGeometry,
};
use crate::plugin::config::ProjectorConfig;
use crate::plugin::operator::{AstraProjectorSimple, LinearOperator};
use crate::plugin::validate::{validate_multichannel, Role};
use log::{debug, trace};
use ndarray::Axis;

pub struct AstraProjectorMC {
    volume_geometry: ImageGeometry,
    sinogram_geometry: AcquisitionGeometry,
    /// 채널 수 1 지오메트리 위의 연산자
    channel_operator: AstraProjectorSimple,
}

impl AstraProjectorMC {
    pub fn new(volume_geometry: &ImageGeometry, sinogram_geometry: &AcquisitionGeometry, context: &AstraContext) -> Result<Self> {
        Self::with_config(volume_geometry, sinogram_geometry, context, ProjectorConfig::default())
    }

    pub fn with_config(
        volume_geometry: &ImageGeometry,
        sinogram_geometry: &AcquisitionGeometry,
        context: &AstraContext,
        config: ProjectorConfig,
    ) -> Result<Self> {
        validate_multichannel(volume_geometry.dimension_labels(), Role::Volume)?;
        validate_multichannel(sinogram_geometry.dimension_labels(), Role::Projection)?;
        if volume_geometry.channels != sinogram_geometry.channels {
            return Err(AstraError::GeometryMismatch(format!(
                "image has {} channels but acquisition has {}",
                volume_geometry.channels, sinogram_geometry.channels
            )));
        }
        let channel_operator = AstraProjectorSimple::with_config(
            &volume_geometry.single_channel(),
            &sinogram_geometry.single_channel(),
            context,
            config,
        )?;
        debug!("multichannel projector with {} channels", volume_geometry.channels);
        Ok(Self {
            volume_geometry: volume_geometry.clone(),
            sinogram_geometry: sinogram_geometry.clone(),
            channel_operator,
        })
    }

    pub fn channels(&self) -> usize {
        self.volume_geometry.channels
    }

    /// 노름 추정에 쓰이는 축소 지오메트리
    pub fn norm_geometries(&self) -> (&ImageGeometry, &AcquisitionGeometry) {
        (
            self.channel_operator.domain_geometry(),
            self.channel_operator.range_geometry(),
        )
    }

    pub fn cached_norm(&self) -> Option<f64> {
        self.channel_operator.cached_norm()
    }

    fn check<G: Geometry>(&self, data: &DataContainer<G>, expected: &G, role: Role) -> Result<()> {
        if self.channel_operator.config().strict_input_check {
            validate_multichannel(data.dimension_labels(), role)?;
        }
        if !data.geometry().is_compatible(expected) {
            return Err(AstraError::GeometryMismatch(format!(
                "container {:?} of shape {:?} does not match multichannel geometry {:?} of shape {:?}",
                data.dimension_labels(),
                data.shape(),
                expected.dimension_labels(),
                expected.shape()
            )));
        }
        Ok(())
    }

    /// 채널마다 `apply`로 한 채널을 계산해 `out`의 같은 채널에 기록
    fn per_channel<I, O, F>(
        &self,
        input: &DataContainer<I>,
        channel_input: &I,
        out: &mut DataContainer<O>,
        channel_output: &O,
        mut apply: F,
    ) -> Result<()>
    where
        I: Geometry,
        O: Geometry,
        F: FnMut(&DataContainer<I>, &mut DataContainer<O>) -> Result<()>,
    {
        let mut scratch = channel_output.allocate(FillMode::Zeros);
        for c in 0..self.channels() {
            trace!("channel {}/{}", c + 1, self.channels());
            let slice = input.as_array().index_axis(Axis(0), c).to_owned();
            let channel_in = DataContainer::new(slice, channel_input.clone())?;
            apply(&channel_in, &mut scratch)?;
            out.as_array_mut()
                .index_axis_mut(Axis(0), c)
                .assign(&scratch.as_array());
        }
        Ok(())
    }
}

impl LinearOperator for AstraProjectorMC {
    type Domain = ImageGeometry;
    type Range = AcquisitionGeometry;

    fn domain_geometry(&self) -> &ImageGeometry {
        &self.volume_geometry
    }

    fn range_geometry(&self) -> &AcquisitionGeometry {
        &self.sinogram_geometry
    }

    fn direct_new(&self, x: &ImageData) -> Result<AcquisitionData> {
        let mut out = self.sinogram_geometry.allocate(FillMode::Zeros);
        self.direct_into(x, &mut out)?;
        Ok(out)
    }

    fn direct_into(&self, x: &ImageData, out: &mut AcquisitionData) -> Result<()> {
        self.check(x, &self.volume_geometry, Role::Volume)?;
        self.check(out, &self.sinogram_geometry, Role::Projection)?;
        let (channel_in, channel_out) = self.norm_geometries();
        self.per_channel(x, channel_in, out, channel_out, |input, output| {
            self.channel_operator.direct_into(input, output)
        })
    }

    fn adjoint_new(&self, y: &AcquisitionData) -> Result<ImageData> {
        let mut out = self.volume_geometry.allocate(FillMode::Zeros);
        self.adjoint_into(y, &mut out)?;
        Ok(out)
    }

    fn adjoint_into(&self, y: &AcquisitionData, out: &mut ImageData) -> Result<()> {
        self.check(y, &self.sinogram_geometry, Role::Projection)?;
        self.check(out, &self.volume_geometry, Role::Volume)?;
        let (channel_out, channel_in) = self.norm_geometries();
        self.per_channel(y, channel_in, out, channel_out, |input, output| {
            self.channel_operator.adjoint_into(input, output)
        })
    }

    /// 단일 채널 축소 지오메트리에서 추정한 노름 (캐시됨)
    fn norm(&self) -> Result<f64> {
        self.channel_operator.norm()
    }
}
