//! 순투영/역투영 데이터 프로세서
//!
//! 하나의 제네릭 어댑터가 방향 마커(`Forward`, `Backward`)로 두 역할을 한다.
//! 호출 한 번의 상태 흐름: Idle -> BufferCreated -> Executed -> BufferReleased -> Idle.

use crate::astra::{AlgorithmConfig, AlgorithmKind, AstraContext, DataId, DataKind, ProjectorDescriptor};
use crate::error::{AstraError, Result};
use crate::framework::{AcquisitionGeometry, DataContainer, Geometry, ImageGeometry};
use crate::plugin::buffer::{with_linked, AlgorithmHandle, DataHandle, LinkOutcome};
use crate::plugin::config::ProjectorConfig;
use crate::plugin::convert::convert_geometry_to_astra_vec;
use crate::plugin::validate::Role;
use log::{debug, trace};
use ndarray::{Array3, IxDyn};
use std::marker::PhantomData;

/// 출력 위치: 새로 할당하거나 호출자 컨테이너를 채운다
#[derive(Debug)]
pub enum OutputTarget<'a, T> {
    Allocate,
    Fill(&'a mut T),
}

/// process 결과
#[derive(Debug)]
pub enum ProcessOutput<T> {
    Allocated(T),
    Filled,
}

impl<T> ProcessOutput<T> {
    pub fn into_allocated(self) -> Option<T> {
        match self {
            ProcessOutput::Allocated(value) => Some(value),
            ProcessOutput::Filled => None,
        }
    }
}

/// 입력 컨테이너 하나를 받아 출력 컨테이너를 만드는 데이터 프로세서
pub trait Processor {
    type Input;
    type Output;

    fn process_new(&self, input: &Self::Input) -> Result<Self::Output>;

    fn process_into(&self, input: &Self::Input, out: &mut Self::Output) -> Result<()>;

    fn process(&self, input: &Self::Input, target: OutputTarget<'_, Self::Output>) -> Result<ProcessOutput<Self::Output>> {
        match target {
            OutputTarget::Allocate => self.process_new(input).map(ProcessOutput::Allocated),
            OutputTarget::Fill(out) => self.process_into(input, out).map(|_| ProcessOutput::Filled),
        }
    }
}

/// 투영 방향별 정적 정보
pub trait ProjectionDirection {
    type Input: Geometry;
    type Output: Geometry;

    const ALGORITHM: AlgorithmKind;
    const INPUT_ROLE: Role;
    const INPUT_KIND: DataKind;
    const OUTPUT_KIND: DataKind;

    fn input_geometry<'a>(volume: &'a ImageGeometry, sinogram: &'a AcquisitionGeometry) -> &'a Self::Input;

    fn output_geometry<'a>(volume: &'a ImageGeometry, sinogram: &'a AcquisitionGeometry) -> &'a Self::Output;

    /// (입력, 출력) 핸들 -> (볼륨, 투영) 핸들
    fn bind(input: DataId, output: DataId) -> (DataId, DataId);
}

/// 볼륨 -> 사이노그램
#[derive(Debug, Clone, Copy)]
pub struct Forward;

/// 사이노그램 -> 볼륨
#[derive(Debug, Clone, Copy)]
pub struct Backward;

impl ProjectionDirection for Forward {
    type Input = ImageGeometry;
    type Output = AcquisitionGeometry;

    const ALGORITHM: AlgorithmKind = AlgorithmKind::ForwardProjection3D;
    const INPUT_ROLE: Role = Role::Volume;
    const INPUT_KIND: DataKind = DataKind::Volume;
    const OUTPUT_KIND: DataKind = DataKind::Projection;

    fn input_geometry<'a>(volume: &'a ImageGeometry, _: &'a AcquisitionGeometry) -> &'a ImageGeometry {
        volume
    }

    fn output_geometry<'a>(_: &'a ImageGeometry, sinogram: &'a AcquisitionGeometry) -> &'a AcquisitionGeometry {
        sinogram
    }

    fn bind(input: DataId, output: DataId) -> (DataId, DataId) {
        (input, output)
    }
}

impl ProjectionDirection for Backward {
    type Input = AcquisitionGeometry;
    type Output = ImageGeometry;

    const ALGORITHM: AlgorithmKind = AlgorithmKind::BackProjection3D;
    const INPUT_ROLE: Role = Role::Projection;
    const INPUT_KIND: DataKind = DataKind::Projection;
    const OUTPUT_KIND: DataKind = DataKind::Volume;

    fn input_geometry<'a>(_: &'a ImageGeometry, sinogram: &'a AcquisitionGeometry) -> &'a AcquisitionGeometry {
        sinogram
    }

    fn output_geometry<'a>(volume: &'a ImageGeometry, _: &'a AcquisitionGeometry) -> &'a ImageGeometry {
        volume
    }

    fn bind(input: DataId, output: DataId) -> (DataId, DataId) {
        (output, input)
    }
}

/// 툴박스 순/역투영 어댑터
///
/// 생성 시 두 지오메트리의 축 순서를 검사하고 복사본을 보관하며, 기술자
/// 쌍을 한 번만 계산한다. 채널 축이 있는 지오메트리는 받지 않는다
/// (`AstraProjectorMC` 사용).
pub struct AstraProjector<D: ProjectionDirection> {
    context: AstraContext,
    volume_geometry: ImageGeometry,
    sinogram_geometry: AcquisitionGeometry,
    descriptor: ProjectorDescriptor,
    config: ProjectorConfig,
    _direction: PhantomData<D>,
}

pub type AstraForwardProjector = AstraProjector<Forward>;
pub type AstraBackProjector = AstraProjector<Backward>;

impl<D: ProjectionDirection> AstraProjector<D> {
    pub fn new(
        context: &AstraContext,
        volume_geometry: &ImageGeometry,
        sinogram_geometry: &AcquisitionGeometry,
        config: ProjectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if volume_geometry.channels > 1 || sinogram_geometry.channels > 1 {
            return Err(AstraError::UnsupportedGeometry(format!(
                "multichannel geometry ({} image / {} acquisition channels) needs the multichannel projector",
                volume_geometry.channels, sinogram_geometry.channels
            )));
        }
        Role::Volume.check(volume_geometry.dimension_labels())?;
        Role::Projection.check(sinogram_geometry.dimension_labels())?;
        let descriptor = convert_geometry_to_astra_vec(volume_geometry, sinogram_geometry)?;
        debug!(
            "{} projector ready on {} (volume {:?}, projections {:?})",
            D::ALGORITHM.name(),
            context.device(),
            descriptor.volume.shape(),
            descriptor.projection.shape()
        );
        Ok(Self {
            context: context.clone(),
            volume_geometry: volume_geometry.clone(),
            sinogram_geometry: sinogram_geometry.clone(),
            descriptor,
            config,
            _direction: PhantomData,
        })
    }

    pub fn volume_geometry(&self) -> &ImageGeometry {
        &self.volume_geometry
    }

    pub fn sinogram_geometry(&self) -> &AcquisitionGeometry {
        &self.sinogram_geometry
    }

    pub fn descriptor(&self) -> &ProjectorDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    fn input_geometry(&self) -> &D::Input {
        D::input_geometry(&self.volume_geometry, &self.sinogram_geometry)
    }

    fn output_geometry(&self) -> &D::Output {
        D::output_geometry(&self.volume_geometry, &self.sinogram_geometry)
    }

    fn check_input(&self, input: &DataContainer<D::Input>) -> Result<()> {
        if self.config.strict_input_check {
            D::INPUT_ROLE.check(input.dimension_labels())?;
        }
        // 엄격 검사를 꺼도 레이블 순서가 다른 입력은 받지 않는다
        let expected = self.input_geometry();
        if !input.geometry().is_compatible(expected) {
            return Err(AstraError::GeometryMismatch(format!(
                "input {:?} of shape {:?} does not match projector geometry {:?} of shape {:?}",
                input.dimension_labels(),
                input.shape(),
                expected.dimension_labels(),
                expected.shape()
            )));
        }
        Ok(())
    }

    fn check_output(&self, out: &DataContainer<D::Output>) -> Result<()> {
        let expected = self.output_geometry();
        if !out.geometry().is_compatible(expected) {
            return Err(AstraError::GeometryMismatch(format!(
                "output {:?} of shape {:?} does not match projector geometry {:?} of shape {:?}",
                out.dimension_labels(),
                out.shape(),
                expected.dimension_labels(),
                expected.shape()
            )));
        }
        Ok(())
    }

    /// 입력을 툴박스 3D 버퍼로 올린다. 2D는 크기 1인 앞 축이 붙는다
    fn upload(&self, input: &DataContainer<D::Input>) -> Result<DataHandle<'_>> {
        let shape = self.descriptor.shape_of(D::INPUT_KIND);
        let promoted: Array3<f32> = input
            .as_array()
            .to_owned()
            .into_shape(shape)
            .map_err(|e| AstraError::GeometryMismatch(e.to_string()))?;
        DataHandle::create(&self.context, &self.descriptor.data_geometry(D::INPUT_KIND), Some(promoted))
    }

    fn execute(&self, input: DataId, output: DataId) -> Result<()> {
        let (volume_data, projection_data) = D::bind(input, output);
        let algorithm = AlgorithmHandle::create(
            &self.context,
            AlgorithmConfig {
                kind: D::ALGORITHM,
                volume_data,
                projection_data,
                gpu_index: self.context.device().gpu_index(),
            },
        )?;
        algorithm.run(1)
    }

    /// 툴박스가 출력 버퍼를 할당하고 실행 후 그 저장소를 그대로 넘겨받는다
    fn run_allocated(&self, input: &DataHandle<'_>) -> Result<Array3<f32>> {
        let output = DataHandle::create(&self.context, &self.descriptor.data_geometry(D::OUTPUT_KIND), None)?;
        self.execute(input.id(), output.id())?;
        output.into_array()
    }
}

impl<D: ProjectionDirection> Processor for AstraProjector<D> {
    type Input = DataContainer<D::Input>;
    type Output = DataContainer<D::Output>;

    fn process_new(&self, input: &Self::Input) -> Result<Self::Output> {
        self.check_input(input)?;
        trace!("{} process_new on {:?}", D::ALGORITHM.name(), input.shape());
        let input_handle = self.upload(input)?;
        let result = self.run_allocated(&input_handle)?;
        drop(input_handle);

        // 3D 결과를 출력 지오메트리 형상으로 (2D면 앞 축 제거)
        let geometry = self.output_geometry().clone();
        let data = result
            .into_shape(IxDyn(&geometry.shape()))
            .map_err(|e| AstraError::GeometryMismatch(e.to_string()))?;
        DataContainer::new(data, geometry)
    }

    fn process_into(&self, input: &Self::Input, out: &mut Self::Output) -> Result<()> {
        self.check_input(input)?;
        self.check_output(out)?;
        trace!("{} process_into on {:?}", D::ALGORITHM.name(), input.shape());
        let input_handle = self.upload(input)?;

        let link_available = self.config.prefer_link && self.context.toolbox().supports_link();
        if link_available {
            let geometry = self.descriptor.data_geometry(D::OUTPUT_KIND);
            let outcome = with_linked(&self.context, &geometry, out.storage_mut(), |output| {
                self.execute(input_handle.id(), output)
            })?;
            if outcome == LinkOutcome::Linked {
                return Ok(());
            }
        }

        let result = self.run_allocated(&input_handle)?;
        drop(input_handle);
        let view = result
            .view()
            .into_shape(IxDyn(out.shape()))
            .map_err(|e| AstraError::GeometryMismatch(e.to_string()))?;
        out.fill(&view)
    }
}
