mod common;

use approx::assert_relative_eq;
use astra_plugin::{
    linspace, AcquisitionGeometry, AngleUnit, AstraBackProjector, AstraContext, AstraError, AstraForwardProjector,
    Device, DimensionLabel, FillMode, Geometry, ImageGeometry, OutputTarget, Processor,
    ProjectorConfig,
};
use common::{ledger_context, Faults};
use std::f64::consts::PI;

fn 기본_지오메트리(n: usize, num_angles: usize) -> (ImageGeometry, AcquisitionGeometry) {
    let ig = ImageGeometry::new(n, n);
    let ag = AcquisitionGeometry::parallel_2d(&linspace(0.0, PI, num_angles), AngleUnit::Radian, n);
    (ig, ag)
}

#[test]
fn cpu_장치_30x30_180각도_영입력() {
    common::init_logger();
    let device: Device = "cpu".parse().unwrap();
    assert_eq!(device, Device::Cpu);
    let context = AstraContext::cpu();
    let (ig, ag) = 기본_지오메트리(30, 180);

    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let bp = AstraBackProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();

    let zeros = ig.allocate(FillMode::Zeros);
    let sino = fp.process_new(&zeros).unwrap();
    assert_eq!(sino.shape(), &[180, 30]);
    assert!(sino.as_array().iter().all(|&v| v == 0.0));

    let back = bp.process_new(&ag.allocate(FillMode::Zeros)).unwrap();
    assert_eq!(back.shape(), &[30, 30]);
    assert!(back.as_array().iter().all(|&v| v == 0.0));
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 균일_이미지의_투영은_질량_보존() {
    let context = AstraContext::cpu();
    let (ig, ag) = 기본_지오메트리(16, 8);
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let sino = fp.process_new(&ig.allocate(FillMode::Value(1.0))).unwrap();

    // 각 각도의 검출기 합 = 이미지 총합 (검출기 밖으로 나간 질량이 없을 때)
    let total = 16.0 * 16.0;
    let first = sino.as_array().index_axis(ndarray::Axis(0), 0).sum();
    assert_relative_eq!(first as f64, total, max_relative = 1e-4);
}

#[test]
fn 크기가_1이_아닐_때도_질량_보존() {
    let context = AstraContext::cpu();
    // (복셀 크기, 검출기 픽셀 폭, 검출기 픽셀 수). 검출기가 이미지보다 넓어 잘려 나가는 질량이 없다
    for (voxel, pixel, pixels) in [(1.0, 2.0, 12), (0.5, 1.0, 12), (0.5, 0.25, 40)] {
        let ig = ImageGeometry::new(16, 16).with_voxel_size(voxel, voxel, voxel);
        let ag = AcquisitionGeometry::parallel_2d(&[0.0, PI / 2.0], AngleUnit::Radian, pixels).with_pixel_size(pixel, pixel);
        let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
        let sino = fp.process_new(&ig.allocate(FillMode::Value(1.0))).unwrap();

        // 검출기 합 x 픽셀 폭 = 이미지 면적
        let area = 16.0 * 16.0 * voxel * voxel;
        for angle in 0..2 {
            let sum = sino.as_array().index_axis(ndarray::Axis(0), angle).sum() as f64;
            assert_relative_eq!(sum * pixel, area, max_relative = 1e-4);
        }
        // 중앙 광선의 선적분 = 이미지 폭
        let center = sino.as_array()[[0, pixels / 2]] as f64;
        assert_relative_eq!(center, 16.0 * voxel, max_relative = 1e-3);
    }
}

#[test]
fn 팬빔_2d_점_질량은_배율만큼_퍼짐() {
    let context = AstraContext::cpu();
    let ig = ImageGeometry::new(3, 3);
    // 선원-중심 40, 중심-검출기 20: 회전 중심의 배율 1.5
    let ag = AcquisitionGeometry::cone_2d(&[0.0], AngleUnit::Radian, 12, 40.0, 20.0);
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();

    let mut point = ig.allocate(FillMode::Zeros);
    point.as_array_mut()[[1, 1]] = 1.0;
    let sino = fp.process_new(&point).unwrap();
    assert_relative_eq!(sino.as_array().sum() as f64, 1.5, max_relative = 1e-4);
}

#[test]
fn 형상_3d() {
    let context = AstraContext::cpu();
    let ig = ImageGeometry::new(12, 10).with_slices(6);
    let ag = AcquisitionGeometry::parallel_3d(&linspace(0.0, 180.0, 9), AngleUnit::Degree, 16, 8);
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let bp = AstraBackProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();

    let sino = fp.process_new(&ig.allocate(FillMode::Random { seed: Some(1) })).unwrap();
    assert_eq!(sino.shape(), &[8, 9, 16]);
    assert_eq!(sino.dimension_labels(), ag.dimension_labels());
    let back = bp.process_new(&sino).unwrap();
    assert_eq!(back.shape(), &[6, 10, 12]);
}

#[test]
fn 링크와_복사_경로_결과_동일() {
    let (ig, ag) = 기본_지오메트리(20, 24);
    let x = ig.allocate(FillMode::Random { seed: Some(42) });

    let (linked_ctx, linked_tb) = ledger_context(Faults::default());
    let (copy_ctx, copy_tb) = ledger_context(Faults {
        no_link_support: true,
        ..Faults::default()
    });
    let linked = AstraForwardProjector::new(&linked_ctx, &ig, &ag, ProjectorConfig::default()).unwrap();
    let copied = AstraForwardProjector::new(&copy_ctx, &ig, &ag, ProjectorConfig::default()).unwrap();

    let mut a = ag.allocate(FillMode::Value(3.0));
    let mut b = ag.allocate(FillMode::Value(3.0));
    linked.process_into(&x, &mut a).unwrap();
    copied.process_into(&x, &mut b).unwrap();
    let allocated = linked.process_new(&x).unwrap();

    assert_eq!(a.as_array(), b.as_array());
    assert_eq!(a.as_array(), allocated.as_array());
    assert_eq!(common::ledger_of(&linked_tb).data_linked, 1);
    assert_eq!(common::ledger_of(&copy_tb).link_attempts, 0);
}

#[test]
fn 링크_선호_해제() {
    let (ig, ag) = 기본_지오메트리(8, 4);
    let (context, toolbox) = ledger_context(Faults::default());
    let config = ProjectorConfig {
        prefer_link: false,
        ..ProjectorConfig::default()
    };
    let fp = AstraForwardProjector::new(&context, &ig, &ag, config).unwrap();
    let mut out = ag.allocate(FillMode::Zeros);
    let written = fp
        .process(&ig.allocate(FillMode::Value(1.0)), OutputTarget::Fill(&mut out))
        .unwrap();
    assert!(written.into_allocated().is_none());
    assert_eq!(common::ledger_of(&toolbox).link_attempts, 0);
    assert!(out.norm() > 0.0);
}

#[test]
fn 축_순서가_다른_입력_거부() {
    let context = AstraContext::cpu();
    let (ig, ag) = 기본_지오메트리(8, 8);
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();

    let swapped = ig
        .clone()
        .with_dimension_labels(vec![DimensionLabel::HorizontalX, DimensionLabel::HorizontalY])
        .unwrap();
    let input = swapped.allocate(FillMode::Zeros);
    assert!(matches!(fp.process_new(&input), Err(AstraError::DimensionOrder { .. })));

    // 검사를 꺼도 축이 뒤바뀐 입력은 조용히 투영되지 않는다
    let lenient = AstraForwardProjector::new(
        &context,
        &ig,
        &ag,
        ProjectorConfig {
            strict_input_check: false,
            ..ProjectorConfig::default()
        },
    )
    .unwrap();
    assert!(matches!(lenient.process_new(&input), Err(AstraError::GeometryMismatch(_))));
    assert!(lenient.process_new(&ig.allocate(FillMode::Zeros)).is_ok());
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 잘못된_지오메트리로_생성_거부() {
    let context = AstraContext::cpu();
    let (ig, ag) = 기본_지오메트리(8, 8);

    let permuted = ag
        .clone()
        .with_dimension_labels(vec![DimensionLabel::Horizontal, DimensionLabel::Angle])
        .unwrap();
    assert!(matches!(
        AstraForwardProjector::new(&context, &ig, &permuted, ProjectorConfig::default()),
        Err(AstraError::DimensionOrder { .. })
    ));

    let multichannel = ig.clone().with_channels(3);
    assert!(matches!(
        AstraBackProjector::new(&context, &multichannel, &ag, ProjectorConfig::default()),
        Err(AstraError::UnsupportedGeometry(_))
    ));

    let bad_config = ProjectorConfig {
        power_iterations: 0,
        ..ProjectorConfig::default()
    };
    assert!(matches!(
        AstraForwardProjector::new(&context, &ig, &ag, bad_config),
        Err(AstraError::Config(_))
    ));
}

#[test]
fn 출력_형상_불일치() {
    let context = AstraContext::cpu();
    let (ig, ag) = 기본_지오메트리(8, 8);
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let (_, other) = 기본_지오메트리(8, 5);
    let mut out = other.allocate(FillMode::Zeros);
    assert!(matches!(
        fp.process_into(&ig.allocate(FillMode::Zeros), &mut out),
        Err(AstraError::GeometryMismatch(_))
    ));
    assert_eq!(context.live_handles(), 0);
}
