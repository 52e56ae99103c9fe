//! 툴박스 핸들 수명: 성공/실패 모든 경로에서 만든 만큼 지워야 한다

mod common;

use astra_plugin::{
    linspace, AcquisitionGeometry, AngleUnit, AstraBackProjector, AstraContext, AstraError, AstraForwardProjector,
    CpuToolbox, CpuToolboxConfig, Device, FillMode, Geometry, ImageGeometry, Processor, ProjectorConfig,
};
use astra_plugin::astra::AlgorithmKind;
use common::{ledger_context, ledger_context_on, ledger_of, Faults};
use std::f64::consts::PI;

fn 지오메트리() -> (ImageGeometry, AcquisitionGeometry) {
    let ig = ImageGeometry::new(10, 10);
    let ag = AcquisitionGeometry::parallel_2d(&linspace(0.0, PI, 12), AngleUnit::Radian, 10);
    (ig, ag)
}

#[test]
fn 할당_경로_핸들_수() {
    let (ig, ag) = 지오메트리();
    let (context, toolbox) = ledger_context(Faults::default());
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    fp.process_new(&ig.allocate(FillMode::Value(1.0))).unwrap();

    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.data_created, 2);
    assert_eq!(ledger.data_linked, 0);
    assert_eq!(ledger.algorithms_run, 1);
    assert!(ledger.is_balanced(), "{:?}", ledger);
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 링크_경로_핸들_수() {
    let (ig, ag) = 지오메트리();
    let (context, toolbox) = ledger_context(Faults::default());
    let bp = AstraBackProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let mut out = ig.allocate(FillMode::Zeros);
    bp.process_into(&ag.allocate(FillMode::Value(1.0)), &mut out).unwrap();

    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.data_created, 1);
    assert_eq!(ledger.data_linked, 1);
    assert!(ledger.is_balanced(), "{:?}", ledger);
    assert_eq!(out.shape(), &[10, 10]);
    assert!(out.norm() > 0.0);
}

#[test]
fn 출력_버퍼_생성_실패() {
    let (ig, ag) = 지오메트리();
    let (context, toolbox) = ledger_context(Faults {
        fail_create_at: Some(2),
        ..Faults::default()
    });
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let result = fp.process_new(&ig.allocate(FillMode::Value(1.0)));
    assert!(matches!(result, Err(AstraError::OutOfMemory { .. })));

    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.data_created, 1);
    assert_eq!(ledger.algorithms_created, 0);
    assert!(ledger.is_balanced(), "{:?}", ledger);
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 실행_실패_할당_경로() {
    let (ig, ag) = 지오메트리();
    let (context, toolbox) = ledger_context(Faults {
        fail_run: true,
        ..Faults::default()
    });
    let bp = AstraBackProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let result = bp.process_new(&ag.allocate(FillMode::Value(1.0)));
    assert!(matches!(result, Err(AstraError::ToolboxExecution { .. })));

    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.algorithms_created, 1);
    assert!(ledger.is_balanced(), "{:?}", ledger);
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 실행_실패해도_출력_저장소_복원() {
    let (ig, ag) = 지오메트리();
    let (context, toolbox) = ledger_context(Faults {
        fail_run: true,
        ..Faults::default()
    });
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let mut out = ag.allocate(FillMode::Value(7.0));
    let result = fp.process_into(&ig.allocate(FillMode::Value(1.0)), &mut out);
    assert!(matches!(result, Err(AstraError::ToolboxExecution { .. })));

    // 링크됐던 저장소가 원래 형상과 값으로 돌아와야 한다
    assert_eq!(out.shape(), &[12, 10]);
    assert!(out.as_array().iter().all(|&v| v == 7.0));
    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.data_linked, 1);
    assert!(ledger.is_balanced(), "{:?}", ledger);
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 링크_거부시_복사로_대체() {
    let (ig, ag) = 지오메트리();
    let x = ig.allocate(FillMode::Random { seed: Some(3) });

    let (context, toolbox) = ledger_context(Faults {
        refuse_link: true,
        ..Faults::default()
    });
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let mut out = ag.allocate(FillMode::Zeros);
    fp.process_into(&x, &mut out).unwrap();

    let expected = fp.process_new(&x).unwrap();
    assert_eq!(out.as_array(), expected.as_array());

    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.link_attempts, 1);
    assert_eq!(ledger.data_linked, 0);
    assert!(ledger.is_balanced(), "{:?}", ledger);
}

#[test]
fn 메모리_부족() {
    let (ig, ag) = 지오메트리();
    // 입력 볼륨(400 바이트)만 들어가는 예산
    let toolbox = CpuToolbox::new(CpuToolboxConfig {
        memory_budget_bytes: Some(500),
    });
    let context = AstraContext::with_toolbox(toolbox, Device::Cpu);
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();

    match fp.process_new(&ig.allocate(FillMode::Zeros)) {
        Err(AstraError::OutOfMemory { requested, available }) => {
            assert_eq!(requested, 12 * 10 * 4);
            assert_eq!(available, 100);
        }
        other => panic!("expected OutOfMemory, got {:?}", other.map(|d| d.shape().to_vec())),
    }
    assert_eq!(context.live_handles(), 0);

    // 링크된 출력은 예산에 포함되지 않는다
    let mut out = ag.allocate(FillMode::Zeros);
    fp.process_into(&ig.allocate(FillMode::Value(1.0)), &mut out).unwrap();
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 반복_호출해도_누수_없음() {
    let (ig, ag) = 지오메트리();
    let (context, toolbox) = ledger_context(Faults::default());
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let x = ig.allocate(FillMode::Value(1.0));
    let mut out = ag.allocate(FillMode::Zeros);
    for _ in 0..5 {
        fp.process_new(&x).unwrap();
        fp.process_into(&x, &mut out).unwrap();
    }
    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.algorithms_run, 10);
    assert!(ledger.is_balanced(), "{:?}", ledger);
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 입력_버퍼_생성_실패() {
    let (ig, ag) = 지오메트리();
    let (context, toolbox) = ledger_context(Faults {
        fail_create_at: Some(1),
        ..Faults::default()
    });
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let mut out = ag.allocate(FillMode::Value(2.0));
    let result = fp.process_into(&ig.allocate(FillMode::Value(1.0)), &mut out);
    assert!(matches!(result, Err(AstraError::OutOfMemory { .. })));

    // 아무것도 만들어지거나 연결되지 않았고 출력은 그대로다
    let ledger = ledger_of(&toolbox);
    assert_eq!(ledger.data_created, 0);
    assert_eq!(ledger.link_attempts, 0);
    assert_eq!(ledger.algorithms_created, 0);
    assert!(ledger.is_balanced(), "{:?}", ledger);
    assert!(out.as_array().iter().all(|&v| v == 2.0));
    assert_eq!(context.live_handles(), 0);
}

#[test]
fn 장치의_gpu_번호가_알고리즘까지_전달() {
    let (ig, ag) = 지오메트리();
    let device: Device = "gpu:3".parse().unwrap();
    let (context, toolbox) = ledger_context_on(Faults::default(), device);
    let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let bp = AstraBackProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
    let sino = fp.process_new(&ig.allocate(FillMode::Value(1.0))).unwrap();
    bp.process_new(&sino).unwrap();

    let configs = ledger_of(&toolbox).algorithm_configs;
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].kind, AlgorithmKind::ForwardProjection3D);
    assert_eq!(configs[1].kind, AlgorithmKind::BackProjection3D);
    assert!(configs.iter().all(|c| c.gpu_index == Some(3)));

    let (cpu_context, cpu_toolbox) = ledger_context(Faults::default());
    let fp = AstraForwardProjector::new(&cpu_context, &ig, &ag, ProjectorConfig::default()).unwrap();
    fp.process_new(&ig.allocate(FillMode::Value(1.0))).unwrap();
    assert_eq!(ledger_of(&cpu_toolbox).algorithm_configs[0].gpu_index, None);
}

#[test]
fn 링크_저장소를_되찾지_못하면_원래_형상의_0() {
    let (ig, ag) = 지오메트리();
    for faults in [
        Faults {
            reshape_linked_release: true,
            ..Faults::default()
        },
        Faults {
            drop_linked_release: true,
            ..Faults::default()
        },
    ] {
        let (context, toolbox) = ledger_context(faults);
        let fp = AstraForwardProjector::new(&context, &ig, &ag, ProjectorConfig::default()).unwrap();
        let mut out = ag.allocate(FillMode::Value(7.0));
        let result = fp.process_into(&ig.allocate(FillMode::Value(1.0)), &mut out);
        assert!(result.is_err());

        // 컨테이너는 여전히 지오메트리와 맞는 형상이어야 한다
        assert_eq!(out.shape(), ag.shape().as_slice());
        assert!(out.as_array().iter().all(|&v| v == 0.0));
        assert!(ledger_of(&toolbox).is_balanced());
        assert_eq!(context.live_handles(), 0);

        // 같은 컨테이너로 다시 호출할 수 있다
        toolbox.borrow_mut().faults = Faults::default();
        fp.process_into(&ig.allocate(FillMode::Value(1.0)), &mut out).unwrap();
        assert!(out.norm() > 0.0);
    }
}
