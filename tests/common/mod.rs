//! 통합 테스트 공용: 호출 횟수를 세는 툴박스

#![allow(dead_code)]

use astra_plugin::astra::{AlgorithmConfig, AlgorithmId, DataGeometry, DataId, LinkResult};
use astra_plugin::{AstraContext, AstraError, CpuToolbox, Device, Result, Toolbox};
use ndarray::Array3;
use std::cell::RefCell;
use std::rc::Rc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 원시 호출 횟수
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub data_created: usize,
    pub link_attempts: usize,
    pub data_linked: usize,
    pub data_released: usize,
    pub algorithms_created: usize,
    pub algorithms_run: usize,
    pub algorithms_deleted: usize,
    /// algorithm_create에 넘어온 구성, 호출 순서대로
    pub algorithm_configs: Vec<AlgorithmConfig>,
}

impl Ledger {
    /// 만든 핸들과 지운 핸들 수가 같은지
    pub fn is_balanced(&self) -> bool {
        self.data_created + self.data_linked == self.data_released
            && self.algorithms_created == self.algorithms_deleted
    }
}

/// 주입할 실패
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// n번째(1부터) data3d_create 호출을 실패시킨다
    pub fail_create_at: Option<usize>,
    pub refuse_link: bool,
    pub fail_run: bool,
    pub no_link_support: bool,
    /// 링크된 객체를 해제할 때 다른 형상의 저장소를 돌려준다
    pub reshape_linked_release: bool,
    /// 링크된 객체를 해제한 뒤 저장소 대신 오류를 돌려준다
    pub drop_linked_release: bool,
}

/// CpuToolbox를 감싸 호출을 기록하는 툴박스
pub struct LedgerToolbox {
    inner: CpuToolbox,
    linked: Vec<DataId>,
    pub ledger: Ledger,
    pub faults: Faults,
}

impl LedgerToolbox {
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: CpuToolbox::default(),
            linked: Vec::new(),
            ledger: Ledger::default(),
            faults,
        }
    }
}

impl Toolbox for LedgerToolbox {
    fn name(&self) -> &str {
        "ledger"
    }

    fn supports_link(&self) -> bool {
        !self.faults.no_link_support
    }

    fn data3d_create(&mut self, geometry: &DataGeometry, init: Option<Array3<f32>>) -> Result<DataId> {
        let attempt = self.ledger.data_created + 1;
        if self.faults.fail_create_at == Some(attempt) {
            return Err(AstraError::OutOfMemory {
                requested: geometry.byte_size(),
                available: 0,
            });
        }
        let id = self.inner.data3d_create(geometry, init)?;
        self.ledger.data_created += 1;
        Ok(id)
    }

    fn data3d_link(&mut self, geometry: &DataGeometry, storage: Array3<f32>) -> LinkResult {
        self.ledger.link_attempts += 1;
        if self.faults.refuse_link {
            return Err((
                AstraError::ToolboxExecution {
                    algorithm: "link".into(),
                    reason: "refused".into(),
                },
                storage,
            ));
        }
        let id = self.inner.data3d_link(geometry, storage)?;
        self.ledger.data_linked += 1;
        self.linked.push(id);
        Ok(id)
    }

    fn data3d_get(&self, id: DataId) -> Result<Array3<f32>> {
        self.inner.data3d_get(id)
    }

    fn data3d_release(&mut self, id: DataId) -> Result<Array3<f32>> {
        let storage = self.inner.data3d_release(id)?;
        self.ledger.data_released += 1;
        let was_linked = self.linked.contains(&id);
        self.linked.retain(|&linked| linked != id);
        if was_linked && self.faults.drop_linked_release {
            return Err(AstraError::InvalidHandle(id.0));
        }
        if was_linked && self.faults.reshape_linked_release {
            return Ok(Array3::zeros((1, 1, storage.len() + 1)));
        }
        Ok(storage)
    }

    fn algorithm_create(&mut self, config: AlgorithmConfig) -> Result<AlgorithmId> {
        let id = self.inner.algorithm_create(config)?;
        self.ledger.algorithms_created += 1;
        self.ledger.algorithm_configs.push(config);
        Ok(id)
    }

    fn algorithm_run(&mut self, id: AlgorithmId, iterations: u32) -> Result<()> {
        self.ledger.algorithms_run += 1;
        if self.faults.fail_run {
            return Err(AstraError::ToolboxExecution {
                algorithm: "injected".into(),
                reason: "run failed".into(),
            });
        }
        self.inner.algorithm_run(id, iterations)
    }

    fn algorithm_delete(&mut self, id: AlgorithmId) -> Result<()> {
        self.inner.algorithm_delete(id)?;
        self.ledger.algorithms_deleted += 1;
        Ok(())
    }

    fn live_handles(&self) -> usize {
        self.inner.live_handles()
    }
}

/// 기록용 툴박스를 쓰는 컨텍스트와 그 툴박스 핸들
pub fn ledger_context(faults: Faults) -> (AstraContext, Rc<RefCell<LedgerToolbox>>) {
    ledger_context_on(faults, Device::Cpu)
}

/// 장치를 지정한 기록용 컨텍스트
pub fn ledger_context_on(faults: Faults, device: Device) -> (AstraContext, Rc<RefCell<LedgerToolbox>>) {
    init_logger();
    let toolbox = Rc::new(RefCell::new(LedgerToolbox::new(faults)));
    let shared: Rc<RefCell<dyn Toolbox>> = toolbox.clone();
    (AstraContext::new(shared, device), toolbox)
}

pub fn ledger_of(toolbox: &Rc<RefCell<LedgerToolbox>>) -> Ledger {
    toolbox.borrow().ledger.clone()
}
