//! 장치 선택과 툴박스 핸들
//!
//! 모듈 전역 상태 대신, 모든 어댑터 생성자에 명시적으로 전달된다.

use crate::astra::cpu::CpuToolbox;
use crate::astra::toolbox::Toolbox;
use crate::error::AstraError;
use serde::{Deserialize, Serialize};
use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// 투영을 실행할 장치
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    Cpu,
    /// index가 없으면 툴박스 기본 GPU
    Gpu { index: Option<u32> },
}

impl Device {
    pub fn gpu_index(&self) -> Option<u32> {
        match self {
            Device::Cpu => None,
            Device::Gpu { index } => *index,
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::Gpu { index: None }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu { index: None } => write!(f, "gpu"),
            Device::Gpu { index: Some(i) } => write!(f, "gpu:{}", i),
        }
    }
}

impl FromStr for Device {
    type Err = AstraError;

    /// "cpu", "gpu", "gpu:N"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "cpu" => Ok(Device::Cpu),
            "gpu" => Ok(Device::Gpu { index: None }),
            other => {
                let index = other
                    .strip_prefix("gpu:")
                    .and_then(|i| i.parse::<u32>().ok())
                    .ok_or_else(|| AstraError::Config(format!("unknown device '{}'", s)))?;
                Ok(Device::Gpu { index: Some(index) })
            }
        }
    }
}

/// 툴박스 인스턴스 + 장치
///
/// 복제하면 같은 툴박스를 공유한다. `Rc<RefCell<..>>` 기반이라 스레드 간
/// 전달이 불가능하며, 같은 컨텍스트를 쓰는 어댑터 호출은 호출자가 직렬화한다.
#[derive(Clone)]
pub struct AstraContext {
    toolbox: Rc<RefCell<dyn Toolbox>>,
    device: Device,
}

impl AstraContext {
    pub fn new(toolbox: Rc<RefCell<dyn Toolbox>>, device: Device) -> Self {
        Self { toolbox, device }
    }

    pub fn with_toolbox<T: Toolbox + 'static>(toolbox: T, device: Device) -> Self {
        Self::new(Rc::new(RefCell::new(toolbox)), device)
    }

    /// CPU 참조 툴박스를 쓰는 컨텍스트
    pub fn cpu() -> Self {
        Self::with_toolbox(CpuToolbox::default(), Device::Cpu)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// 원시 호출 한 번 동안만 빌린다
    pub(crate) fn toolbox(&self) -> RefMut<'_, dyn Toolbox> {
        self.toolbox.borrow_mut()
    }

    pub fn live_handles(&self) -> usize {
        self.toolbox.borrow().live_handles()
    }
}

impl fmt::Debug for AstraContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstraContext")
            .field("toolbox", &self.toolbox.borrow().name())
            .field("device", &self.device)
            .finish()
    }
}
