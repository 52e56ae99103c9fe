//! 프로젝터/연산자 공통 구성

use crate::error::{AstraError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// 거듭제곱법 최대 반복 수
    pub power_iterations: usize,
    /// 레일리 몫의 상대 변화가 이 값 이하이면 수렴으로 본다
    pub tolerance: f64,
    /// 거듭제곱법 시작 벡터 시드 (없으면 매번 다름)
    pub norm_seed: Option<u64>,
    /// 출력 컨테이너가 주어졌을 때 복사 없는 링크 경로를 먼저 시도
    pub prefer_link: bool,
    /// process 호출마다 입력 축 순서를 ASTRA 고정 순서와 대조. 꺼도 저장된 지오메트리와의 일치는 확인한다
    pub strict_input_check: bool,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            power_iterations: 50,
            tolerance: 1e-6,
            norm_seed: None,
            prefer_link: true,
            strict_input_check: true,
        }
    }
}

impl ProjectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AstraError::Config(format!("cannot parse projector config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AstraError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.power_iterations == 0 {
            return Err(AstraError::Config("power_iterations must be at least 1".into()));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(AstraError::Config(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}
