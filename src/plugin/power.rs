//! 거듭제곱법으로 연산자 노름 추정

use crate::error::Result;
use crate::framework::{FillMode, Geometry};
use crate::plugin::operator::LinearOperator;
use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerMethodResult {
    /// 최대 특이값 추정치
    pub norm: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// AᵀA에 거듭제곱법을 적용해 ||A||를 추정
///
/// 단위 노름 x에 대해 레일리 몫 <x, AᵀAx>가 σ²의 추정치다. 상대 변화가
/// `tolerance` 이하가 되거나 `max_iterations`에 도달하면 멈춘다.
pub fn power_method<Op>(op: &Op, max_iterations: usize, tolerance: f64, seed: Option<u64>) -> Result<PowerMethodResult>
where
    Op: LinearOperator + ?Sized,
{
    let mut x = op.domain_geometry().allocate(FillMode::Random { seed });
    let mut y = op.range_geometry().allocate(FillMode::Zeros);
    let mut z = op.domain_geometry().allocate(FillMode::Zeros);

    let initial = x.norm();
    if initial == 0.0 {
        return Ok(PowerMethodResult {
            norm: 0.0,
            iterations: 0,
            converged: true,
        });
    }
    x.scale((1.0 / initial) as f32);

    let mut estimate = 0.0f64;
    let mut iterations = 0;
    let mut converged = false;
    for it in 1..=max_iterations {
        iterations = it;
        op.direct_into(&x, &mut y)?;
        op.adjoint_into(&y, &mut z)?;

        let rayleigh = x.dot(&z)?;
        let z_norm = z.norm();
        if z_norm == 0.0 {
            estimate = 0.0;
            converged = true;
            break;
        }
        let change = (rayleigh - estimate).abs();
        estimate = rayleigh;
        trace!("power iteration {}: sigma^2 ~ {:.6e}", it, rayleigh);

        std::mem::swap(&mut x, &mut z);
        x.scale((1.0 / z_norm) as f32);

        if it > 1 && change <= tolerance * rayleigh.abs() {
            converged = true;
            break;
        }
    }

    let norm = estimate.max(0.0).sqrt();
    debug!(
        "operator norm {:.6} after {} iterations (converged: {})",
        norm, iterations, converged
    );
    Ok(PowerMethodResult {
        norm,
        iterations,
        converged,
    })
}
