// crates/th_physics/src/numerics/limiter/minmod.rs

//! MINMOD/MINBEE 限制器
//!
//! 最耗散的经典 TVD 限制器，在间断处完全退化为一阶，
//! 供高阶重构变体使用。
//!
//! # 算法
//!
//! 给定左/中/右采样值，r = (R−C)/(C−L)（分母为零时取零），
//! 限制斜率为：
//!
//! ```text
//! φ = max(0, min(β·r, 1), min(r, β)) · (C − L)
//! ```
//!
//! β = MINBEE_BETA（取 1 时为经典 MINBEE）。干湿锋面
//! （任一侧水深低于阈值）直接返回零斜率。

use serde::{Deserialize, Serialize};
use th_foundation::constants::{MINBEE_BETA, VERY_SMALL};

/// MINMOD 限制器
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MinmodLimiter {
    /// MINBEE 参数 β
    pub beta: f64,
    /// 干湿阈值
    pub eps: f64,
}

impl Default for MinmodLimiter {
    fn default() -> Self {
        Self {
            beta: MINBEE_BETA,
            eps: VERY_SMALL,
        }
    }
}

impl MinmodLimiter {
    /// 创建限制器
    pub fn new() -> Self {
        Self::default()
    }

    /// 自定义 β
    pub fn with_beta(beta: f64) -> Self {
        Self {
            beta,
            ..Self::default()
        }
    }

    /// 计算限制斜率
    ///
    /// `left`/`centre`/`right` 为三点采样；`h_left`/`h_right`
    /// 为两侧水深，任一侧干时返回零。
    #[inline]
    pub fn limited_slope(
        &self,
        left: f64,
        centre: f64,
        right: f64,
        h_left: f64,
        h_right: f64,
    ) -> f64 {
        if h_left < self.eps || h_right < self.eps {
            return 0.0;
        }

        let backward = centre - left;
        if backward.abs() < self.eps {
            return 0.0;
        }

        let r = (right - centre) / backward;
        let phi = 0.0_f64
            .max((self.beta * r).min(1.0))
            .max(r.min(self.beta));

        phi * backward
    }
}
