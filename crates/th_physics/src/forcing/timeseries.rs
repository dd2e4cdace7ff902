// crates/th_physics/src/forcing/timeseries.rs

//! 时间序列数据与插值
//!
//! 边界核在当前模拟时间对两个序列条目之间做线性插值。
//! 支持截断与循环两种外推模式，游标加速连续时间查询。

use serde::{Deserialize, Serialize};

/// 外推模式
///
/// 查询时间超出数据范围时的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationMode {
    /// 截断：超出范围返回边界值
    #[default]
    Clamp,
    /// 循环：周期性重复数据（潮位等周期强迫）
    Cyclic,
}

/// 时间序列查找游标
///
/// 由调用方持有，加速单调递增的连续时间查询。
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesCursor {
    last_index: usize,
}

impl TimeSeriesCursor {
    /// 创建新的游标
    pub fn new() -> Self {
        Self::default()
    }
}

/// 时间序列数据
///
/// 时间数组必须严格单调递增，与值数组等长且非空。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    times: Vec<f64>,
    values: Vec<f64>,
    extrap_mode: ExtrapolationMode,
}

impl TimeSeries {
    /// 从时间和值数组创建
    ///
    /// # Panics
    ///
    /// 长度不一致、为空或时间非严格递增时 panic。
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Self {
        assert_eq!(times.len(), values.len(), "时间与值数组长度不一致");
        assert!(!times.is_empty(), "时间序列不能为空");
        for i in 1..times.len() {
            assert!(
                times[i] > times[i - 1],
                "时间必须严格单调递增: times[{}]={} <= times[{}]={}",
                i,
                times[i],
                i - 1,
                times[i - 1]
            );
        }

        Self {
            times,
            values,
            extrap_mode: ExtrapolationMode::Clamp,
        }
    }

    /// 从 (时间, 值) 点对创建
    pub fn from_points(points: Vec<(f64, f64)>) -> Self {
        let (times, values): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        Self::new(times, values)
    }

    /// 设置外推模式
    pub fn with_extrapolation(mut self, mode: ExtrapolationMode) -> Self {
        self.extrap_mode = mode;
        self
    }

    /// 数据点数量
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// 时间范围 (起, 止)
    pub fn time_range(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    /// 获取指定时间的插值
    pub fn sample(&self, t: f64) -> f64 {
        let mut cursor = TimeSeriesCursor::new();
        self.sample_with_cursor(t, &mut cursor)
    }

    /// 获取指定时间的插值（带游标，推荐用于逐步查询）
    pub fn sample_with_cursor(&self, t: f64, cursor: &mut TimeSeriesCursor) -> f64 {
        let n = self.times.len();
        let (t_start, t_end) = self.time_range();

        let t_local = if t < t_start || t > t_end {
            match self.extrap_mode {
                ExtrapolationMode::Clamp => {
                    return if t < t_start {
                        self.values[0]
                    } else {
                        self.values[n - 1]
                    };
                }
                ExtrapolationMode::Cyclic => {
                    let duration = t_end - t_start;
                    if duration < 1e-12 {
                        return self.values[0];
                    }
                    t_start + (t - t_start).rem_euclid(duration)
                }
            }
        } else {
            t
        };

        // 游标起点，失配则回退到头部
        let mut idx = cursor.last_index.min(n - 1);
        if t_local < self.times[idx] {
            idx = 0;
        }
        while idx < n - 1 && t_local >= self.times[idx + 1] {
            idx += 1;
        }
        cursor.last_index = idx;

        if idx >= n - 1 {
            return self.values[n - 1];
        }

        let t0 = self.times[idx];
        let t1 = self.times[idx + 1];
        let v0 = self.values[idx];
        let v1 = self.values[idx + 1];

        let dt = t1 - t0;
        if dt.abs() < 1e-12 {
            v0
        } else {
            v0 + (t_local - t0) / dt * (v1 - v0)
        }
    }
}
