//! 被访问体素序列上的流式统计.
//!
//! 单遍 Welford 算法维护 mean 与方差累积量, 以 [`ordered_float`]
//! 追踪 NaN 安全的最值. 累加器可合并, 以支持多切片 union 统计与
//! `rayon` 特性下的并行归约.

use ordered_float::NotNan;

use crate::Point3;

/// 流式统计累加器.
///
/// 非有限值 (NaN / inf) 会被整体跳过, 不计入任何统计量.
#[derive(Clone, Debug, Default)]
pub struct StatsAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    max: Option<NotNan<f64>>,
    min: Option<NotNan<f64>>,
    points: Option<Vec<Point3>>,
}

impl StatsAccumulator {
    /// 创建空累加器. `capture_points` 为真时记录每个被访问体素的
    /// 世界坐标 (供下游导出 `pointsInShape`).
    pub fn new(capture_points: bool) -> Self {
        Self {
            points: capture_points.then(Vec::new),
            ..Self::default()
        }
    }

    /// 送入一个体素值与其世界坐标.
    pub fn push(&mut self, value: f64, pos: Point3) {
        let Ok(v) = NotNan::new(value) else {
            return;
        };
        if value.is_infinite() {
            return;
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);

        self.max = Some(self.max.map_or(v, |m| m.max(v)));
        self.min = Some(self.min.map_or(v, |m| m.min(v)));

        if let Some(points) = &mut self.points {
            points.push(pos);
        }
    }

    /// 合并另一个累加器 (Chan 并行方差合并公式).
    ///
    /// 两个累加器的点捕获设置不要求一致; 任一侧捕获的点都会保留.
    pub fn merge(&mut self, other: Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other;
            return;
        }

        let n1 = self.count as f64;
        let n2 = other.count as f64;
        let delta = other.mean - self.mean;

        self.mean += delta * n2 / (n1 + n2);
        self.m2 += other.m2 + delta * delta * n1 * n2 / (n1 + n2);
        self.count += other.count;

        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match (&mut self.points, other.points) {
            (Some(mine), Some(theirs)) => mine.extend(theirs),
            (mine @ None, theirs @ Some(_)) => *mine = theirs,
            _ => {}
        }
    }

    /// 已计入的体素个数.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 是否尚无任何样本.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 平均值. 空累加器返回 `0.0`.
    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 总体标准差. 空累加器返回 `0.0`.
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    /// 最大值. 空累加器返回 `0.0`.
    #[inline]
    pub fn max(&self) -> f64 {
        self.max.map_or(0.0, NotNan::into_inner)
    }

    /// 最小值. 空累加器返回 `0.0`.
    #[inline]
    pub fn min(&self) -> f64 {
        self.min.map_or(0.0, NotNan::into_inner)
    }

    /// 取走捕获的世界坐标序列 (若开启了捕获).
    #[inline]
    pub fn take_points(&mut self) -> Option<Vec<Point3>> {
        self.points.take()
    }
}
