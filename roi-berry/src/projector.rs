//! threshold 传播工具的多切片投影.
//!
//! 只支持主导轴采集: 视平面法向必须与某个世界轴几乎平行.
//! 真正斜切的采集直接报错, 投影数学在那种几何下没有定义.

use std::fmt;

use crate::consts::AXIS_ALIGNMENT_EPSILON;
use crate::{Point3, Vec3};

/// 投影错误.
#[derive(Clone, Debug, PartialEq)]
pub enum ProjectionError {
    /// 视平面法向不与任何世界轴对齐.
    ObliqueView(Vec3),
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObliqueView(n) => {
                write!(f, "视平面法向 {n:?} 不与任何世界轴对齐, 无法做切片投影")
            }
        }
    }
}

impl std::error::Error for ProjectionError {}

/// 投影结果别名.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// 某一切片的渲染方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SliceRenderMode {
    /// 在 `[start, end]` 之外: 不绘制.
    Hidden,

    /// 范围内的中间切片: 虚线, 无 handle.
    Dashed,

    /// 标注所在切片: 实线, handle 可编辑.
    Editable,
}

/// 沿主导轴的切片投影器.
#[derive(Clone, Debug)]
pub struct SliceProjector {
    axis: usize,
    spacing: f64,
}

impl SliceProjector {
    /// 由视平面法向 (单位向量) 与每切片间距创建投影器.
    ///
    /// 取 |分量| 最大的世界轴为主导轴; 该分量偏离 ±1 超过
    /// 容差时返回 [`ProjectionError::ObliqueView`].
    /// 间距必须为正, 否则 panic.
    pub fn new(view_plane_normal: Vec3, spacing: f64) -> ProjectionResult<Self> {
        assert!(spacing > 0.0, "切片间距必须为正");
        let axis = (0..3)
            .max_by(|&a, &b| {
                view_plane_normal[a]
                    .abs()
                    .total_cmp(&view_plane_normal[b].abs())
            })
            .unwrap_or(2);
        if (view_plane_normal[axis].abs() - 1.0).abs() > AXIS_ALIGNMENT_EPSILON {
            return Err(ProjectionError::ObliqueView(view_plane_normal));
        }
        Ok(Self { axis, spacing })
    }

    /// 同 [`Self::new`], 但从目标的三分量间距中取主导轴分量.
    pub fn from_spacing(view_plane_normal: Vec3, spacing: [f64; 3]) -> ProjectionResult<Self> {
        let probe = Self::new(view_plane_normal, 1.0)?;
        Self::new(view_plane_normal, spacing[probe.axis])
    }

    /// 主导轴下标 (0/1/2 即 x/y/z).
    #[inline]
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// 每切片间距.
    #[inline]
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// 点在主导轴上的坐标.
    #[inline]
    pub fn coordinate(&self, p: Point3) -> f64 {
        p[self.axis]
    }

    /// 由标注所在切片坐标与配置切片数 N 计算对称的起止坐标:
    /// 向后 ⌈N/2⌉ 片, 向前 ⌊N/2⌋ 片. 体边界裁剪由调用方负责.
    pub fn start_end(&self, origin_coord: f64, slice_count: usize) -> (f64, f64) {
        let behind = slice_count.div_ceil(2) as f64;
        let ahead = (slice_count / 2) as f64;
        (
            origin_coord - behind * self.spacing,
            origin_coord + ahead * self.spacing,
        )
    }

    /// 把 handle 点集沿主导轴投影到 `[start, end)` 内的每一切片.
    ///
    /// 产生 `⌈(end-start)/spacing⌉` 个点集; 位移为零的切片
    /// (即标注所在切片) 的条目是原点集的逐字克隆, 不经过任何
    /// 浮点运算.
    pub fn project(&self, points: &[Point3], start: f64, end: f64) -> Vec<Vec<Point3>> {
        assert!(!points.is_empty(), "handle 点集不能为空");
        assert!(end >= start, "起止坐标倒置");
        let origin = points[0][self.axis];
        let count = ((end - start) / self.spacing).ceil() as usize;

        (0..count)
            .map(|step| {
                let offset = start + step as f64 * self.spacing - origin;
                if offset.abs() < self.spacing / 2.0 {
                    points.to_vec()
                } else {
                    points
                        .iter()
                        .map(|p| {
                            let mut q = *p;
                            q[self.axis] += offset;
                            q
                        })
                        .collect()
                }
            })
            .collect()
    }

    /// 判定当前焦点所在切片的渲染方式.
    ///
    /// 命中原切片的容差为半个间距; 范围判定取闭区间
    /// `[start, end]`, 区间之外一律不画.
    pub fn classify(
        &self,
        focal_coord: f64,
        origin_coord: f64,
        start: f64,
        end: f64,
    ) -> SliceRenderMode {
        if (focal_coord - origin_coord).abs() < self.spacing / 2.0 {
            return SliceRenderMode::Editable;
        }
        if focal_coord < start || focal_coord > end {
            return SliceRenderMode::Hidden;
        }
        SliceRenderMode::Dashed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_oblique_normal_is_rejected() {
        let oblique = [0.577, 0.577, 0.577];
        match SliceProjector::new(oblique, 1.0) {
            Err(ProjectionError::ObliqueView(n)) => assert_eq!(n, oblique),
            other => panic!("应当拒绝斜切法向: {other:?}"),
        }
    }

    #[test]
    fn test_dominant_axis_selection() {
        assert_eq!(SliceProjector::new([0.0, 0.0, 1.0], 1.0).unwrap().axis(), 2);
        assert_eq!(SliceProjector::new([0.0, -1.0, 0.0], 1.0).unwrap().axis(), 1);
        // 容差内的微小偏离仍然接受.
        let nearly = [0.0005, 0.0, -0.9999995];
        assert_eq!(SliceProjector::new(nearly, 1.0).unwrap().axis(), 2);
    }

    #[test]
    fn test_start_end_symmetric_split() {
        let p = SliceProjector::new([0.0, 0.0, 1.0], 2.0).unwrap();
        // N = 5: 向后 3 片, 向前 2 片.
        assert_eq!(p.start_end(10.0, 5), (4.0, 14.0));
        // N = 4: 向后 2, 向前 2.
        assert_eq!(p.start_end(10.0, 4), (6.0, 14.0));
    }

    /// 点集个数恰为 ⌈(end-start)/spacing⌉, 零位移条目逐字相等.
    #[test]
    fn test_project_count_and_identity_entry() {
        let p = SliceProjector::new([0.0, 0.0, 1.0], 2.5).unwrap();
        let points = vec![[1.0, 2.0, 10.0], [3.0, 4.0, 10.0]];
        let (start, end) = p.start_end(10.0, 4);

        let sets = p.project(&points, start, end);
        assert_eq!(sets.len(), 4);

        // 位移为零的条目与原点集逐位相等.
        let identity = sets
            .iter()
            .find(|s| s[0][2] == 10.0)
            .expect("应包含原切片条目");
        assert_eq!(identity.as_slice(), points.as_slice());

        // 其余条目沿 z 平移, x/y 不变.
        for set in &sets {
            assert_eq!(set.len(), points.len());
            for (q, orig) in set.iter().zip(&points) {
                assert!(f64_eq(q[0], orig[0]));
                assert!(f64_eq(q[1], orig[1]));
            }
        }
    }

    #[test]
    fn test_project_fractional_span_rounds_up() {
        let p = SliceProjector::new([0.0, 0.0, 1.0], 2.0).unwrap();
        let points = vec![[0.0, 0.0, 3.0]];
        // 跨度 5, 间距 2 → ⌈2.5⌉ = 3 个点集.
        let sets = p.project(&points, 0.0, 5.0);
        assert_eq!(sets.len(), 3);
        assert!(f64_eq(sets[0][0][2], 0.0));
        assert!(f64_eq(sets[1][0][2], 2.0));
        assert!(f64_eq(sets[2][0][2], 4.0));
    }

    #[test]
    fn test_classify_render_modes() {
        let p = SliceProjector::new([0.0, 0.0, 1.0], 2.0).unwrap();
        let (start, end) = p.start_end(10.0, 4);

        assert_eq!(p.classify(10.0, 10.0, start, end), SliceRenderMode::Editable);
        // 半个间距内的焦点仍算命中原切片.
        assert_eq!(p.classify(10.9, 10.0, start, end), SliceRenderMode::Editable);
        assert_eq!(p.classify(8.0, 10.0, start, end), SliceRenderMode::Dashed);
        // 端点在闭区间内.
        assert_eq!(p.classify(6.0, 10.0, start, end), SliceRenderMode::Dashed);
        assert_eq!(p.classify(14.0, 10.0, start, end), SliceRenderMode::Dashed);
        assert_eq!(p.classify(16.0, 10.0, start, end), SliceRenderMode::Hidden);
        assert_eq!(p.classify(2.0, 10.0, start, end), SliceRenderMode::Hidden);
        // 端点外不足半个间距的焦点同样不画.
        assert_eq!(p.classify(14.9, 10.0, start, end), SliceRenderMode::Hidden);
        assert_eq!(p.classify(5.5, 10.0, start, end), SliceRenderMode::Hidden);
    }
}
