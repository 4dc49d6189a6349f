//! ROI 形状几何: 每种形状的 handle 重建规则与成员谓词.
//!
//! canvas 空间的 handle 槽位约定 (槽位语义固定, 不随拖拽重排):
//!
//! 1. probe: `[点]`;
//! 2. 圆: `[圆心, 边缘点]`;
//! 3. 椭圆: `[下, 上, 左, 右]` 四个轴端点;
//! 4. 矩形: `[左下, 右下, 左上, 右上]` 四个角.
//!
//! canvas y 轴以向下增长为正方向 (屏幕惯例), 但所有重建规则只依赖
//! 槽位的 **公式** 而非实际上下关系, 拖拽越过中心时槽位语义依然成立.

mod drag;

pub use drag::recompute_on_drag;

use crate::{dot, normalize, sub, Canvas2, Point3, Vec3};

/// ROI 形状种类. 同时充当每形状能力记录:
/// handle 个数, 绘制 / 拖拽重建规则与成员谓词均由它分发.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeKind {
    /// 单点探针.
    Probe,

    /// 圆 (圆心 + 边缘点).
    Circle,

    /// 轴对齐椭圆.
    Ellipse,

    /// 轴对齐矩形.
    Rectangle,
}

impl ShapeKind {
    /// 该形状的 handle 点个数. 创建后不再改变.
    #[inline]
    pub const fn handle_count(&self) -> usize {
        match self {
            Self::Probe => 1,
            Self::Circle => 2,
            Self::Ellipse | Self::Rectangle => 4,
        }
    }

    /// 工具名, 用于标注存储的按工具检索.
    #[inline]
    pub const fn tool_name(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Circle => "circle-roi",
            Self::Ellipse => "ellipse-roi",
            Self::Rectangle => "rectangle-roi",
        }
    }

    /// 绘制新标注时, 第一次移动后处于激活态的 handle 槽位.
    #[inline]
    pub const fn draw_handle(&self) -> usize {
        match self {
            Self::Probe => 0,
            Self::Circle => 1,
            Self::Ellipse | Self::Rectangle => 3,
        }
    }

    /// 该形状是否拥有世界空间成员谓词.
    ///
    /// 矩形与 probe 没有: 它们的体素访问就是整个整数包围盒.
    #[inline]
    pub const fn has_membership_predicate(&self) -> bool {
        matches!(self, Self::Circle | Self::Ellipse)
    }

    /// 绘制中: 以锚点与当前指针位置为纯函数重建全部 handle 槽位.
    ///
    /// - probe 只追随指针;
    /// - 圆固定圆心于锚点, 只重算边缘点;
    /// - 椭圆以锚点为中心, 由对称增量重算四个轴端点;
    /// - 矩形以锚点与指针为对角, 重建四个轴对齐角点.
    pub fn recompute_on_draw(&self, anchor: Canvas2, cursor: Canvas2) -> Vec<Canvas2> {
        match self {
            Self::Probe => vec![cursor],
            Self::Circle => vec![anchor, cursor],
            Self::Ellipse => {
                let [ax, ay] = anchor;
                let dx = cursor[0] - ax;
                let dy = cursor[1] - ay;
                vec![[ax, ay + dy], [ax, ay - dy], [ax - dx, ay], [ax + dx, ay]]
            }
            Self::Rectangle => rect_corners(anchor, cursor),
        }
    }

    /// 由视平面投影得到的世界宽高计算形状面积 (未除以标定 scale).
    ///
    /// 圆 / 椭圆: `π · rx · ry`; 矩形: `宽 · 高`; probe 恒为 0.
    pub fn area(&self, world_width: f64, world_height: f64) -> f64 {
        match self {
            Self::Probe => 0.0,
            Self::Circle | Self::Ellipse => {
                std::f64::consts::PI * (world_width / 2.0) * (world_height / 2.0)
            }
            Self::Rectangle => world_width * world_height,
        }
    }
}

/// 以对角两点重建 `[左下, 右下, 左上, 右上]` 四个轴对齐角点.
///
/// "下" 为 y 较小的一侧. 两点的左右上下关系任意.
pub(crate) fn rect_corners(a: Canvas2, b: Canvas2) -> Vec<Canvas2> {
    let (lo_x, hi_x) = if a[0] <= b[0] { (a[0], b[0]) } else { (b[0], a[0]) };
    let (lo_y, hi_y) = if a[1] <= b[1] { (a[1], b[1]) } else { (b[1], a[1]) };
    vec![[lo_x, lo_y], [hi_x, lo_y], [lo_x, hi_y], [hi_x, hi_y]]
}

/// 世界空间中的椭圆成员谓词.
///
/// 椭圆位于视平面内, 两条半轴分别沿视图右向量与 up 向量.
/// 圆是 `half_width == half_height` 的特例. 谓词对斜视图同样正确,
/// 因为判定在视平面基上进行, 而不是在体素轴上.
#[derive(Copy, Clone, Debug)]
pub struct EllipseWorld {
    center: Point3,
    half_width: f64,
    half_height: f64,
    right: Vec3,
    up: Vec3,
}

impl EllipseWorld {
    /// 以中心, 两条半轴长与视图基向量构建谓词.
    ///
    /// `right` / `up` 无需预先单位化; 无法单位化 (零向量) 或半轴
    /// 非正时, 谓词对任何点返回 `false`.
    pub fn new(center: Point3, half_width: f64, half_height: f64, right: Vec3, up: Vec3) -> Self {
        Self {
            center,
            half_width,
            half_height,
            right: normalize(right).unwrap_or([0.0; 3]),
            up: normalize(up).unwrap_or([0.0; 3]),
        }
    }

    /// 椭圆中心.
    #[inline]
    pub fn center(&self) -> Point3 {
        self.center
    }

    /// 判断世界点 `p` 是否落在椭圆内 (含边界).
    pub fn contains(&self, p: Point3) -> bool {
        if self.half_width <= 0.0 || self.half_height <= 0.0 {
            return false;
        }
        let v = sub(p, self.center);
        let x = dot(v, self.right) / self.half_width;
        let y = dot(v, self.up) / self.half_height;
        x * x + y * y <= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_count_fixed() {
        assert_eq!(ShapeKind::Probe.handle_count(), 1);
        assert_eq!(ShapeKind::Circle.handle_count(), 2);
        assert_eq!(ShapeKind::Ellipse.handle_count(), 4);
        assert_eq!(ShapeKind::Rectangle.handle_count(), 4);
    }

    #[test]
    fn test_draw_circle_keeps_center() {
        let pts = ShapeKind::Circle.recompute_on_draw([10.0, 10.0], [14.0, 13.0]);
        assert_eq!(pts, vec![[10.0, 10.0], [14.0, 13.0]]);
    }

    /// 椭圆绘制: 四个轴端点关于锚点对称.
    #[test]
    fn test_draw_ellipse_symmetric() {
        let pts = ShapeKind::Ellipse.recompute_on_draw([10.0, 10.0], [13.0, 14.0]);
        assert_eq!(pts[0], [10.0, 14.0]); // 下
        assert_eq!(pts[1], [10.0, 6.0]); // 上
        assert_eq!(pts[2], [7.0, 10.0]); // 左
        assert_eq!(pts[3], [13.0, 10.0]); // 右
    }

    /// 矩形绘制: 指针在锚点左上方时角点槽位语义依然成立.
    #[test]
    fn test_draw_rectangle_any_quadrant() {
        let pts = ShapeKind::Rectangle.recompute_on_draw([10.0, 10.0], [4.0, 2.0]);
        assert_eq!(pts, vec![[4.0, 2.0], [10.0, 2.0], [4.0, 10.0], [10.0, 10.0]]);
    }

    #[test]
    fn test_area_formulas() {
        let a = ShapeKind::Circle.area(4.0, 4.0);
        assert!((a - std::f64::consts::PI * 4.0).abs() < 1e-12);
        let a = ShapeKind::Ellipse.area(4.0, 6.0);
        assert!((a - std::f64::consts::PI * 6.0).abs() < 1e-12);
        assert_eq!(ShapeKind::Rectangle.area(4.0, 6.0), 24.0);
        assert_eq!(ShapeKind::Probe.area(4.0, 6.0), 0.0);
    }

    #[test]
    fn test_ellipse_world_contains() {
        let e = EllipseWorld::new(
            [0.0, 0.0, 0.0],
            2.0,
            1.0,
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        );
        assert!(e.contains([0.0, 0.0, 0.0]));
        assert!(e.contains([2.0, 0.0, 0.0]));
        assert!(e.contains([0.0, 1.0, 0.0]));
        assert!(!e.contains([2.0, 1.0, 0.0]));
        assert!(!e.contains([0.0, 1.1, 0.0]));
        // 面外分量不影响判定 (谓词在视平面基上).
        assert!(e.contains([1.0, 0.0, 5.0]));
    }

    /// 斜视基下的椭圆判定.
    #[test]
    fn test_ellipse_world_oblique_basis() {
        let inv_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;
        let right = [inv_sqrt2, inv_sqrt2, 0.0];
        let up = [-inv_sqrt2, inv_sqrt2, 0.0];
        let e = EllipseWorld::new([0.0, 0.0, 0.0], 1.0, 1.0, right, up);
        // 基向量端点恰在边界.
        assert!(e.contains(right));
        assert!(!e.contains([1.1 * inv_sqrt2, 1.1 * inv_sqrt2, 0.0]));
    }

    #[test]
    fn test_degenerate_ellipse_contains_nothing() {
        let e = EllipseWorld::new(
            [0.0, 0.0, 0.0],
            0.0,
            1.0,
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        );
        assert!(!e.contains([0.0, 0.0, 0.0]));
    }
}
