//! 世界空间向量运算.
//!
//! 所有函数均在 `[f64; 3]` 上以分量方式工作, 不引入线性代数库.

use crate::consts::DEGENERATE_DISTANCE;
use crate::{Point3, Vec3};

/// 向量减法 `a - b`.
#[inline]
pub fn sub(a: Point3, b: Point3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// 向量加法 `a + b`.
#[inline]
pub fn add(a: Point3, b: Vec3) -> Point3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// 标量乘法 `v * s`.
#[inline]
pub fn scale(v: Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// 点积.
#[inline]
pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 叉积 `a × b`.
#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// 向量长度.
#[inline]
pub fn length(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

/// 两点欧氏距离.
#[inline]
pub fn distance(a: Point3, b: Point3) -> f64 {
    length(sub(a, b))
}

/// 单位化. 零向量 (长度小于 `1e-12`) 返回 `None`.
#[inline]
pub fn normalize(v: Vec3) -> Option<Vec3> {
    let len = length(v);
    (len > 1e-12).then(|| scale(v, 1.0 / len))
}

/// 两点中点.
#[inline]
pub fn midpoint(a: Point3, b: Point3) -> Point3 {
    [
        (a[0] + b[0]) / 2.0,
        (a[1] + b[1]) / 2.0,
        (a[2] + b[2]) / 2.0,
    ]
}

/// 将两个世界点之差分解为视平面内的 `(宽, 高)` 分量.
///
/// 宽方向为视图右向量 (`cross(viewUp, viewPlaneNormal)` 取反),
/// 高方向为 `viewUp`. 即使相机为斜视图, 分解结果依然有意义.
///
/// 两点距离小于 [`DEGENERATE_DISTANCE`] 时直接返回 `(0.0, 0.0)`,
/// 不传播接近零的分母误差.
pub fn world_width_height(a: Point3, b: Point3, view_up: Vec3, view_plane_normal: Vec3) -> (f64, f64) {
    if distance(a, b) < DEGENERATE_DISTANCE {
        return (0.0, 0.0);
    }

    let Some(right) = normalize(scale(cross(view_up, view_plane_normal), -1.0)) else {
        return (0.0, 0.0);
    };
    let Some(up) = normalize(view_up) else {
        return (0.0, 0.0);
    };

    let diff = sub(b, a);
    (dot(diff, right).abs(), dot(diff, up).abs())
}

/// 视图右向量: `cross(viewUp, viewPlaneNormal)` 取反后单位化.
///
/// `viewUp` 与法向共线时返回 `None`.
#[inline]
pub fn view_right(view_up: Vec3, view_plane_normal: Vec3) -> Option<Vec3> {
    normalize(scale(cross(view_up, view_plane_normal), -1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_cross_axis() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
        assert_eq!(cross([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_zero() {
        assert!(normalize([0.0, 0.0, 0.0]).is_none());
        let v = normalize([3.0, 0.0, 4.0]).unwrap();
        assert!(f64_eq(length(v), 1.0));
    }

    /// 轴向相机下的宽高分解就是分量差的绝对值.
    #[test]
    fn test_world_width_height_axial() {
        // 轴向视图: 法向 +z, up +y, 右向量 = -cross(up, normal) = -x;
        // 分量取绝对值, 不影响宽度.
        let (w, h) = world_width_height(
            [1.0, 2.0, 5.0],
            [4.0, 6.0, 5.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        );
        assert!(f64_eq(w, 3.0));
        assert!(f64_eq(h, 4.0));
    }

    /// 面内旋转 45 度的相机.
    #[test]
    fn test_world_width_height_rotated() {
        let inv_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;
        let up = [inv_sqrt2, inv_sqrt2, 0.0];
        let normal = [0.0, 0.0, 1.0];
        let (w, h) = world_width_height([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], up, normal);
        assert!(f64_eq(w, 0.0));
        assert!(f64_eq(h, 2.0 * inv_sqrt2));
    }

    /// 近重合点直接得到 (0, 0).
    #[test]
    fn test_world_width_height_degenerate() {
        let a = [1.0, 1.0, 1.0];
        let b = [1.0 + 1e-5, 1.0, 1.0];
        let (w, h) = world_width_height(a, b, [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
        assert_eq!((w, h), (0.0, 0.0));
    }
}
