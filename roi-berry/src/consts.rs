//! 通用常量.

/// 物理单位标签.
pub mod units {
    /// 无标定时的长度单位 (像素).
    pub const PIXEL: &str = "px";

    /// 一般 mm 间距标定的长度单位.
    pub const MILLIMETER: &str = "mm";

    /// 超声 region 标定 (cm/cm 配对) 的长度单位.
    pub const CENTIMETER: &str = "cm";

    /// 超声 region 标定 (seconds / cm-per-second 配对) 的复合单位.
    pub const CM_PER_SECOND: &str = "cm/s";

    /// CT 体素值单位 (Hounsfield Unit).
    pub const HU: &str = "HU";

    /// PT 体素值经 SUV 缩放后的单位.
    pub const SUV: &str = "SUV";

    /// PT 体素值未经预缩放时的单位.
    pub const RAW: &str = "raw";

    /// PT 体素值缺省单位.
    pub const UNITLESS: &str = "unitless";

    /// 由长度单位构造面积单位.
    ///
    /// 复合 region 单位 (含 `/`) 已自带含义, 不追加平方后缀.
    pub fn squared(unit: &str) -> String {
        if unit.contains('/') {
            unit.to_owned()
        } else {
            format!("{unit}²")
        }
    }

    /// 由长度单位构造体积单位.
    pub fn cubed(unit: &str) -> String {
        if unit.contains('/') {
            unit.to_owned()
        } else {
            format!("{unit}³")
        }
    }
}

/// 超声 region 各向同性判定阈值: `|physicalDeltaX| ≈ |physicalDeltaY|`.
pub const ISOTROPY_EPSILON: f64 = 1e-3;

/// 两个世界点近于该距离时, 宽高分解直接返回 `(0, 0)`
/// 以避免接近零的分母.
pub const DEGENERATE_DISTANCE: f64 = 1e-4;

/// 视平面法向与坐标轴的对齐判定阈值. 超出该阈值的采集视为真斜视图.
pub const AXIS_ALIGNMENT_EPSILON: f64 = 1e-3;

/// 统计重算的尾沿节流窗口 (毫秒). 快速拖拽期间,
/// 重的体素遍历被限制在约每窗口一次.
pub const THROTTLE_WINDOW_MS: u64 = 100;

/// 空面积 ROI 在下游渲染的占位文本.
pub const EMPTY_AREA_TEXT: &str = "Oblique not supported";

#[cfg(test)]
mod tests {
    use super::units;

    #[test]
    fn test_squared_unit() {
        assert_eq!(units::squared(units::PIXEL), "px²");
        assert_eq!(units::squared(units::MILLIMETER), "mm²");
        assert_eq!(units::squared(units::CENTIMETER), "cm²");
        // 复合单位自带含义.
        assert_eq!(units::squared(units::CM_PER_SECOND), "cm/s");
    }

    #[test]
    fn test_cubed_unit() {
        assert_eq!(units::cubed(units::MILLIMETER), "mm³");
        assert_eq!(units::cubed(units::CM_PER_SECOND), "cm/s");
    }
}
