//! 物理单位标定解析.
//!
//! 将图像的标定元数据与 ROI 的两个包围索引点解析为
//! `{长度单位, 面积单位, 体积单位, 网格→物理 scale}`.
//! 解析按多级回退进行:
//!
//! 1. 无标定 / 显式未标定 → 像素单位, `scale = 1`;
//! 2. 超声 region 标定 → 选择同时包含两个包围点的 region.
//!   无 region 合格时落回第 3 级 (而不是裸像素 —— 此时 ROI 横跨了
//!   有标注 region 与背景); 合格但数据类型 / 单位配对不受支持或
//!   X/Y 物理增量各向异性时拒绝标定, 降级为裸像素 (单个标量
//!   无法表达各向异性面积);
//! 3. 图像存在一般 mm 间距时用 mm, 否则像素; 命名标定种类
//!   (ERMF / User / Error / Proj) 追加到单位标签后.
//!
//! 所有降级都是静默的, 本模块不抛出任何错误.

use crate::consts::{units, ISOTROPY_EPSILON};

type Idx2dI64 = (i64, i64);

/// 标定种类.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CalibrationKind {
    /// 无标定.
    None,

    /// 超声 region 标定.
    Region,

    /// Estimated Radiographic Magnification Factor.
    Ermf,

    /// 用户手动标定.
    User,

    /// 错误标定 (已知不可信, 仅作标签提示).
    Error,

    /// 投影标定.
    Projection,
}

impl CalibrationKind {
    /// 追加到单位标签后的后缀. `None` / `Region` 无后缀.
    #[inline]
    pub const fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::None | Self::Region => None,
            Self::Ermf => Some("ERMF"),
            Self::User => Some("User"),
            Self::Error => Some("Error"),
            Self::Projection => Some("Proj"),
        }
    }
}

/// 单张图像的标定元数据. 由外部供给, 对本 crate 只读.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    kind: CalibrationKind,
    scale: Option<f64>,
    aspect: Option<f64>,
    regions: Vec<UltrasoundRegion>,
}

impl Calibration {
    /// 无标定.
    #[inline]
    pub const fn uncalibrated() -> Self {
        Self {
            kind: CalibrationKind::None,
            scale: None,
            aspect: None,
            regions: Vec::new(),
        }
    }

    /// 超声 region 标定. region 顺序即声明顺序, 解析时第一个
    /// 合格者胜出.
    pub fn with_regions(regions: Vec<UltrasoundRegion>) -> Self {
        Self {
            kind: CalibrationKind::Region,
            scale: None,
            aspect: None,
            regions,
        }
    }

    /// 命名标定 (ERMF / User / Error / Projection).
    pub fn named(kind: CalibrationKind, scale: Option<f64>, aspect: Option<f64>) -> Self {
        Self {
            kind,
            scale,
            aspect,
            regions: Vec::new(),
        }
    }

    /// 标定种类.
    #[inline]
    pub fn kind(&self) -> CalibrationKind {
        self.kind
    }

    /// 命名标定的标量 (若有).
    #[inline]
    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    /// 命名标定的纵横比 (若有).
    #[inline]
    pub fn aspect(&self) -> Option<f64> {
        self.aspect
    }

    /// 超声 region 列表.
    #[inline]
    pub fn regions(&self) -> &[UltrasoundRegion] {
        &self.regions
    }
}

/// 超声序列中的一个标定 region.
///
/// 像素边界为闭区间, 物理增量单位由 `physical_units_*` 的
/// DICOM 代码描述 (3 = cm, 4 = seconds, 7 = cm/sec).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UltrasoundRegion {
    /// region 数据类型 (1 = tissue, 2 = color flow, 3 = spectral Doppler).
    pub data_type: u16,

    /// 像素 X 下界.
    pub location_min_x0: i64,

    /// 像素 X 上界.
    pub location_max_x1: i64,

    /// 像素 Y 下界.
    pub location_min_y0: i64,

    /// 像素 Y 上界.
    pub location_max_y1: i64,

    /// X 方向物理单位代码.
    pub physical_units_x: u16,

    /// Y 方向物理单位代码.
    pub physical_units_y: u16,

    /// X 方向每像素物理增量.
    pub physical_delta_x: f64,

    /// Y 方向每像素物理增量.
    pub physical_delta_y: f64,

    /// 参考像素 X.
    pub reference_pixel_x0: f64,

    /// 参考像素 Y.
    pub reference_pixel_y0: f64,
}

impl UltrasoundRegion {
    /// 判断像素点是否落在 region 矩形内 (闭区间).
    #[inline]
    pub fn contains(&self, (x, y): Idx2dI64) -> bool {
        (self.location_min_x0..=self.location_max_x1).contains(&x)
            && (self.location_min_y0..=self.location_max_y1).contains(&y)
    }

    /// region 数据类型是否受支持 (tissue / color flow / spectral Doppler).
    #[inline]
    pub const fn supported_data_type(&self) -> bool {
        matches!(self.data_type, 1..=3)
    }

    /// 受支持的单位配对映射到的长度单位标签.
    ///
    /// cm/cm 或 seconds / cm-per-second 之外的配对返回 `None`.
    #[inline]
    pub const fn unit_label(&self) -> Option<&'static str> {
        match (self.physical_units_x, self.physical_units_y) {
            (3, 3) => Some(units::CENTIMETER),
            (4, 7) => Some(units::CM_PER_SECOND),
            _ => None,
        }
    }

    /// X/Y 物理增量是否各向同性 (绝对值之差小于
    /// [`ISOTROPY_EPSILON`]).
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        (self.physical_delta_x.abs() - self.physical_delta_y.abs()).abs() < ISOTROPY_EPSILON
    }
}

/// 单位解析结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleResolution {
    /// 长度单位标签.
    pub unit: String,

    /// 面积单位标签.
    pub area_unit: String,

    /// 体积单位标签.
    pub volume_unit: String,

    /// 网格 → 物理的标量换算因子. 面积公式以 `/ scale²` 应用它.
    pub scale: f64,
}

impl ScaleResolution {
    fn from_unit(unit: String, scale: f64) -> Self {
        Self {
            area_unit: units::squared(&unit),
            volume_unit: units::cubed(&unit),
            unit,
            scale,
        }
    }

    /// 裸像素结果.
    fn raw_pixels() -> Self {
        Self::from_unit(units::PIXEL.to_owned(), 1.0)
    }
}

/// 解析 ROI 的长度 / 面积单位与 scale.
///
/// `p0` / `p1` 是 ROI 的两个包围体素索引点 (仅取切片内的 x/y 分量),
/// `has_mm_spacing` 指示图像是否带一般 mm 间距.
pub fn resolve_units(
    calibration: &Calibration,
    has_mm_spacing: bool,
    p0: Idx2dI64,
    p1: Idx2dI64,
) -> ScaleResolution {
    match calibration.kind() {
        CalibrationKind::Region => resolve_regions(calibration, has_mm_spacing, p0, p1),
        _ => resolve_general(calibration.kind(), has_mm_spacing),
    }
}

/// 超声 region 层: 第一个同时包含两个包围点的受支持 region 胜出.
fn resolve_regions(
    calibration: &Calibration,
    has_mm_spacing: bool,
    p0: Idx2dI64,
    p1: Idx2dI64,
) -> ScaleResolution {
    let mut candidates = calibration
        .regions()
        .iter()
        .filter(|r| r.contains(p0) && r.contains(p1))
        .peekable();

    if candidates.peek().is_none() {
        // ROI 横跨 region 与背景: 落回一般层, 而非裸像素.
        return resolve_general(CalibrationKind::None, has_mm_spacing);
    }

    let supported = candidates.find(|r| r.supported_data_type() && r.unit_label().is_some());

    match supported {
        Some(region) if region.is_isotropic() => {
            // unit_label 在上方过滤中已确认存在.
            let unit = region.unit_label().unwrap().to_owned();
            ScaleResolution::from_unit(unit, 1.0 / region.physical_delta_x)
        }
        // 不受支持或各向异性: 拒绝标定.
        _ => ScaleResolution::raw_pixels(),
    }
}

/// 一般层: mm 间距或像素, 外加命名标定后缀.
fn resolve_general(kind: CalibrationKind, has_mm_spacing: bool) -> ScaleResolution {
    let base = if has_mm_spacing {
        units::MILLIMETER
    } else {
        units::PIXEL
    };
    let unit = match kind.suffix() {
        Some(suffix) => format!("{base} {suffix}"),
        None => base.to_owned(),
    };
    ScaleResolution::from_unit(unit, 1.0)
}

mod modality;

pub use modality::{modality_unit, Modality, PreScaling};
