//! 从模态与预缩放标志解析体素值单位标签.

use crate::consts::units;

/// 采集模态. 决定体素强度的物理含义.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modality {
    /// Computed Tomography.
    Ct,

    /// Positron Emission Tomography.
    Pt,

    /// 超声.
    Us,

    /// 磁共振.
    Mr,

    /// 其他模态, 保留原始字符串.
    Other(String),
}

impl Modality {
    /// 模态的标准缩写.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ct => "CT",
            Self::Pt => "PT",
            Self::Us => "US",
            Self::Mr => "MR",
            Self::Other(s) => s,
        }
    }
}

/// 体素强度的预缩放信息 (主要与 PT 相关).
#[derive(Clone, Debug, Default)]
pub struct PreScaling {
    /// 强度是否已被预缩放.
    pub scaled: bool,

    /// 预缩放是否为 SUV 缩放.
    pub suv: bool,

    /// 序列声明的单位字符串 (若有).
    pub declared_unit: Option<String>,
}

/// 解析体素值单位标签.
///
/// CT 固定为 `HU`. PT 依预缩放状态为 `raw` / `SUV` /
/// 声明单位 (缺省 `unitless`). 其余模态为空字符串.
pub fn modality_unit(modality: &Modality, pre: &PreScaling) -> String {
    match modality {
        Modality::Ct => units::HU.to_owned(),
        Modality::Pt => {
            if !pre.scaled {
                units::RAW.to_owned()
            } else if pre.suv {
                units::SUV.to_owned()
            } else {
                pre.declared_unit
                    .clone()
                    .unwrap_or_else(|| units::UNITLESS.to_owned())
            }
        }
        _ => String::new(),
    }
}
