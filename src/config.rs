//! 配置模块
//!
//! 集中存放检测流水线的默认超参数、颜色分类常量，以及运行时配置结构 [`ScanConfig`]。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

// 目标检测超参数配置
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_INPUT_NAME: &str = "images";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
pub const DEFAULT_PAD_VALUE: u8 = 114;
pub const DEFAULT_INTRA_THREADS: usize = 4;
pub const DEFAULT_MODEL_PATH: &str = "best.onnx";

// 类别与零件目录
pub const DEFAULT_CLASS_LABEL: &str = "lego_brick";
pub const UNKNOWN_CLASS_LABEL: &str = "unknown";
pub const UNKNOWN_PART_ID: &str = "unknown";

// 颜色分类常量，饱和度与明度使用 0-255 刻度，色相使用角度 [0, 360)
pub const COLOR_MIN_REGION: u32 = 10;
pub const COLOR_LOW_SATURATION: f32 = 40.0;
pub const COLOR_DARK_VALUE: f32 = 50.0;
pub const COLOR_BRIGHT_VALUE: f32 = 200.0;
pub const HUE_RED_LOW: f32 = 20.0;
pub const HUE_RED_HIGH: f32 = 340.0;
pub const HUE_ORANGE: f32 = 50.0;
pub const HUE_YELLOW: f32 = 70.0;
pub const HUE_GREEN: f32 = 170.0;
pub const HUE_BLUE: f32 = 260.0;

/// 检测流水线配置
///
/// 所有字段都有默认值，JSON 配置文件中可以只写需要覆盖的字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// ONNX 模型文件路径
    pub model_path: PathBuf,
    /// 类别名称文件，每行一个名称，顺序与模型的类别分数对齐
    pub class_names_path: Option<PathBuf>,
    /// 零件目录文件，每行 `名称,零件编号`；缺省时使用内置目录
    pub catalog_path: Option<PathBuf>,
    /// 模型输入边长（正方形）
    pub input_size: u32,
    /// 模型输入节点名称
    pub input_name: String,
    /// 置信度阈值，不高于此值的候选框将被丢弃
    pub confidence_threshold: f32,
    /// NMS 的 IoU 阈值
    pub iou_threshold: f32,
    /// 信箱填充的灰度值
    pub pad_value: u8,
    /// ONNX Runtime 算子内线程数
    pub intra_threads: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            class_names_path: None,
            catalog_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            input_name: DEFAULT_INPUT_NAME.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_NMS_THRESHOLD,
            pad_value: DEFAULT_PAD_VALUE,
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

impl ScanConfig {
    /// 以模型路径创建配置，其余字段使用默认值
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    /// 从 JSON 文件加载配置
    ///
    /// # 错误处理
    /// 文件无法读取或内容无法解析时返回 [`ScanError::Config`]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("无法读取配置文件 {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ScanError::Config(format!("配置文件 {} 格式错误: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 检查配置取值
    ///
    /// # 错误处理
    /// 输入边长为 0、输入节点名称为空、或阈值不在 [0, 1] 内时返回 [`ScanError::Config`]
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.input_size == 0 {
            return Err(ScanError::Config("模型输入边长必须大于 0".to_string()));
        }
        if self.input_name.trim().is_empty() {
            return Err(ScanError::Config("模型输入节点名称不能为空".to_string()));
        }
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanError::Config(format!("{} 必须在 [0, 1] 内: {}", name, value)));
            }
        }
        Ok(())
    }

    pub fn with_class_names(mut self, path: impl Into<PathBuf>) -> Self {
        self.class_names_path = Some(path.into());
        self
    }

    pub fn with_catalog(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    /// 设置置信度阈值 (0.0 - 1.0)
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// 设置NMS阈值 (0.0 - 1.0)
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }
}
