//! 错误类型
//!
//! 流水线对外只暴露 [`ScanError`]，每种失败都带有明确的类别与描述信息。

use std::time::Duration;

use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// 模型在启动时加载失败；检测器会降级为不可用状态，而不是向外传播
    #[error("模型加载错误: {0}")]
    ModelLoad(String),
    /// 图像无法读取、解码，或尺寸为零
    #[error("图像无效: {0}")]
    InvalidImage(String),
    /// 推理调用失败或输出形状不兼容，不做重试
    #[error("推理失败: {0}")]
    Inference(String),
    /// 配置、类别或零件目录文件无法读取
    #[error("配置错误: {0}")]
    Config(String),
    /// 外部服务设定的截止时间已过
    #[error("检测超时: {0:?}")]
    Timeout(Duration),
}

impl ScanError {
    /// 错误类别名称，供外部服务组装响应
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::ModelLoad(_) => "ModelLoadFailure",
            ScanError::InvalidImage(_) => "InvalidImage",
            ScanError::Inference(_) => "InferenceFailure",
            ScanError::Config(_) => "ConfigError",
            ScanError::Timeout(_) => "Timeout",
        }
    }
}

impl From<ort::Error> for ScanError {
    fn from(err: ort::Error) -> Self {
        error!("ONNX Runtime 错误: {}", err);
        ScanError::Inference(err.to_string())
    }
}

impl From<image::ImageError> for ScanError {
    fn from(err: image::ImageError) -> Self {
        ScanError::InvalidImage(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ScanError {
    fn from(err: ndarray::ShapeError) -> Self {
        ScanError::Inference(format!("输出张量形状错误: {}", err))
    }
}
