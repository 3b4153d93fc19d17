use std::path::Path;

use ort::session::{Session, builder::GraphOptimizationLevel};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_CLASS_LABEL;
use crate::error::ScanError;

/// 加载YOLO积木检测模型
///
/// 加载ONNX格式的模型，并应用优化配置。
///
/// # 参数
/// * `model_path` - 模型文件路径
/// * `intra_threads` - 算子内线程数
///
/// # 错误处理
/// 文件不存在或模型加载失败时返回 [`ScanError::ModelLoad`]
pub fn load_model(model_path: impl AsRef<Path>, intra_threads: usize) -> Result<Session, ScanError> {
    let model_path = model_path.as_ref();
    if !model_path.exists() {
        return Err(ScanError::ModelLoad(format!("模型文件不存在: {}", model_path.display())));
    }

    info!("加载模型文件: {}", model_path.display());
    let load = || -> Result<Session, ort::Error> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)
    };
    let model = load().map_err(|e| ScanError::ModelLoad(format!("{}: {}", model_path.display(), e)))?;
    info!("模型加载完成");
    Ok(model)
}

/// 模型第一个输入节点的描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInput {
    /// 输入节点名称
    pub name: String,
    /// 输入边长；动态维度时为 `None`
    pub size: Option<u32>,
}

/// 读取模型第一个输入节点的名称与边长
pub fn model_input(session: &Session) -> Option<ModelInput> {
    let input = session.inputs.first()?;
    let size = input
        .input_type
        .tensor_shape()
        .and_then(|shape| input_size_from_dims(shape));
    Some(ModelInput { name: input.name.clone(), size })
}

/// 从 NCHW 输入维度中取边长，第 3 维不是正数时返回 `None`
pub fn input_size_from_dims(dims: &[i64]) -> Option<u32> {
    dims.get(2)
        .copied()
        .filter(|&d| d > 0)
        .and_then(|d| u32::try_from(d).ok())
}

/// 加载类别名称
///
/// 每行一个名称，顺序与模型的类别分数对齐；文件缺失时返回默认类别 `lego_brick`。
///
/// # 错误处理
/// 文件存在但无法读取时返回 [`ScanError::Config`]
pub fn load_class_names(path: Option<&Path>) -> Result<Vec<String>, ScanError> {
    let Some(path) = path.filter(|p| p.exists()) else {
        if let Some(path) = path {
            warn!("类别名称文件不存在: {}，使用默认类别", path.display());
        }
        return Ok(vec![DEFAULT_CLASS_LABEL.to_string()]);
    };

    let text = std::fs::read_to_string(path)
        .map_err(|e| ScanError::Config(format!("无法读取类别名称文件 {}: {}", path.display(), e)))?;
    let mut names: Vec<String> = text.lines().map(|line| line.trim().to_string()).collect();
    while names.last().is_some_and(|n| n.is_empty()) {
        names.pop();
    }

    if names.is_empty() {
        warn!("类别名称文件为空: {}，使用默认类别", path.display());
        return Ok(vec![DEFAULT_CLASS_LABEL.to_string()]);
    }

    debug!("类别名称: {:?}", names);
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_class_file_falls_back_to_default() {
        assert_eq!(load_class_names(None).unwrap(), vec!["lego_brick"]);
        let missing = Path::new("/nonexistent/class_names.txt");
        assert_eq!(load_class_names(Some(missing)).unwrap(), vec!["lego_brick"]);
    }

    #[test]
    fn class_file_is_read_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "2x4 Brick\n  2x2 Brick \n1x2 Plate\n\n").unwrap();
        let names = load_class_names(Some(file.path())).unwrap();
        assert_eq!(names, vec!["2x4 Brick", "2x2 Brick", "1x2 Plate"]);
    }

    #[test]
    fn input_size_comes_from_height_axis() {
        assert_eq!(input_size_from_dims(&[1, 3, 640, 640]), Some(640));
        assert_eq!(input_size_from_dims(&[1, 3, 320, 320]), Some(320));
        // 动态维度
        assert_eq!(input_size_from_dims(&[-1, 3, -1, -1]), None);
        assert_eq!(input_size_from_dims(&[1, 3]), None);
        assert_eq!(input_size_from_dims(&[1, 3, 0, 0]), None);
    }

    #[test]
    fn missing_model_is_load_error() {
        let err = load_model("/nonexistent/best.onnx", 1).unwrap_err();
        assert!(matches!(err, ScanError::ModelLoad(_)));
    }
}
