//! 推理边界
//!
//! 模型会话被视为一个纯函数：输入归一化张量，输出原始预测张量。
//! 检测流水线只依赖 [`Inference`] trait，便于在测试中替换为固定输出。

use std::sync::Mutex;

use ndarray::{Array2, Array4};
use ort::{inputs, session::Session, value::Tensor};
use tracing::debug;

use crate::error::ScanError;

/// 推理后端
///
/// 实现必须允许多个请求并发调用；若底层运行时不可重入，应在实现内部加锁，
/// 且锁的范围只覆盖模型句柄本身。
pub trait Inference: Send + Sync {
    fn infer(&self, input: &Array4<f32>) -> Result<RawPrediction, ScanError>;
}

/// 模型原始输出
///
/// 形状可以是 `[N, 4+C]`、`[4+C, N]`，或带有大小为 1 的批次维度。
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl RawPrediction {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// 从按行排列的 `[N, 4+C]` 数组构造
    pub fn from_rows(rows: &Array2<f32>) -> Self {
        Self {
            shape: rows.shape().to_vec(),
            data: rows.iter().copied().collect(),
        }
    }

    /// 规整为 `[N, 4+C]` 的二维数组
    ///
    /// 若恰好有一个维度等于 `4 + class_count`，该维度视为特征维；否则较小的维度为特征维。
    ///
    /// # 错误处理
    /// 形状与数据长度不符、批次大小不为 1、或特征维小于 5 时返回 [`ScanError::Inference`]
    pub fn into_rows(self, class_count: usize) -> Result<Array2<f32>, ScanError> {
        let dims: Vec<usize> = match self.shape.as_slice() {
            [1, a, b] => vec![*a, *b],
            [a, b] => vec![*a, *b],
            other => {
                return Err(ScanError::Inference(format!("模型输出形状不符合预期: {:?}", other)));
            }
        };

        let (a, b) = (dims[0], dims[1]);
        if a * b != self.data.len() {
            return Err(ScanError::Inference(format!(
                "模型输出数据长度 {} 与形状 {:?} 不符",
                self.data.len(),
                self.shape
            )));
        }

        let features = 4 + class_count;
        let transposed = match (a == features, b == features) {
            (true, false) => true,
            (false, true) => false,
            _ => a < b,
        };

        let array = Array2::from_shape_vec((a, b), self.data)?;
        let rows = if transposed {
            array.reversed_axes().as_standard_layout().into_owned()
        } else {
            array
        };

        if rows.ncols() < 5 {
            return Err(ScanError::Inference(format!(
                "模型输出特征维过小: {}，至少需要 4 个坐标和 1 个类别分数",
                rows.ncols()
            )));
        }

        Ok(rows)
    }
}

/// 基于 ONNX Runtime 的推理后端
///
/// `Session::run` 需要可变借用，因此会话被放在互斥锁之后，
/// 并发请求只在推理调用处串行。
pub struct OrtInference {
    session: Mutex<Session>,
    input_name: String,
}

impl OrtInference {
    pub fn new(session: Session, input_name: impl Into<String>) -> Self {
        Self {
            session: Mutex::new(session),
            input_name: input_name.into(),
        }
    }
}

impl Inference for OrtInference {
    fn infer(&self, input: &Array4<f32>) -> Result<RawPrediction, ScanError> {
        let shape: Vec<usize> = input.shape().to_vec();
        let (data, _offset) = input.as_standard_layout().into_owned().into_raw_vec_and_offset();
        let input_tensor = Tensor::from_array(([shape[0], shape[1], shape[2], shape[3]], data))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ScanError::Inference("模型会话锁已损坏".to_string()))?;
        let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

        let (out_shape, out_data) = outputs[0].try_extract_tensor::<f32>()?;
        let out_shape: Vec<usize> = out_shape.iter().map(|&d| d.max(0) as usize).collect();
        debug!("模型输出形状: {:?}", out_shape);

        Ok(RawPrediction::new(out_shape, out_data.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn row_major_output_is_kept() {
        let raw = RawPrediction::new(vec![1, 2, 6], vec![1., 2., 3., 4., 0.9, 0.1, 5., 6., 7., 8., 0.2, 0.8]);
        let rows = raw.into_rows(2).unwrap();
        assert_eq!(rows, array![[1., 2., 3., 4., 0.9, 0.1], [5., 6., 7., 8., 0.2, 0.8]]);
    }

    #[test]
    fn feature_major_output_is_transposed() {
        // [4+C, N] = [5, 3]
        let raw = RawPrediction::new(
            vec![1, 5, 3],
            vec![
                10., 20., 30., // cx
                11., 21., 31., // cy
                12., 22., 32., // w
                13., 23., 33., // h
                0.5, 0.6, 0.7, // class 0
            ],
        );
        let rows = raw.into_rows(1).unwrap();
        assert_eq!(rows.shape(), &[3, 5]);
        assert_eq!(rows.row(1).to_vec(), vec![20., 21., 22., 23., 0.6]);
    }

    #[test]
    fn class_count_disambiguates_orientation() {
        // 2 行 × 6 特征，但行数少于特征数时仍按类别数判断
        let raw = RawPrediction::new(vec![2, 6], vec![0.0; 12]);
        assert_eq!(raw.into_rows(2).unwrap().shape(), &[2, 6]);
    }

    #[test]
    fn mismatched_length_is_inference_error() {
        let raw = RawPrediction::new(vec![1, 5, 3], vec![0.0; 10]);
        assert!(matches!(raw.into_rows(1), Err(ScanError::Inference(_))));
    }

    #[test]
    fn too_few_features_is_inference_error() {
        let raw = RawPrediction::new(vec![3, 4], vec![0.0; 12]);
        assert!(matches!(raw.into_rows(0), Err(ScanError::Inference(_))));
    }

    #[test]
    fn unexpected_rank_is_inference_error() {
        let raw = RawPrediction::new(vec![1, 1, 5, 3], vec![0.0; 15]);
        assert!(matches!(raw.into_rows(1), Err(ScanError::Inference(_))));
    }
}
