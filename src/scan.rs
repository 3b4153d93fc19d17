//! Scan模块 - 基于YOLO的积木检测与计数
//!
//! 该模块提供从照片到积木清单的完整流水线，包括：
//! - 模型与类别名称加载
//! - 信箱预处理
//! - 模型推理
//! - 解码、非极大值抑制与坐标还原
//! - 颜色识别
//! - 按类别和颜色聚合，并解析零件编号
//!
//! # 工作流程
//!
//! 1. 使用 [`ScanConfig`](crate::ScanConfig) 描述模型路径与阈值
//! 2. 创建 [`BrickScanner`]，模型在此时加载一次
//! 3. 调用 `scan_path` 或 `scan_image` 得到 [`ScanReport`]
//! 4. 可选：使用 [`draw_detections`] 绘制检测框

pub mod bounds;
pub mod detect;
pub mod draw;
pub mod hue;
pub mod infer;
pub mod model;
pub mod posts;
pub mod prevs;
pub mod tally;

// 重新导出常用类型和函数
pub use bounds::{BoundingBox, Candidate, CenterBox, Detection};
pub use detect::{BrickScanner, ScanReport};
pub use draw::draw_detections;
pub use hue::BrickColor;
pub use infer::{Inference, OrtInference, RawPrediction};
pub use model::{ModelInput, load_class_names, load_model, model_input};
pub use prevs::{Letterbox, load_image, preprocess};
pub use tally::{AggregatedBrick, InventoryItem, PartCatalog, aggregate};
