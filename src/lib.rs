pub mod config;
pub mod error;
pub mod scan;
pub mod service;

// 重新导出scan模块中的常用类型和函数
pub use config::ScanConfig;
pub use error::ScanError;
pub use scan::{
    AggregatedBrick, BoundingBox, BrickColor, BrickScanner, Detection, InventoryItem, PartCatalog, ScanReport,
};
pub use scan::{Inference, RawPrediction, draw_detections, load_image};
pub use service::ScanService;
