use std::path::Path;
use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{ScanConfig, UNKNOWN_CLASS_LABEL};
use crate::error::ScanError;
use crate::scan::bounds::Detection;
use crate::scan::hue::classify_region;
use crate::scan::infer::{Inference, OrtInference};
use crate::scan::model::{ModelInput, load_class_names, load_model, model_input};
use crate::scan::posts::{apply_nms, decode, rescale};
use crate::scan::prevs::{load_image, preprocess};
use crate::scan::tally::{AggregatedBrick, InventoryItem, PartCatalog, aggregate};

/// 一次检测的完整结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// 模型是否可用；为 `false` 时结果恒为空
    pub available: bool,
    /// 逐框检测结果（原图坐标）
    pub detections: Vec<Detection>,
    /// 按 (类别, 颜色) 聚合后的积木清单
    pub bricks: Vec<AggregatedBrick>,
    /// 处理耗时（毫秒）
    pub elapsed_ms: f64,
}

impl ScanReport {
    /// 模型不可用时的空结果
    pub fn unavailable() -> Self {
        Self { available: false, ..Self::default() }
    }

    /// 检测到的积木总数
    pub fn total_bricks(&self) -> u32 {
        self.bricks.iter().map(|b| b.quantity).sum()
    }

    /// 聚合清单，边界框为 `[x, y, w, h]`
    pub fn inventory(&self) -> Vec<InventoryItem> {
        self.bricks.iter().map(InventoryItem::from).collect()
    }
}

enum Backend {
    Ready(Box<dyn Inference>),
    Disabled(String),
}

/// 积木检测器
///
/// 封装了完整的检测流程：信箱预处理、模型推理、解码、NMS、坐标还原、
/// 颜色识别以及聚合计数。模型句柄由检测器独占，可在多个线程间共享调用。
///
/// # 示例
///
/// ```no_run
/// use brickscan::{BrickScanner, ScanConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScanConfig::new("best.onnx")
///     .with_class_names("class_names.txt")
///     .with_confidence_threshold(0.25);
/// let scanner = BrickScanner::new(config)?;
/// let report = scanner.scan_path("lego.jpg")?;
/// for brick in &report.bricks {
///     println!("{} {} x{}", brick.name, brick.color, brick.quantity);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BrickScanner {
    backend: Backend,
    class_names: Vec<String>,
    catalog: PartCatalog,
    config: ScanConfig,
}

impl BrickScanner {
    /// 按配置创建检测器
    ///
    /// 配置无效、类别名称或零件目录文件读取失败会返回错误；模型加载失败则不会，
    /// 检测器进入不可用状态，之后每次检测都返回空结果和不可用标志。
    ///
    /// 模型加载成功后，输入节点名称与边长以模型声明的为准，配置中的值仅作后备。
    pub fn new(mut config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let class_names = load_class_names(config.class_names_path.as_deref())?;
        let catalog = match &config.catalog_path {
            Some(path) => PartCatalog::from_file(path)?,
            None => PartCatalog::default(),
        };

        let backend = match load_model(&config.model_path, config.intra_threads) {
            Ok(session) => {
                adopt_model_input(&mut config, model_input(&session));
                info!(
                    "检测器就绪: 输入 {}x{}, {} 个类别, 置信度阈值 {}, NMS 阈值 {}",
                    config.input_size,
                    config.input_size,
                    class_names.len(),
                    config.confidence_threshold,
                    config.iou_threshold
                );
                Backend::Ready(Box::new(OrtInference::new(session, config.input_name.clone())))
            }
            Err(e) => {
                error!("模型不可用，检测器已禁用: {}", e);
                Backend::Disabled(e.to_string())
            }
        };

        Ok(Self { backend, class_names, catalog, config })
    }

    /// 使用给定的推理后端创建检测器
    pub fn with_backend(
        config: ScanConfig,
        backend: Box<dyn Inference>,
        class_names: Vec<String>,
        catalog: PartCatalog,
    ) -> Self {
        Self { backend: Backend::Ready(backend), class_names, catalog, config }
    }

    /// 创建一个不可用的检测器
    pub fn disabled(config: ScanConfig, reason: impl Into<String>) -> Self {
        Self {
            backend: Backend::Disabled(reason.into()),
            class_names: Vec::new(),
            catalog: PartCatalog::default(),
            config,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    /// 不可用的原因（模型加载错误信息）
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.backend {
            Backend::Ready(_) => None,
            Backend::Disabled(reason) => Some(reason),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn catalog(&self) -> &PartCatalog {
        &self.catalog
    }

    /// 检测图像文件
    pub fn scan_path(&self, path: impl AsRef<Path>) -> Result<ScanReport, ScanError> {
        if !self.is_available() {
            return Ok(ScanReport::unavailable());
        }
        let image = load_image(path)?;
        self.scan_image(&image)
    }

    /// 检测已解码的图像
    ///
    /// # 错误处理
    /// 图像尺寸为零时返回 [`ScanError::InvalidImage`]，输入边长为零时返回 [`ScanError::Config`]，
    /// 推理失败时返回 [`ScanError::Inference`]
    pub fn scan_image(&self, image: &RgbImage) -> Result<ScanReport, ScanError> {
        let model = match &self.backend {
            Backend::Ready(model) => model,
            Backend::Disabled(_) => return Ok(ScanReport::unavailable()),
        };

        let start_time = Instant::now();
        let (tensor, letterbox) = preprocess(image, self.config.input_size, self.config.pad_value)?;

        let infer_time = Instant::now();
        let raw = model.infer(&tensor)?;
        debug!("模型推理耗时: {:?}", infer_time.elapsed());

        let rows = raw.into_rows(self.class_names.len())?;
        let candidates = decode(&rows, self.config.confidence_threshold);
        let kept = apply_nms(candidates, self.config.iou_threshold);
        let kept = rescale(&kept, &letterbox);

        let detections: Vec<Detection> = kept
            .into_iter()
            .map(|c| Detection {
                bbox: c.bbox,
                class_id: c.class_id,
                class_name: self.class_name(c.class_id).to_string(),
                confidence: c.confidence,
                color: classify_region(image, &c.bbox),
            })
            .collect();

        let bricks = aggregate(&detections, &self.catalog);
        let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        info!(
            "检测完成: {} 个检测框, {} 种积木, 耗时 {:.1} ms",
            detections.len(),
            bricks.len(),
            elapsed_ms
        );

        Ok(ScanReport { available: true, detections, bricks, elapsed_ms })
    }

    fn class_name(&self, class_id: usize) -> &str {
        self.class_names
            .get(class_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CLASS_LABEL)
    }
}

/// 用模型声明的输入覆盖配置；模型未声明或为动态维度时保留配置值
fn adopt_model_input(config: &mut ScanConfig, input: Option<ModelInput>) {
    let Some(input) = input else {
        warn!("无法读取模型输入信息，使用配置值 {} ({})", config.input_name, config.input_size);
        return;
    };

    if !input.name.is_empty() && input.name != config.input_name {
        debug!("模型输入节点: {} (配置为 {})", input.name, config.input_name);
        config.input_name = input.name;
    }
    match input.size {
        Some(size) if size != config.input_size => {
            debug!("模型输入边长: {} (配置为 {})", size, config.input_size);
            config.input_size = size;
        }
        Some(_) => {}
        None => debug!("模型输入边长为动态维度，使用配置值 {}", config.input_size),
    }
}
