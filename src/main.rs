use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use brickscan::{BrickScanner, ScanConfig, ScanReport, ScanService, draw_detections, load_image};

/// 积木检测与计数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 待检测的图像文件
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// JSON 配置文件，命令行参数会覆盖其中的字段
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// ONNX 模型文件路径
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// 类别名称文件（每行一个）
    #[arg(long, value_name = "FILE")]
    classes: Option<PathBuf>,

    /// 零件目录文件（每行 `名称,零件编号`）
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// 置信度阈值 (0.0 - 1.0)
    #[arg(long, value_name = "THRESHOLD")]
    confidence: Option<f32>,

    /// NMS IOU 阈值 (0.0 - 1.0)
    #[arg(long, value_name = "THRESHOLD")]
    iou: Option<f32>,

    /// 把绘制了检测框的图像写入该目录
    #[arg(long, value_name = "DIR")]
    annotate: Option<PathBuf>,

    /// 单张图像的检测超时（毫秒）
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// 以 JSON 输出检测结果
    #[arg(long)]
    json: bool,
}

impl Args {
    fn scan_config(&self) -> Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::from_json_file(path)
                .with_context(|| format!("无法加载配置文件: {}", path.display()))?,
            None => ScanConfig::default(),
        };

        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(classes) = &self.classes {
            config.class_names_path = Some(classes.clone());
        }
        if let Some(catalog) = &self.catalog {
            config.catalog_path = Some(catalog.clone());
        }
        if let Some(confidence) = self.confidence {
            config.confidence_threshold = confidence;
        }
        if let Some(iou) = self.iou {
            config.iou_threshold = iou;
        }
        Ok(config)
    }
}

fn print_report(path: &Path, report: &ScanReport) {
    println!("{}: 检测到 {} 块积木 ({:.1} ms)", path.display(), report.total_bricks(), report.elapsed_ms);
    for item in report.inventory() {
        let [x, y, w, h] = item.bbox;
        println!(
            "  - {} [{}] {} x{} @ {:.2}% ({}, {}, {}x{})",
            item.name,
            item.part_id,
            item.color,
            item.quantity,
            item.confidence * 100.0,
            x,
            y,
            w,
            h
        );
    }
}

fn write_annotation(dir: &Path, path: &Path, report: &ScanReport) -> Result<()> {
    let image = load_image(path)?;
    let annotated = draw_detections(&image, &report.detections)?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("scan");
    let output = dir.join(format!("{}_annotated.png", stem));
    annotated
        .save(&output)
        .with_context(|| format!("无法保存标注图像: {}", output.display()))?;
    info!("标注图像已保存到: {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = args.scan_config()?;

    info!("模型文件路径: {}", config.model_path.display());
    info!("置信度阈值: {}", config.confidence_threshold);
    info!("NMS 阈值: {}", config.iou_threshold);

    let scanner = BrickScanner::new(config).context("检测器初始化失败")?;
    if let Some(reason) = scanner.unavailable_reason() {
        warn!("检测器不可用: {}", reason);
    }

    let mut service = ScanService::new(scanner);
    if let Some(ms) = args.timeout_ms {
        service = service.with_deadline(Duration::from_millis(ms));
    }

    if let Some(dir) = &args.annotate {
        std::fs::create_dir_all(dir).with_context(|| format!("无法创建目录: {}", dir.display()))?;
    }

    let mut tasks = JoinSet::new();
    for (index, path) in args.images.iter().cloned().enumerate() {
        let service = service.clone();
        tasks.spawn(async move {
            let result = service.scan(path.clone()).await;
            (index, path, result)
        });
    }

    let mut results = Vec::with_capacity(args.images.len());
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("检测任务异常退出")?);
    }
    results.sort_by_key(|(index, _, _)| *index);

    let mut failures = 0usize;
    let mut reports = Vec::new();
    for (_, path, result) in results {
        match result {
            Ok(report) => {
                if !args.json {
                    print_report(&path, &report);
                }
                if let Some(dir) = &args.annotate {
                    if report.available {
                        write_annotation(dir, &path, &report)?;
                    }
                }
                reports.push(serde_json::json!({
                    "image": path.display().to_string(),
                    "available": report.available,
                    "bricks": report.inventory(),
                    "detections": report.detections,
                    "elapsed_ms": report.elapsed_ms,
                }));
            }
            Err(e) => {
                failures += 1;
                error!("{}: {} ({})", path.display(), e, e.kind());
                reports.push(serde_json::json!({
                    "image": path.display().to_string(),
                    "error": { "kind": e.kind(), "message": e.to_string() },
                }));
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if !service.is_available() {
        warn!("模型不可用，所有结果均为空");
    }
    if failures > 0 {
        anyhow::bail!("{} 张图像检测失败", failures);
    }
    Ok(())
}
