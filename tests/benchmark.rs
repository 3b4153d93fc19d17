use brickscan::{BrickScanner, ScanConfig, load_image};
use std::time::{Duration, Instant};

#[cfg(test)]
mod tests {
    use super::*;

    /// 需要设置 `BRICKSCAN_MODEL` 与 `BRICKSCAN_IMAGE`，否则跳过
    #[test]
    fn test_model_performance() -> Result<(), Box<dyn std::error::Error>> {
        let (Ok(model_path), Ok(image_path)) = (std::env::var("BRICKSCAN_MODEL"), std::env::var("BRICKSCAN_IMAGE")) else {
            println!("未设置 BRICKSCAN_MODEL / BRICKSCAN_IMAGE，跳过基准测试");
            return Ok(());
        };

        println!("Brickscan 模型速度基准测试");
        println!("==========================");

        let image = load_image(&image_path)?;
        println!("原始图像尺寸: {}x{}", image.width(), image.height());

        let config = ScanConfig::new(model_path)
            .with_confidence_threshold(0.5)
            .with_iou_threshold(0.7);
        let scanner = BrickScanner::new(config)?;
        assert!(scanner.is_available(), "模型不可用: {:?}", scanner.unavailable_reason());

        // 预热
        scanner.scan_image(&image)?;

        let iterations = 50;
        let mut total_duration = Duration::ZERO;
        let mut min_duration = Duration::MAX;
        let mut max_duration = Duration::ZERO;

        for i in 0..iterations {
            let start = Instant::now();
            scanner.scan_image(&image)?;
            let duration = start.elapsed();

            total_duration += duration;
            min_duration = min_duration.min(duration);
            max_duration = max_duration.max(duration);

            if (i + 1) % 10 == 0 {
                println!("已完成 {} 次检测", i + 1);
            }
        }

        let average_duration = total_duration / iterations;
        println!("\n性能统计 ({} 次检测):", iterations);
        println!("平均耗时: {:?} ({} ms)", average_duration, average_duration.as_millis());
        println!("最小耗时: {:?} ({} ms)", min_duration, min_duration.as_millis());
        println!("最大耗时: {:?} ({} ms)", max_duration, max_duration.as_millis());
        println!("估计 FPS: {:.2}", 1.0 / average_duration.as_secs_f64());

        let report = scanner.scan_image(&image)?;
        println!("\n检测结果: {} 块积木", report.total_bricks());
        for brick in &report.bricks {
            println!("  {} [{}] {} x{}", brick.name, brick.part_id, brick.color, brick.quantity);
        }

        Ok(())
    }
}
