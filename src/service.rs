//! 异步服务封装
//!
//! 检测流水线本身是同步的。外部服务在 tokio 运行时中通过 [`ScanService`]
//! 把检测放到阻塞线程池执行，并可设置截止时间。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::ScanError;
use crate::scan::{BrickScanner, ScanReport};

/// 在多个请求间共享同一个检测器的异步服务
#[derive(Clone)]
pub struct ScanService {
    scanner: Arc<BrickScanner>,
    deadline: Option<Duration>,
}

impl ScanService {
    pub fn new(scanner: BrickScanner) -> Self {
        Self::from_shared(Arc::new(scanner))
    }

    pub fn from_shared(scanner: Arc<BrickScanner>) -> Self {
        Self { scanner, deadline: None }
    }

    /// 设置单次检测的截止时间
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn scanner(&self) -> &BrickScanner {
        &self.scanner
    }

    /// 模型是否可用
    pub fn is_available(&self) -> bool {
        self.scanner.is_available()
    }

    /// 异步检测图像文件
    ///
    /// # 错误处理
    /// 超过截止时间返回 [`ScanError::Timeout`]；阻塞任务异常退出时返回 [`ScanError::Inference`]。
    /// 超时后阻塞线程上的检测仍会运行到结束，但结果被丢弃。
    pub async fn scan(&self, path: impl Into<PathBuf>) -> Result<ScanReport, ScanError> {
        let path = path.into();
        let scanner = Arc::clone(&self.scanner);
        let task = tokio::task::spawn_blocking(move || scanner.scan_path(&path));

        let joined = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("检测超过截止时间 {:?}", deadline);
                    return Err(ScanError::Timeout(deadline));
                }
            },
            None => task.await,
        };

        joined.map_err(|e| ScanError::Inference(format!("检测任务异常退出: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;

    #[tokio::test]
    async fn disabled_scanner_reports_unavailable() {
        let service = ScanService::new(BrickScanner::disabled(ScanConfig::default(), "no model"));
        assert!(!service.is_available());

        let report = service.scan("/nonexistent/lego.jpg").await.unwrap();
        assert!(!report.available);
        assert!(report.bricks.is_empty());
    }
}
