use serde::{Deserialize, Serialize};

use crate::scan::hue::BrickColor;

/// 边界框结构（角点形式）
///
/// 表示一个矩形边界框，用于包围检测到的积木。
#[derive(Debug, Clone, Default, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// 左上角x坐标
    pub x1: f32,
    /// 左上角y坐标
    pub y1: f32,
    /// 右下角x坐标
    pub x2: f32,
    /// 右下角y坐标
    pub y2: f32,
}

/// 中心点形式的边界框，模型原始输出即为此形式
#[derive(Debug, Clone, Default, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    /// 创建一个新的边界框
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 计算边界框的宽度
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    /// 计算边界框的高度
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// 计算边界框的面积
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// 检查边界框是否有效（宽度和高度都大于0）
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// 转换为中心点形式
    pub fn to_center(&self) -> CenterBox {
        CenterBox {
            cx: (self.x1 + self.x2) / 2.0,
            cy: (self.y1 + self.y2) / 2.0,
            w: self.x2 - self.x1,
            h: self.y2 - self.y1,
        }
    }

    /// 计算与另一个边界框的交集面积
    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let x_left = self.x1.max(other.x1);
        let y_top = self.y1.max(other.y1);
        let x_right = self.x2.min(other.x2);
        let y_bottom = self.y2.min(other.y2);

        if x_right <= x_left || y_bottom <= y_top {
            0.0
        } else {
            (x_right - x_left) * (y_bottom - y_top)
        }
    }

    /// 计算交并比 (IoU)，并集为零时返回 0
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }

    /// 取整为 `[x, y, w, h]`，截断方式与像素裁剪保持一致
    pub fn to_xywh(&self) -> [i32; 4] {
        let (x1, y1, x2, y2) = (self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32);
        [x1, y1, x2 - x1, y2 - y1]
    }
}

impl CenterBox {
    pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    /// 转换为角点形式
    pub fn to_corners(&self) -> BoundingBox {
        BoundingBox {
            x1: self.cx - self.w / 2.0,
            y1: self.cy - self.h / 2.0,
            x2: self.cx + self.w / 2.0,
            y2: self.cy + self.h / 2.0,
        }
    }
}

impl From<CenterBox> for BoundingBox {
    fn from(b: CenterBox) -> Self {
        b.to_corners()
    }
}

impl From<BoundingBox> for CenterBox {
    fn from(b: BoundingBox) -> Self {
        b.to_center()
    }
}

/// 解码后的候选框，坐标位于模型输入空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

/// 检测结果结构
///
/// 包含检测到的积木的完整信息，边界框位于原始图像像素坐标。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 积木的边界框
    pub bbox: BoundingBox,
    /// 类别ID
    pub class_id: usize,
    /// 类别名称
    pub class_name: String,
    /// 置信度
    pub confidence: f32,
    /// 颜色标签
    pub color: BrickColor,
}

impl Detection {
    /// 创建一个新的检测结果
    pub fn new(bbox: BoundingBox, class_id: usize, class_name: impl Into<String>, confidence: f32, color: BrickColor) -> Self {
        Self { bbox, class_id, class_name: class_name.into(), confidence, color }
    }
}
