//! 颜色分类模块
//!
//! 对边界框覆盖的像素区域求 HSV 均值，按固定阈值归入一个粗粒度颜色标签。

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::{
    COLOR_BRIGHT_VALUE, COLOR_DARK_VALUE, COLOR_LOW_SATURATION, COLOR_MIN_REGION, HUE_BLUE,
    HUE_GREEN, HUE_ORANGE, HUE_RED_HIGH, HUE_RED_LOW, HUE_YELLOW,
};
use crate::scan::bounds::BoundingBox;

/// 积木颜色标签（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrickColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Black,
    White,
    Gray,
    Unknown,
}

impl BrickColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrickColor::Red => "Red",
            BrickColor::Orange => "Orange",
            BrickColor::Yellow => "Yellow",
            BrickColor::Green => "Green",
            BrickColor::Blue => "Blue",
            BrickColor::Purple => "Purple",
            BrickColor::Black => "Black",
            BrickColor::White => "White",
            BrickColor::Gray => "Gray",
            BrickColor::Unknown => "Unknown",
        }
    }

    /// 绘制检测框时使用的 RGB 颜色
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            BrickColor::Red => [0xE5, 0x1F, 0x1F],
            BrickColor::Orange => [0xFF, 0x8C, 0x00],
            BrickColor::Yellow => [0xFF, 0xD7, 0x00],
            BrickColor::Green => [0x22, 0xB1, 0x4C],
            BrickColor::Blue => [0x1E, 0x5A, 0xFF],
            BrickColor::Purple => [0x8E, 0x44, 0xAD],
            BrickColor::Black => [0x10, 0x10, 0x10],
            BrickColor::White => [0xF5, 0xF5, 0xF5],
            BrickColor::Gray => [0x80, 0x80, 0x80],
            BrickColor::Unknown => [0x00, 0xFF, 0xFF],
        }
    }
}

impl fmt::Display for BrickColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 区域的 HSV 均值
///
/// 色相为角度 [0, 360)，饱和度与明度为 0-255 刻度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvMean {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

/// 单个像素 RGB -> HSV
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let value = max;
    let saturation = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    (hue, saturation, value)
}

/// 按均值统计量分类，是纯函数
pub fn classify_hsv(mean: &HsvMean) -> BrickColor {
    if mean.saturation < COLOR_LOW_SATURATION {
        return if mean.value < COLOR_DARK_VALUE {
            BrickColor::Black
        } else if mean.value > COLOR_BRIGHT_VALUE {
            BrickColor::White
        } else {
            BrickColor::Gray
        };
    }

    let hue = mean.hue;
    if hue < HUE_RED_LOW || hue > HUE_RED_HIGH {
        BrickColor::Red
    } else if hue < HUE_ORANGE {
        BrickColor::Orange
    } else if hue < HUE_YELLOW {
        BrickColor::Yellow
    } else if hue < HUE_GREEN {
        BrickColor::Green
    } else if hue < HUE_BLUE {
        BrickColor::Blue
    } else if hue < HUE_RED_HIGH {
        BrickColor::Purple
    } else {
        BrickColor::Unknown
    }
}

/// 计算图像中一块矩形区域的 HSV 均值
///
/// 区域坐标按截断取整并裁剪到图像范围内；任一边小于最小尺寸时返回 `None`。
pub fn region_mean(img: &RgbImage, bbox: &BoundingBox) -> Option<HsvMean> {
    let x1 = (bbox.x1.max(0.0) as u32).min(img.width());
    let y1 = (bbox.y1.max(0.0) as u32).min(img.height());
    let x2 = (bbox.x2.max(0.0) as u32).min(img.width());
    let y2 = (bbox.y2.max(0.0) as u32).min(img.height());

    let (w, h) = (x2.saturating_sub(x1), y2.saturating_sub(y1));
    if w < COLOR_MIN_REGION || h < COLOR_MIN_REGION {
        return None;
    }

    let (mut hue, mut saturation, mut value) = (0.0f64, 0.0f64, 0.0f64);
    for y in y1..y2 {
        for x in x1..x2 {
            let (ph, ps, pv) = rgb_to_hsv(img.get_pixel(x, y).0);
            hue += ph as f64;
            saturation += ps as f64;
            value += pv as f64;
        }
    }

    let count = (w as f64) * (h as f64);
    Some(HsvMean {
        hue: (hue / count) as f32,
        saturation: (saturation / count) as f32,
        value: (value / count) as f32,
    })
}

/// 识别边界框内区域的颜色，区域过小或为空时返回 [`BrickColor::Unknown`]
pub fn classify_region(img: &RgbImage, bbox: &BoundingBox) -> BrickColor {
    region_mean(img, bbox)
        .map(|mean| classify_hsv(&mean))
        .unwrap_or(BrickColor::Unknown)
}
