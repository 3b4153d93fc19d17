//! 图像预处理模块
//!
//! 负责加载图像，并以信箱方式（保持宽高比、四周灰色填充）缩放到模型输入尺寸，
//! 再转换为 NCHW 格式、像素值归一化到 [0, 1] 的输入张量。

use std::path::Path;

use image::{Rgb, RgbImage, imageops::{self, FilterType}};
use ndarray::{Array, Array4};
use tracing::debug;

use crate::error::ScanError;

/// 信箱变换参数
///
/// 记录前向变换使用的缩放比例和填充偏移，后处理时据此把边界框映射回原图。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// 缩放比例 `min(S/H, S/W)`
    pub scale: f32,
    /// 水平方向填充像素数
    pub pad_w: u32,
    /// 垂直方向填充像素数
    pub pad_h: u32,
    /// 原始图像宽度
    pub orig_width: u32,
    /// 原始图像高度
    pub orig_height: u32,
    /// 模型输入边长
    pub size: u32,
}

impl Letterbox {
    /// 根据原图尺寸和模型输入边长计算变换参数
    ///
    /// # 错误处理
    /// 宽或高为 0 时返回 [`ScanError::InvalidImage`]；输入边长为 0 时返回 [`ScanError::Config`]
    pub fn compute(orig_width: u32, orig_height: u32, size: u32) -> Result<Self, ScanError> {
        if size == 0 {
            return Err(ScanError::Config("模型输入边长必须大于 0".to_string()));
        }
        if orig_width == 0 || orig_height == 0 {
            return Err(ScanError::InvalidImage(format!(
                "图像尺寸为零: {}x{}",
                orig_width, orig_height
            )));
        }

        let scale = (size as f32 / orig_height as f32).min(size as f32 / orig_width as f32);
        let (new_width, new_height) = Self::scaled_dims(orig_width, orig_height, scale, size);

        Ok(Self {
            scale,
            pad_w: (size - new_width) / 2,
            pad_h: (size - new_height) / 2,
            orig_width,
            orig_height,
            size,
        })
    }

    /// 缩放后的图像尺寸 `(round(W*scale), round(H*scale))`，限制在 [1, S]
    pub fn new_dims(&self) -> (u32, u32) {
        Self::scaled_dims(self.orig_width, self.orig_height, self.scale, self.size)
    }

    fn scaled_dims(width: u32, height: u32, scale: f32, size: u32) -> (u32, u32) {
        let w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let h = ((height as f32 * scale).round() as u32).clamp(1, size);
        (w, h)
    }
}

/// 加载图像文件并转换为 RGB 三通道
///
/// # 错误处理
/// 文件不存在或无法解码时返回 [`ScanError::InvalidImage`]
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage, ScanError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScanError::InvalidImage(format!("图像文件不存在: {}", path.display())));
    }

    let img = image::open(path)
        .map_err(|e| ScanError::InvalidImage(format!("无法加载图像 {}: {}", path.display(), e)))?;
    Ok(img.to_rgb8())
}

/// 信箱缩放：保持宽高比缩放后居中贴到 `size x size` 的灰色画布上
pub fn letterbox_image(img: &RgbImage, size: u32, pad_value: u8) -> Result<(RgbImage, Letterbox), ScanError> {
    let letterbox = Letterbox::compute(img.width(), img.height(), size)?;
    let (new_width, new_height) = letterbox.new_dims();

    let resized = imageops::resize(img, new_width, new_height, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([pad_value; 3]));
    imageops::overlay(&mut canvas, &resized, letterbox.pad_w as i64, letterbox.pad_h as i64);

    debug!(
        "信箱缩放: {}x{} -> {}x{}, scale={:.4}, pad=({}, {})",
        img.width(),
        img.height(),
        new_width,
        new_height,
        letterbox.scale,
        letterbox.pad_w,
        letterbox.pad_h
    );

    Ok((canvas, letterbox))
}

/// 将图像转换为模型输入张量
///
/// 返回形状为(1, 3, height, width)的四维张量，通道顺序为RGB，像素值范围[0, 1]
pub fn image_to_tensor(img: &RgbImage) -> Array4<f32> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let mut tensor = Array::zeros((1, 3, height, width));

    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;

        tensor[[0, 0, y, x]] = (r as f32) / 255.0;
        tensor[[0, 1, y, x]] = (g as f32) / 255.0;
        tensor[[0, 2, y, x]] = (b as f32) / 255.0;
    }

    tensor
}

/// 完整预处理：信箱缩放 + 张量化
pub fn preprocess(img: &RgbImage, size: u32, pad_value: u8) -> Result<(Array4<f32>, Letterbox), ScanError> {
    let (canvas, letterbox) = letterbox_image(img, size, pad_value)?;
    Ok((image_to_tensor(&canvas), letterbox))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_image_is_padded_vertically() {
        let lb = Letterbox::compute(1280, 720, 640).unwrap();
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!(lb.new_dims(), (640, 360));
        assert_eq!(lb.pad_w, 0);
        assert_eq!(lb.pad_h, 140);
    }

    #[test]
    fn small_portrait_image_is_upscaled() {
        let lb = Letterbox::compute(100, 200, 640).unwrap();
        assert!((lb.scale - 3.2).abs() < 1e-6);
        assert_eq!(lb.new_dims(), (320, 640));
        assert_eq!(lb.pad_w, 160);
        assert_eq!(lb.pad_h, 0);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        assert!(matches!(Letterbox::compute(0, 10, 640), Err(ScanError::InvalidImage(_))));
        assert!(matches!(Letterbox::compute(10, 0, 640), Err(ScanError::InvalidImage(_))));
    }

    #[test]
    fn zero_input_size_is_config_error() {
        assert!(matches!(Letterbox::compute(100, 100, 0), Err(ScanError::Config(_))));
        assert!(matches!(preprocess(&RgbImage::new(4, 4), 0, 114), Err(ScanError::Config(_))));
    }

    #[test]
    fn tensor_is_nchw_normalized_with_gray_padding() {
        let img = RgbImage::from_pixel(64, 32, Rgb([255, 0, 0]));
        let (tensor, lb) = preprocess(&img, 64, 114).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert_eq!(lb.pad_h, 16);

        // 填充区域为 114/255 灰色
        let gray = 114.0 / 255.0;
        for c in 0..3 {
            assert!((tensor[[0, c, 0, 0]] - gray).abs() < 1e-6);
        }
        // 图像中心为纯红色
        assert!((tensor[[0, 0, 32, 32]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 32, 32]].abs() < 1e-6);
        assert!(tensor[[0, 2, 32, 32]].abs() < 1e-6);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn missing_file_is_invalid_image() {
        assert!(matches!(load_image("/nonexistent/brick.jpg"), Err(ScanError::InvalidImage(_))));
    }
}
