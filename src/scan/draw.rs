use image::{ImageBuffer, RgbImage, RgbaImage};
use raqote::{DrawOptions, DrawTarget, LineJoin, PathBuilder, SolidSource, Source, StrokeStyle};

use crate::error::ScanError;
use crate::scan::bounds::Detection;

/// 在图像上绘制检测结果
///
/// 每个检测框的描边颜色取自其颜色标签。
///
/// # 参数
/// * `image` - 原始图像
/// * `detections` - 检测结果列表（原图坐标）
///
/// # 返回值
/// 返回绘制了检测框的 RGBA 图像
pub fn draw_detections(image: &RgbImage, detections: &[Detection]) -> Result<RgbaImage, ScanError> {
    let (img_width, img_height) = image.dimensions();
    let mut dt = DrawTarget::new(img_width as i32, img_height as i32);

    // 将原始图像绘制到DrawTarget上（预乘 ARGB）
    let image_data: Vec<u32> = image
        .pixels()
        .map(|pixel| {
            let [r, g, b] = pixel.0;
            u32::from_le_bytes([b, g, r, 0xFF])
        })
        .collect();

    let img = raqote::Image {
        width: img_width as i32,
        height: img_height as i32,
        data: &image_data,
    };
    dt.draw_image_at(0.0, 0.0, &img, &DrawOptions::new());

    let stroke_width = (img_width.max(img_height) as f32 / 320.0).max(2.0);
    for detection in detections {
        let bbox = &detection.bbox;

        let mut pb = PathBuilder::new();
        pb.rect(bbox.x1, bbox.y1, bbox.width(), bbox.height());
        let path = pb.finish();

        let [r, g, b] = detection.color.rgb();
        dt.stroke(
            &path,
            &Source::Solid(SolidSource { r, g, b, a: 0xFF }),
            &StrokeStyle {
                join: LineJoin::Round,
                width: stroke_width,
                ..StrokeStyle::default()
            },
            &DrawOptions::default(),
        );
    }

    // 将DrawTarget转换回图像
    let pixels: Vec<u8> = dt
        .get_data()
        .iter()
        .flat_map(|&pixel| {
            let bytes = pixel.to_le_bytes();
            [bytes[2], bytes[1], bytes[0], bytes[3]] // BGRA to RGBA
        })
        .collect();

    ImageBuffer::from_raw(img_width, img_height, pixels)
        .ok_or_else(|| ScanError::InvalidImage("无法从绘制结果创建图像".to_string()))
}
