//! 后处理模块
//!
//! 负责把模型原始输出解码为候选框，进行非极大值抑制(NMS)，
//! 并把保留下来的边界框从模型输入空间映射回原始图像坐标。

use ndarray::{Array2, Axis, s};
use tracing::debug;

use crate::scan::bounds::{BoundingBox, Candidate, CenterBox};
use crate::scan::prevs::Letterbox;

/// 解码模型输出
///
/// 每一行的前 4 个值为中心点形式的边界框，其余为各类别分数；
/// 置信度取类别分数最大值，类别ID取其下标。置信度不高于阈值的行被丢弃。
///
/// # 参数
/// * `rows` - 形状为 `[N, 4+C]` 的模型输出
/// * `confidence_threshold` - 置信度阈值
///
/// # 返回值
/// 返回角点形式的候选框列表，保持原始行顺序；没有候选时返回空列表
pub fn decode(rows: &Array2<f32>, confidence_threshold: f32) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for row in rows.axis_iter(Axis(0)) {
        let scores = row.slice(s![4..]);
        let Some((class_id, &confidence)) = scores
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, &f32)>, (i, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((i, score)),
            })
        else {
            continue;
        };

        if confidence.is_nan() || confidence <= confidence_threshold {
            continue;
        }

        let bbox = CenterBox::new(row[0], row[1], row[2], row[3]).to_corners();
        candidates.push(Candidate { bbox, confidence, class_id });
    }

    debug!("解码得到 {} 个候选框 (共 {} 行)", candidates.len(), rows.nrows());
    candidates
}

/// 应用非极大值抑制
///
/// 按置信度降序（稳定排序，同分按原始顺序）依次选取候选框，
/// 丢弃与已选框 IoU 超过阈值的其余候选。抑制与类别无关。
///
/// # 参数
/// * `candidates` - 候选框列表
/// * `nms_threshold` - NMS阈值
///
/// # 返回值
/// 返回保留下来的候选框，按置信度降序排列
pub fn apply_nms(mut candidates: Vec<Candidate>, nms_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut result: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }

        let picked = candidates[i];
        result.push(picked);

        for j in (i + 1)..candidates.len() {
            if suppressed[j] {
                continue;
            }
            if picked.bbox.iou(&candidates[j].bbox) > nms_threshold {
                suppressed[j] = true;
            }
        }
    }

    debug!("NMS: {} -> {} 个候选框", candidates.len(), result.len());
    result
}

/// 把模型输入空间中的边界框映射回原始图像坐标
///
/// 先减去填充偏移，再除以缩放比例，最后裁剪到图像范围内。越界的框被裁剪而不是丢弃。
pub fn rescale_box(bbox: &BoundingBox, letterbox: &Letterbox) -> BoundingBox {
    let (pad_w, pad_h) = (letterbox.pad_w as f32, letterbox.pad_h as f32);
    let (max_x, max_y) = (letterbox.orig_width as f32, letterbox.orig_height as f32);

    BoundingBox {
        x1: ((bbox.x1 - pad_w) / letterbox.scale).clamp(0.0, max_x),
        y1: ((bbox.y1 - pad_h) / letterbox.scale).clamp(0.0, max_y),
        x2: ((bbox.x2 - pad_w) / letterbox.scale).clamp(0.0, max_x),
        y2: ((bbox.y2 - pad_h) / letterbox.scale).clamp(0.0, max_y),
    }
}

/// 对一组候选框执行坐标还原
pub fn rescale(candidates: &[Candidate], letterbox: &Letterbox) -> Vec<Candidate> {
    candidates
        .iter()
        .map(|c| Candidate { bbox: rescale_box(&c.bbox, letterbox), ..*c })
        .collect()
}
