//! 聚合与零件目录
//!
//! 把逐框检测结果按 (类别名称, 颜色) 分组计数，并把类别名称解析为标准零件编号。

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::UNKNOWN_PART_ID;
use crate::error::ScanError;
use crate::scan::bounds::{BoundingBox, Detection};
use crate::scan::hue::BrickColor;

/// 内置零件目录，顺序即解析时的匹配顺序
const BUILTIN_CATALOG: &[(&str, &str)] = &[
    ("2x4 Brick", "3001"),
    ("2x3 Brick", "3002"),
    ("2x2 Brick", "3003"),
    ("1x2 Brick", "3004"),
    ("1x1 Brick", "3005"),
    ("1x4 Brick", "3010"),
    ("1x6 Brick", "3009"),
    ("1x8 Brick", "3008"),
    ("2x6 Brick", "2456"),
    ("1x2 Plate", "3023"),
    ("1x1 Plate", "3024"),
    ("2x2 Plate", "3022"),
    ("2x4 Plate", "3020"),
    ("1x4 Plate", "3710"),
    ("2x3 Plate", "3021"),
];

/// 聚合后的积木记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBrick {
    /// 标准零件编号
    pub part_id: String,
    /// 类别名称
    pub name: String,
    /// 颜色标签
    pub color: BrickColor,
    /// 同组检测数量，至少为 1
    pub quantity: u32,
    /// 组内最大置信度
    pub confidence: f32,
    /// 组内第一个检测的边界框
    pub bbox: BoundingBox,
}

/// 对外输出的清单记录，边界框为整数 `[x, y, w, h]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub part_id: String,
    pub name: String,
    pub color: BrickColor,
    pub quantity: u32,
    pub confidence: f32,
    pub bbox: [i32; 4],
}

impl From<&AggregatedBrick> for InventoryItem {
    fn from(brick: &AggregatedBrick) -> Self {
        Self {
            part_id: brick.part_id.clone(),
            name: brick.name.clone(),
            color: brick.color,
            quantity: brick.quantity,
            confidence: brick.confidence,
            bbox: brick.bbox.to_xywh(),
        }
    }
}

/// 零件目录：类别名称 -> 零件编号
///
/// 条目保持插入顺序，名称解析的结果只取决于该顺序。
#[derive(Debug, Clone, PartialEq)]
pub struct PartCatalog {
    entries: Vec<(String, String)>,
}

impl Default for PartCatalog {
    fn default() -> Self {
        Self::new(BUILTIN_CATALOG.iter().map(|(name, id)| (name.to_string(), id.to_string())))
    }
}

impl PartCatalog {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }

    /// 从文本文件加载目录，每行 `名称,零件编号`，`#` 开头的行与空行被忽略
    ///
    /// # 错误处理
    /// 文件无法读取或某行缺少逗号时返回 [`ScanError::Config`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("无法读取零件目录 {}: {}", path.display(), e)))?;

        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, id) = line.rsplit_once(',').ok_or_else(|| {
                ScanError::Config(format!("零件目录 {} 第 {} 行格式错误: {}", path.display(), lineno + 1, line))
            })?;
            entries.push((name.trim().to_string(), id.trim().to_string()));
        }

        debug!("从 {} 加载 {} 个零件条目", path.display(), entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 解析类别名称对应的零件编号
    ///
    /// 依次尝试：精确匹配、忽略大小写的精确匹配、忽略大小写的双向子串匹配，
    /// 每一步都按目录顺序取第一个命中；全部失败时返回 `"unknown"`。
    pub fn resolve(&self, name: &str) -> &str {
        if let Some((_, id)) = self.entries.iter().find(|(entry, _)| entry == name) {
            return id;
        }

        let lower = name.to_lowercase();
        if let Some((_, id)) = self.entries.iter().find(|(entry, _)| entry.to_lowercase() == lower) {
            return id;
        }

        if !lower.is_empty() {
            let found = self.entries.iter().find(|(entry, _)| {
                let entry = entry.to_lowercase();
                !entry.is_empty() && (entry.contains(&lower) || lower.contains(&entry))
            });
            if let Some((_, id)) = found {
                return id;
            }
        }

        warn!("类别 {:?} 不在零件目录中", name);
        UNKNOWN_PART_ID
    }
}

/// 按 (类别名称, 颜色) 聚合检测结果
///
/// 输出顺序为每个分组首次出现的顺序；数量为组内检测数，置信度取组内最大值，
/// 边界框取组内第一个检测的边界框。没有检测时返回空列表。
pub fn aggregate(detections: &[Detection], catalog: &PartCatalog) -> Vec<AggregatedBrick> {
    let mut bricks: Vec<AggregatedBrick> = Vec::new();
    let mut index: HashMap<(&str, BrickColor), usize> = HashMap::new();

    for det in detections {
        let key = (det.class_name.as_str(), det.color);
        match index.get(&key).copied() {
            Some(i) => {
                let brick = &mut bricks[i];
                brick.quantity += 1;
                brick.confidence = brick.confidence.max(det.confidence);
            }
            None => {
                index.insert(key, bricks.len());
                bricks.push(AggregatedBrick {
                    part_id: catalog.resolve(&det.class_name).to_string(),
                    name: det.class_name.clone(),
                    color: det.color,
                    quantity: 1,
                    confidence: det.confidence,
                    bbox: det.bbox,
                });
            }
        }
    }

    bricks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn det(name: &str, color: BrickColor, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0, name, confidence, color)
    }

    #[test]
    fn resolve_exact_and_case_insensitive_agree() {
        let catalog = PartCatalog::default();
        assert_eq!(catalog.resolve("2x4 Brick"), "3001");
        assert_eq!(catalog.resolve("2x4 brick"), "3001");
        assert_eq!(catalog.resolve("2X4 BRICK"), "3001");
    }

    #[test]
    fn resolve_substring_in_both_directions() {
        let catalog = PartCatalog::default();
        // 检测名包含目录名
        assert_eq!(catalog.resolve("red 2x2 brick piece"), "3003");
        // 目录名包含检测名，取目录顺序中的第一个
        assert_eq!(catalog.resolve("1x2"), "3004");
        assert_eq!(catalog.resolve("plate"), "3023");
    }

    #[test]
    fn inventory_item_reports_truncated_xywh() {
        let mut brick = det("2x4 Brick", BrickColor::Red, 0.9);
        brick.bbox = BoundingBox::new(10.7, 20.2, 110.9, 70.5);
        let bricks = aggregate(&[brick], &PartCatalog::default());

        let item = InventoryItem::from(&bricks[0]);
        assert_eq!(item.part_id, "3001");
        assert_eq!(item.bbox, [10, 20, 100, 50]);
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn resolve_falls_back_to_sentinel() {
        let catalog = PartCatalog::default();
        assert_eq!(catalog.resolve("minifigure"), UNKNOWN_PART_ID);
        assert_eq!(catalog.resolve(""), UNKNOWN_PART_ID);
    }

    #[test]
    fn exact_match_wins_over_earlier_substring() {
        let catalog = PartCatalog::new(vec![
            ("Brick".to_string(), "generic".to_string()),
            ("brick".to_string(), "lower".to_string()),
        ]);
        assert_eq!(catalog.resolve("brick"), "lower");
        assert_eq!(catalog.resolve("BRICK"), "generic");
    }

    #[test]
    fn aggregates_by_name_and_color() {
        let catalog = PartCatalog::default();
        let detections = vec![
            det("2x4 Brick", BrickColor::Red, 0.95),
            det("2x4 Brick", BrickColor::Red, 0.80),
            det("2x2 Brick", BrickColor::Blue, 0.92),
        ];
        let bricks = aggregate(&detections, &catalog);

        assert_eq!(bricks.len(), 2);
        assert_eq!(bricks[0].part_id, "3001");
        assert_eq!(bricks[0].color, BrickColor::Red);
        assert_eq!(bricks[0].quantity, 2);
        assert!((bricks[0].confidence - 0.95).abs() < 1e-6);
        assert_eq!(bricks[1].part_id, "3003");
        assert_eq!(bricks[1].color, BrickColor::Blue);
        assert_eq!(bricks[1].quantity, 1);
        assert!((bricks[1].confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn same_name_different_color_are_separate_groups() {
        let catalog = PartCatalog::default();
        let detections = vec![
            det("1x2 Plate", BrickColor::Yellow, 0.5),
            det("1x2 Plate", BrickColor::Green, 0.6),
            det("1x2 Plate", BrickColor::Yellow, 0.7),
        ];
        let bricks = aggregate(&detections, &catalog);
        assert_eq!(bricks.len(), 2);
        assert_eq!((bricks[0].color, bricks[0].quantity), (BrickColor::Yellow, 2));
        assert!((bricks[0].confidence - 0.7).abs() < 1e-6);
        assert_eq!((bricks[1].color, bricks[1].quantity), (BrickColor::Green, 1));
    }

    #[test]
    fn quantity_matches_raw_counts() {
        let catalog = PartCatalog::default();
        let names = ["2x4 Brick", "1x1 Plate", "2x4 Brick", "mystery", "1x1 Plate", "2x4 Brick"];
        let colors = [BrickColor::Red, BrickColor::Red, BrickColor::Blue, BrickColor::Gray];
        let detections: Vec<_> = names
            .iter()
            .zip(colors.iter().cycle())
            .map(|(n, c)| det(n, *c, 0.5))
            .collect();

        let bricks = aggregate(&detections, &catalog);
        for brick in &bricks {
            let expected = detections
                .iter()
                .filter(|d| d.class_name == brick.name && d.color == brick.color)
                .count();
            assert_eq!(brick.quantity as usize, expected);
        }
        let total: u32 = bricks.iter().map(|b| b.quantity).sum();
        assert_eq!(total as usize, detections.len());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate(&[], &PartCatalog::default()).is_empty());
    }

    #[test]
    fn catalog_file_preserves_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# name,part").unwrap();
        writeln!(file, "1x2 Plate, 3023").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1x2 Brick,3004").unwrap();

        let catalog = PartCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.resolve("1x2"), "3023");
    }

    #[test]
    fn catalog_line_without_comma_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2x4 Brick 3001").unwrap();
        assert!(matches!(PartCatalog::from_file(file.path()), Err(ScanError::Config(_))));
    }
}
