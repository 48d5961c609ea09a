//! Cleaning raw detections into text lines

use super::{BoundingBox, TextLine, TextRegion};

/// Thresholds applied to raw detections
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFilter {
    /// Detections below this confidence are dropped
    pub min_confidence: f32,
    /// Detections overlapping a more confident one above this IoU are dropped
    pub iou_threshold: f32,
    /// Minimum vertical overlap, as a fraction of the shorter box, to share a line
    pub line_merge_tolerance: f32,
}

impl Default for RegionFilter {
    fn default() -> Self {
        Self { min_confidence: 0.5, iou_threshold: 0.5, line_merge_tolerance: 0.5 }
    }
}

impl RegionFilter {
    /// Filter, de-duplicate and group into lines, top to bottom
    pub fn apply(&self, regions: Vec<TextRegion>) -> Vec<TextLine> {
        let confident = filter_confident(regions, self.min_confidence);
        let unique = remove_duplicates(confident, self.iou_threshold);
        group_lines(unique, self.line_merge_tolerance)
    }
}

/// Drop low-confidence, blank and empty-box detections
pub fn filter_confident(regions: Vec<TextRegion>, min_confidence: f32) -> Vec<TextRegion> {
    regions
        .into_iter()
        .filter(|r| r.confidence >= min_confidence && !r.text.trim().is_empty() && r.bbox.area() > 0)
        .collect()
}

/// Keep the most confident of every group of overlapping detections
pub fn remove_duplicates(mut regions: Vec<TextRegion>, iou_threshold: f32) -> Vec<TextRegion> {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<TextRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        if kept.iter().all(|k| k.bbox.iou(&region.bbox) <= iou_threshold) {
            kept.push(region);
        }
    }
    kept
}

fn vertical_overlap(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let top = a.y.max(b.y);
    let bottom = a.bottom().min(b.bottom());
    if bottom <= top {
        return 0.0;
    }
    let shorter = a.height.min(b.height).max(1);
    (bottom - top) as f32 / shorter as f32
}

/// Merge detections sharing a baseline band into lines
///
/// Words of one line are joined left to right with single spaces. A line's
/// confidence is the weakest of its words.
pub fn group_lines(mut regions: Vec<TextRegion>, tolerance: f32) -> Vec<TextLine> {
    regions.sort_by_key(|r| (r.bbox.center_y2(), r.bbox.x));

    let mut groups: Vec<(BoundingBox, Vec<TextRegion>)> = Vec::new();
    for region in regions {
        match groups.last_mut() {
            Some((bbox, words)) if vertical_overlap(&*bbox, &region.bbox) >= tolerance => {
                *bbox = bbox.union(&region.bbox);
                words.push(region);
            }
            _ => groups.push((region.bbox, vec![region])),
        }
    }

    groups
        .into_iter()
        .map(|(bbox, mut words)| {
            words.sort_by_key(|w| w.bbox.x);
            TextLine {
                text: words.iter().map(|w| w.text.trim()).collect::<Vec<_>>().join(" "),
                confidence: words.iter().map(|w| w.confidence).fold(1.0, f32::min),
                bbox,
            }
        })
        .collect()
}
