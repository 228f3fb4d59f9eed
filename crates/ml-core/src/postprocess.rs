//! Backend-independent helpers for turning raw YOLO predictions into
//! [`Detection`]s.

use crate::Detection;

/// Hard cap on detections kept per frame.
pub const MAX_DETECTIONS: usize = 512;

/// Intersection-over-union of two `[x1, y1, x2, y2]` boxes.
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Greedy per-class non-maximum suppression.
///
/// Output is ordered by descending score, ties broken by input order.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
            if kept.len() >= MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}

/// Decode one YOLOv8 prediction column (`cx, cy, w, h, class scores...`).
///
/// Returns `None` when the best class score is below `confidence`. Box
/// coordinates are scaled by `(scale_x, scale_y)` into source pixels.
pub fn decode_yolo_row(
    row: &[f32],
    confidence: f32,
    scale_x: f32,
    scale_y: f32,
) -> Option<Detection> {
    if row.len() < 5 {
        return None;
    }
    let (class_idx, score) = row[4..]
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    if score < confidence {
        return None;
    }

    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    let bbox = [
        (cx - w / 2.0) * scale_x,
        (cy - h / 2.0) * scale_y,
        (cx + w / 2.0) * scale_x,
        (cy + h / 2.0) * scale_y,
    ];
    Some(Detection::new(class_idx as i64, bbox, score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = [10.0, 10.0, 20.0, 20.0];
        assert!((iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        assert_eq!(iou(&[0.0, 0.0, 5.0, 5.0], &[10.0, 10.0, 20.0, 20.0]), 0.0);
    }

    #[test]
    fn nms_keeps_best_of_overlapping_same_class() {
        let dets = vec![
            Detection::new(2, [0.0, 0.0, 100.0, 100.0], 0.6),
            Detection::new(2, [2.0, 2.0, 102.0, 102.0], 0.9),
            Detection::new(1, [0.0, 0.0, 100.0, 100.0], 0.5),
        ];
        let kept = non_max_suppression(dets, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn decode_row_picks_best_class_and_scales() {
        // cx, cy, w, h, bicycle, bus, car
        let row = [50.0, 40.0, 20.0, 10.0, 0.1, 0.2, 0.8];
        let det = decode_yolo_row(&row, 0.25, 2.0, 1.0).expect("detection above threshold");
        assert_eq!(det.class_id, 2);
        assert_eq!(det.bbox, [80.0, 35.0, 120.0, 45.0]);
    }

    #[test]
    fn decode_row_filters_low_confidence() {
        let row = [50.0, 40.0, 20.0, 10.0, 0.1, 0.2];
        assert!(decode_yolo_row(&row, 0.25, 1.0, 1.0).is_none());
    }
}
