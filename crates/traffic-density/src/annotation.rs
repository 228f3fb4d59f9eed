//! Vehicle filtering and box/label drawing.
//!
//! Annotation never touches the input frame; it draws onto a copy using a
//! built-in 5x7 bitmap font so no font files are needed at runtime.

use image::{Rgb, RgbImage};
use ml_core::Detection;

use crate::classes::VehicleClassSet;

pub(crate) const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const BOX_THICKNESS: i32 = 2;
const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = 6;
/// Vertical space between a label's bottom row and its box's top edge.
const LABEL_GAP: i32 = 3;

/// Result of annotating one frame.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub vehicle_count: usize,
    pub frame: RgbImage,
}

/// Count vehicle detections and draw them onto a copy of `frame`.
///
/// Detections whose class is not in `classes` are ignored entirely. Drawing
/// follows detection order, so overlapping boxes show the last one on top.
pub fn annotate(frame: &RgbImage, detections: &[Detection], classes: &VehicleClassSet) -> Annotation {
    let mut annotated = frame.clone();
    let mut vehicle_count = 0;

    for det in detections {
        let Some(name) = classes.name(det.class_id) else {
            continue;
        };
        vehicle_count += 1;

        let Some([left, top, right, bottom]) = clip_box(&det.bbox, annotated.width(), annotated.height())
        else {
            continue;
        };
        for inset in 0..BOX_THICKNESS {
            if left + inset <= right - inset && top + inset <= bottom - inset {
                draw_rectangle(
                    &mut annotated,
                    left + inset,
                    top + inset,
                    right - inset,
                    bottom - inset,
                    BOX_COLOR,
                );
            }
        }

        let text_width = text_width(name);
        let (label_x, label_y) = label_origin(
            left,
            top,
            text_width,
            annotated.width() as i32,
            annotated.height() as i32,
        );
        fill_rect(
            &mut annotated,
            label_x,
            label_y,
            label_x + text_width,
            label_y + GLYPH_HEIGHT,
            LABEL_BACKGROUND,
        );
        draw_label(&mut annotated, label_x, label_y, name, BOX_COLOR);
    }

    Annotation {
        vehicle_count,
        frame: annotated,
    }
}

/// Round and clip a box to the frame. `None` when nothing of it is visible.
fn clip_box(bbox: &[f32; 4], width: u32, height: u32) -> Option<[i32; 4]> {
    if width == 0 || height == 0 {
        return None;
    }
    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    let left = bbox[0].round() as i32;
    let top = bbox[1].round() as i32;
    let right = bbox[2].round() as i32;
    let bottom = bbox[3].round() as i32;
    if right < 0 || bottom < 0 || left > max_x || top > max_y || left > right || top > bottom {
        return None;
    }
    Some([
        left.clamp(0, max_x),
        top.clamp(0, max_y),
        right.clamp(0, max_x),
        bottom.clamp(0, max_y),
    ])
}

fn text_width(text: &str) -> i32 {
    let chars = text.chars().count() as i32;
    if chars == 0 {
        0
    } else {
        chars * GLYPH_ADVANCE - (GLYPH_ADVANCE - GLYPH_WIDTH)
    }
}

/// Top-left corner for a label above a box, kept inside the frame.
pub(crate) fn label_origin(
    left: i32,
    top: i32,
    text_width: i32,
    frame_width: i32,
    frame_height: i32,
) -> (i32, i32) {
    let x = left.min(frame_width - text_width).max(0);
    let y = (top - LABEL_GAP - GLYPH_HEIGHT)
        .max(0)
        .min(frame_height - GLYPH_HEIGHT)
        .max(0);
    (x, y)
}

fn draw_rectangle(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgb<u8>,
) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    if width == 0 || height == 0 {
        return;
    }
    let left = left.clamp(0, width - 1);
    let right = right.clamp(0, width - 1);
    let top = top.clamp(0, height - 1);
    let bottom = bottom.clamp(0, height - 1);

    for x in left..=right {
        *image.get_pixel_mut(x as u32, top as u32) = color;
        *image.get_pixel_mut(x as u32, bottom as u32) = color;
    }
    for y in top..=bottom {
        *image.get_pixel_mut(left as u32, y as u32) = color;
        *image.get_pixel_mut(right as u32, y as u32) = color;
    }
}

fn fill_rect(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgb<u8>,
) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    if width == 0 || height == 0 {
        return;
    }
    let left = left.clamp(0, width - 1);
    let right = right.clamp(0, width - 1);
    let top = top.clamp(0, height - 1);
    let bottom = bottom.clamp(0, height - 1);

    for y in top..=bottom {
        for x in left..=right {
            *image.get_pixel_mut(x as u32, y as u32) = color;
        }
    }
}

fn draw_label(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        let px = x + col;
                        if px >= 0 && px < width {
                            *image.get_pixel_mut(px as u32, py as u32) = color;
                        }
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
        'B' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
        'C' => Some([0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
        'D' => Some([0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100]),
        'E' => Some([0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
        'F' => Some([0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
        'G' => Some([0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
        'H' => Some([0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
        'I' => Some([0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        'J' => Some([0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
        'K' => Some([0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
        'L' => Some([0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
        'M' => Some([0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
        'N' => Some([0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001]),
        'O' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'P' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
        'Q' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
        'R' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
        'S' => Some([0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
        'T' => Some([0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        'U' => Some([0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'V' => Some([0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
        'W' => Some([0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010]),
        'X' => Some([0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
        'Y' => Some([0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
        'Z' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
        '0' => Some([0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some([0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some([0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => Some([0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110]),
        '4' => Some([0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some([0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some([0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some([0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some([0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        '_' => Some([0, 0, 0, 0, 0, 0, 0b11111]),
        ' ' => Some([0; 7]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::default_vehicle_classes;

    fn gray_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))
    }

    fn classes() -> VehicleClassSet {
        VehicleClassSet::new(default_vehicle_classes())
    }

    #[test]
    fn no_detections_leaves_frame_identical() {
        let frame = gray_frame(64, 48);
        let result = annotate(&frame, &[], &classes());
        assert_eq!(result.vehicle_count, 0);
        assert_eq!(result.frame, frame);
    }

    #[test]
    fn non_vehicle_detections_are_ignored() {
        let frame = gray_frame(64, 48);
        let dets = [
            Detection::new(7, [5.0, 20.0, 30.0, 40.0], 0.9),
            Detection::new(-1, [0.0, 0.0, 10.0, 10.0], 0.8),
        ];
        let result = annotate(&frame, &dets, &classes());
        assert_eq!(result.vehicle_count, 0);
        assert_eq!(result.frame, frame);
    }

    #[test]
    fn vehicles_are_counted_and_boxed_on_a_copy() {
        let frame = gray_frame(120, 80);
        let dets = [
            Detection::new(2, [20.0, 30.0, 60.0, 70.0], 0.9),
            Detection::new(1, [70.0, 30.0, 110.0, 70.0], 0.7),
            Detection::new(9, [0.0, 0.0, 5.0, 5.0], 0.99),
        ];
        let result = annotate(&frame, &dets, &classes());
        assert_eq!(result.vehicle_count, 2);
        assert_eq!(*result.frame.get_pixel(20, 50), BOX_COLOR);
        assert_eq!(*result.frame.get_pixel(21, 50), BOX_COLOR);
        assert_eq!(*result.frame.get_pixel(40, 50), Rgb([90, 90, 90]));
        assert_eq!(*frame.get_pixel(20, 50), Rgb([90, 90, 90]));
    }

    #[test]
    fn label_is_drawn_above_the_box() {
        let frame = gray_frame(100, 60);
        let dets = [Detection::new(1, [10.0, 30.0, 60.0, 55.0], 0.9)];
        let result = annotate(&frame, &dets, &classes());
        let label_rows = 30 - LABEL_GAP - GLYPH_HEIGHT..30 - LABEL_GAP;
        let has_label = label_rows
            .flat_map(|y| (10..30).map(move |x| (x, y)))
            .any(|(x, y)| *result.frame.get_pixel(x as u32, y as u32) == BOX_COLOR);
        assert!(has_label);
    }

    #[test]
    fn label_stays_in_frame_for_top_flush_box() {
        assert_eq!(label_origin(10, 0, 17, 100, 60), (10, 0));
        assert_eq!(label_origin(10, 4, 17, 100, 60), (10, 0));
        // Right edge pushes the label left.
        assert_eq!(label_origin(95, 30, 17, 100, 60), (83, 20));
        // Label wider than the frame pins to the left edge.
        assert_eq!(label_origin(5, 30, 200, 100, 60), (0, 20));

        let frame = gray_frame(40, 20);
        let dets = [Detection::new(3, [30.0, 0.0, 39.0, 19.0], 0.9)];
        let result = annotate(&frame, &dets, &classes());
        assert_eq!(result.vehicle_count, 1);
    }

    #[test]
    fn boxes_outside_the_frame_are_counted_but_clipped() {
        let frame = gray_frame(32, 32);
        let dets = [
            Detection::new(2, [-20.0, -20.0, 10.0, 10.0], 0.9),
            Detection::new(2, [100.0, 100.0, 140.0, 140.0], 0.9),
        ];
        let result = annotate(&frame, &dets, &classes());
        assert_eq!(result.vehicle_count, 2);
        assert_eq!(*result.frame.get_pixel(10, 9), BOX_COLOR);
    }

    #[test]
    fn empty_frame_is_tolerated() {
        let frame = RgbImage::new(0, 0);
        let dets = [Detection::new(0, [0.0, 0.0, 4.0, 4.0], 0.5)];
        let result = annotate(&frame, &dets, &classes());
        assert_eq!(result.vehicle_count, 1);
        assert_eq!(result.frame.dimensions(), (0, 0));
    }

    #[test]
    fn annotation_is_deterministic() {
        let frame = gray_frame(80, 80);
        let dets = [
            Detection::new(0, [5.0, 20.0, 50.0, 60.0], 0.9),
            Detection::new(2, [30.0, 25.0, 75.0, 70.0], 0.6),
        ];
        let first = annotate(&frame, &dets, &classes());
        let second = annotate(&frame, &dets, &classes());
        assert_eq!(first.frame, second.frame);
    }
}
