//! Plate crops and annotated result images

use ab_glyph::{FontArc, PxScale};
use common::{BoundingBox, RecognizedPlate};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 18.0;
const LABEL_GAP: i32 = 4;

/// Cut the part of `image` covered by `bbox`; `None` if the crop is empty
pub fn crop_plate(image: &DynamicImage, bbox: &BoundingBox) -> Option<DynamicImage> {
    let (x, y, width, height) = bbox.to_pixel_rect(image.width(), image.height())?;
    Some(image.crop_imm(x, y, width, height))
}

/// Draw every plate's box with its detection confidence above and its text below
pub fn annotate(image: &DynamicImage, plates: &[RecognizedPlate], font: &FontArc) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();

    for plate in plates {
        let Some((x, y, w, h)) = plate.position.to_pixel_rect(width, height) else {
            continue;
        };

        for inset in 0..BOX_THICKNESS {
            if w <= inset * 2 || h <= inset * 2 {
                break;
            }
            let rect = Rect::at((x + inset) as i32, (y + inset) as i32)
                .of_size(w - inset * 2, h - inset * 2);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }

        let scale = PxScale::from(LABEL_SCALE);

        let label = format!("Plate: {:.2}", plate.detection_confidence);
        let label_y = (y as i32 - LABEL_SCALE as i32 - LABEL_GAP).max(0);
        draw_text_mut(&mut canvas, BOX_COLOR, x as i32, label_y, scale, font, &label);

        if !plate.text.is_empty() {
            let text_y = (y + h) as i32 + LABEL_GAP;
            draw_text_mut(&mut canvas, TEXT_COLOR, x as i32, text_y, scale, font, &plate.text);
        }
    }

    canvas
}
