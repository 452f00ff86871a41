//! Image preprocessing for detection and OCR

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};
use imageproc::{contrast, filter};

/// Height plate crops are scaled to before OCR
pub const OCR_TARGET_HEIGHT: u32 = 100;

/// Sigma roughly equivalent to a 5x5 Gaussian kernel
const BLUR_SIGMA: f32 = 1.1;

/// Edge-preserving smoothing of the scaled plate
const BILATERAL_WINDOW: u32 = 9;
const BILATERAL_SIGMA: f32 = 75.0;

pub fn grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    filter::gaussian_blur_f32(image, sigma)
}

pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    contrast::equalize_histogram(image)
}

/// Otsu binarization with dark text turned white on black
pub fn binarize_inverted(image: &GrayImage) -> GrayImage {
    let level = contrast::otsu_level(image);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > level {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// Grayscale, blur, equalize
pub fn preprocess_for_detection(image: &DynamicImage) -> GrayImage {
    let gray = grayscale(image);
    let blurred = gaussian_blur(&gray, BLUR_SIGMA);
    equalize_histogram(&blurred)
}

/// Grayscale, scale to [`OCR_TARGET_HEIGHT`], bilateral denoise, inverted Otsu threshold
pub fn preprocess_plate_for_ocr(plate: &DynamicImage) -> GrayImage {
    let gray = grayscale(plate);
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }

    let scale = OCR_TARGET_HEIGHT as f32 / gray.height() as f32;
    let target_width = ((gray.width() as f32 * scale).round() as u32).max(1);
    let resized = image::imageops::resize(
        &gray,
        target_width,
        OCR_TARGET_HEIGHT,
        FilterType::CatmullRom,
    );

    let denoised =
        filter::bilateral_filter(&resized, BILATERAL_WINDOW, BILATERAL_SIGMA, BILATERAL_SIGMA);
    binarize_inverted(&denoised)
}
