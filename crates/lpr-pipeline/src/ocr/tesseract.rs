//! Tesseract command-line OCR
//!
//! The crop is PNG-encoded and piped to `tesseract stdin stdout`, treating the
//! image as a single text line restricted to plate characters.

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageFormat};
use std::io::{self, Cursor, Write};
use std::process::{Command, Stdio};

use super::{OcrReading, PlateOcr};
use crate::config::TesseractConfig;
use crate::preprocessing::preprocess_plate_for_ocr;

pub struct TesseractOcr {
    config: TesseractConfig,
}

impl TesseractOcr {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Command-line arguments after the executable
    pub fn args(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.config.language.clone(),
            "--oem".to_string(),
            self.config.oem.to_string(),
            "--psm".to_string(),
            self.config.psm.to_string(),
            "-c".to_string(),
            format!("tessedit_char_whitelist={}", self.config.char_whitelist),
        ]
    }

    /// Tesseract reports no confidence on this path; longer readings score higher
    pub fn confidence_for(text: &str) -> f32 {
        let len = text.trim().chars().count();
        (len as f32 / 10.0).min(1.0)
    }

    fn run(&self, png: &[u8]) -> Result<String> {
        let mut child = Command::new(&self.config.binary_path)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.config.binary_path))?;

        // stdin is closed at the end of the match so tesseract sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(png),
            None => Err(io::Error::other("stdin was not captured")),
        };

        // always reap the child, even when it stopped reading early
        let output = child
            .wait_with_output()
            .context("Failed to wait for tesseract")?;

        if let Err(e) = written {
            return Err(anyhow!(
                "Failed to send image to tesseract ({}): {}: {}",
                output.status,
                e,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        if !output.status.success() {
            return Err(anyhow!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PlateOcr for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn prepare(&self, crop: &DynamicImage) -> DynamicImage {
        DynamicImage::ImageLuma8(preprocess_plate_for_ocr(crop))
    }

    fn recognize(&mut self, plate: &DynamicImage) -> Result<OcrReading> {
        let mut png = Vec::new();
        plate
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode plate crop")?;

        let text = self.run(&png)?;
        let text = text.trim();
        Ok(OcrReading::new(text, Self::confidence_for(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_match_single_line_plate_mode() {
        let ocr = TesseractOcr::new(TesseractConfig::default());
        let args = ocr.args();

        assert_eq!(&args[..2], &["stdin", "stdout"]);
        assert!(args.windows(2).any(|w| w[0] == "--oem" && w[1] == "3"));
        assert!(args.windows(2).any(|w| w[0] == "--psm" && w[1] == "7"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("tessedit_char_whitelist=ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789")
        );
    }

    #[test]
    fn test_confidence_heuristic() {
        assert_eq!(TesseractOcr::confidence_for(""), 0.0);
        assert_eq!(TesseractOcr::confidence_for("   "), 0.0);
        assert!((TesseractOcr::confidence_for(" ABC123\n") - 0.6).abs() < 1e-6);
        assert_eq!(TesseractOcr::confidence_for("ABCDEFGHIJKLMN"), 1.0);
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let mut ocr = TesseractOcr::new(TesseractConfig {
            binary_path: "/nonexistent/bin/tesseract".to_string(),
            ..TesseractConfig::default()
        });

        let plate = DynamicImage::new_luma8(40, 12);
        assert!(ocr.recognize(&plate).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_reports_stderr() {
        // `sh stdin ...` fails to open a script named "stdin" and never reads the pipe
        let ocr = TesseractOcr::new(TesseractConfig {
            binary_path: "sh".to_string(),
            ..TesseractConfig::default()
        });

        let mut seed = 12345u32;
        let noise = image::GrayImage::from_fn(400, 400, |_, _| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            image::Luma([(seed >> 16) as u8])
        });
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(noise)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        assert!(png.len() > 100_000);

        let err = ocr.run(&png).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("No such file"), "{}", message);
    }

    #[test]
    fn test_prepare_binarizes_crop() {
        let ocr = TesseractOcr::new(TesseractConfig::default());
        let prepared = ocr.prepare(&DynamicImage::new_rgb8(50, 20));

        assert_eq!(prepared.height(), 100);
        assert!(prepared.as_luma8().is_some());
    }
}
