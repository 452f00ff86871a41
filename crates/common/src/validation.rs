//! Plate text cleanup and format classification
//!
//! Recognized text goes through two stages:
//! - cleanup: uppercase, then drop everything outside `A-Z0-9`
//! - classification: a length window plus a whitelist of known plate shapes
//!
//! The cleaned text is always returned; classification only sets the
//! validity flag.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::plates::RecognitionResult;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default shortest accepted plate, in characters
pub const DEFAULT_MIN_PLATE_LENGTH: usize = 6;

/// Default longest accepted plate, in characters
pub const DEFAULT_MAX_PLATE_LENGTH: usize = 8;

static NON_PLATE_CHARS: Lazy<Regex> = Lazy::new(|| compile(r"[^A-Z0-9]"));

static REGIONAL: Lazy<Regex> = Lazy::new(|| compile(r"^[A-Z]{2,3}[0-9]{1,2}[A-Z0-9]{1,2}$"));

static THREE_LETTERS_FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| compile(r"^[A-Z]{3}[0-9]{4}$"));

static MERCOSUR: Lazy<Regex> = Lazy::new(|| compile(r"^[A-Z]{3}[0-9][A-Z][0-9]{2}$"));

// The patterns above are literals; a failure here is a programming error caught by tests.
fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in plate pattern {pattern}: {e}"),
    }
}

// ============================================================================
// Plate formats
// ============================================================================

/// Known plate layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateFormat {
    /// 2-3 letters, 1-2 digits, 1-2 letters or digits (e.g. `AB12C3`, `ABC12D`)
    Regional,

    /// 3 letters followed by 4 digits (e.g. `ABC1234`)
    ThreeLettersFourDigits,

    /// Mercosur layout: letter-letter-letter-digit-letter-digit-digit (e.g. `ABC1D23`)
    Mercosur,
}

impl PlateFormat {
    /// All formats, most specific first
    pub const ALL: [PlateFormat; 3] = [
        PlateFormat::ThreeLettersFourDigits,
        PlateFormat::Mercosur,
        PlateFormat::Regional,
    ];

    pub fn pattern(&self) -> &'static Regex {
        match self {
            PlateFormat::Regional => &REGIONAL,
            PlateFormat::ThreeLettersFourDigits => &THREE_LETTERS_FOUR_DIGITS,
            PlateFormat::Mercosur => &MERCOSUR,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern().is_match(text)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlateFormat::Regional => "regional",
            PlateFormat::ThreeLettersFourDigits => "three_letters_four_digits",
            PlateFormat::Mercosur => "mercosur",
        }
    }
}

impl std::str::FromStr for PlateFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        PlateFormat::ALL
            .into_iter()
            .find(|f| f.name() == s.to_lowercase())
            .ok_or_else(|| anyhow!("unknown plate format '{}'", s))
    }
}

// ============================================================================
// Cleanup
// ============================================================================

/// Uppercase `raw` and strip every character that is not `A-Z` or `0-9`
pub fn clean_plate_text(raw: &str) -> String {
    NON_PLATE_CHARS
        .replace_all(&raw.to_uppercase(), "")
        .into_owned()
}

// ============================================================================
// Validator
// ============================================================================

/// Outcome of cleaning and classifying one string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateCheck {
    pub text: String,
    pub is_valid: bool,
    pub format: Option<PlateFormat>,
}

/// Clean-then-classify validator with a configurable length window and format set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateValidator {
    /// Shortest accepted cleaned text (inclusive)
    #[serde(default = "default_min_len")]
    pub min_len: usize,

    /// Longest accepted cleaned text (inclusive)
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Accepted layouts, checked in order
    #[serde(default = "default_formats")]
    pub formats: Vec<PlateFormat>,
}

fn default_min_len() -> usize {
    DEFAULT_MIN_PLATE_LENGTH
}

fn default_max_len() -> usize {
    DEFAULT_MAX_PLATE_LENGTH
}

fn default_formats() -> Vec<PlateFormat> {
    PlateFormat::ALL.to_vec()
}

impl Default for PlateValidator {
    fn default() -> Self {
        Self {
            min_len: default_min_len(),
            max_len: default_max_len(),
            formats: default_formats(),
        }
    }
}

impl PlateValidator {
    pub fn new(min_len: usize, max_len: usize, formats: Vec<PlateFormat>) -> Result<Self> {
        let validator = Self {
            min_len,
            max_len,
            formats,
        };
        validator.validate()?;
        Ok(validator)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.min_len == 0 {
            return Err(anyhow!("min_len must be at least 1"));
        }
        validate_range(self.max_len, self.min_len, usize::MAX, "max_len")?;
        if self.formats.is_empty() {
            return Err(anyhow!("at least one plate format is required"));
        }
        Ok(())
    }

    /// First configured format matching already-cleaned `text`, ignoring length
    pub fn classify(&self, text: &str) -> Option<PlateFormat> {
        self.formats.iter().copied().find(|f| f.matches(text))
    }

    /// Clean `raw` and classify the result
    pub fn check(&self, raw: &str) -> PlateCheck {
        let text = clean_plate_text(raw);
        let len = text.chars().count();

        let format = if (self.min_len..=self.max_len).contains(&len) {
            self.classify(&text)
        } else {
            None
        };

        PlateCheck {
            is_valid: format.is_some(),
            format,
            text,
        }
    }

    /// Clean and classify raw OCR output, attaching the engine's confidence
    pub fn analyze(&self, raw: &str, confidence: f32) -> RecognitionResult {
        let check = self.check(raw);
        RecognitionResult {
            text: check.text,
            is_valid: check.is_valid,
            format: check.format,
            confidence,
        }
    }
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate value is within range
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    if value < min || value > max {
        return Err(anyhow!(
            "{} must be between {} and {}, got {}",
            field_name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
