//! Integration tests for plate text cleanup and validation

use common::validation::clean_plate_text;
use common::{PlateFormat, PlateValidator};

#[test]
fn test_cleanup_strips_everything_but_plate_chars() {
    assert_eq!(clean_plate_text("34 ab 123!"), "34AB123");

    for raw in ["  abc-1234 ", "ß∂ƒ 12", "\tQ.W.E\n", "", "!!!"] {
        let cleaned = clean_plate_text(raw);
        assert!(cleaned
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}

#[test]
fn test_known_formats() {
    let validator = PlateValidator::default();

    let valid = validator.analyze("abc 1234", 0.8);
    assert!(valid.is_valid);
    assert_eq!(valid.text, "ABC1234");
    assert_eq!(valid.format, Some(PlateFormat::ThreeLettersFourDigits));
    assert_eq!(valid.confidence, 0.8);

    assert_eq!(
        validator.analyze("ABC1D23", 0.5).format,
        Some(PlateFormat::Mercosur)
    );
    assert_eq!(
        validator.analyze("AB12C3", 0.5).format,
        Some(PlateFormat::Regional)
    );
}

#[test]
fn test_length_window_rejects_short_and_long_text() {
    let validator = PlateValidator::default();

    let short = validator.analyze("AB", 0.9);
    assert!(!short.is_valid);
    assert_eq!(short.text, "AB");

    assert!(!validator.analyze("ABCDEFGHIJ", 0.9).is_valid);
}

#[test]
fn test_custom_window_from_json() {
    let validator: PlateValidator =
        serde_json::from_str(r#"{ "min_len": 7, "max_len": 7, "formats": ["three_letters_four_digits"] }"#)
            .unwrap();

    assert!(validator.analyze("ABC1234", 1.0).is_valid);
    assert!(!validator.analyze("ABC1D23", 1.0).is_valid);
    assert!(!validator.analyze("AB12C3", 1.0).is_valid);
}
