//! License plate detection, recognition and evaluation
//!
//! - [`common`]: plate data model, ground truth and text validation
//! - [`evaluation`]: box matching, OCR scoring and reports
//! - [`lpr_pipeline`]: detectors, OCR engines and the image/dataset drivers
//! - [`telemetry`]: logging and Prometheus metrics

pub use common;
pub use evaluation;
pub use lpr_pipeline;
pub use telemetry;
