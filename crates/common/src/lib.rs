pub mod ground_truth;
pub mod plates;
pub mod validation;

pub use ground_truth::GroundTruth;
pub use plates::{
    BoundingBox, DetectionRecord, GroundTruthRecord, RecognitionResult, RecognizedPlate,
};
pub use validation::{PlateFormat, PlateValidator};
