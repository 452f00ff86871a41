use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Pipeline Metrics ====
    pub static ref LPR_IMAGES_PROCESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "lpr_images_processed_total",
                "Total number of images handed to the pipeline",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_PLATES_DETECTED: IntCounter = {
        let metric = IntCounter::new(
            "lpr_plates_detected_total",
            "Total number of plate candidates returned by the detector",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_OCR_READINGS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "lpr_ocr_readings_total",
                "Total number of OCR readings by outcome",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref LPR_STAGE_DURATION: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "lpr_stage_duration_seconds",
                "Time spent in each pipeline stage",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["stage"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Inference Metrics ====
    pub static ref LPR_INFERENCE_SESSIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "lpr_inference_sessions_total",
                "ONNX sessions created by execution provider",
            ),
            &["model", "execution_provider"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
