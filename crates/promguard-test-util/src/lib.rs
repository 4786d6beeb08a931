//! Shared test utilities for the promguard workspace.
//!
//! Builders for Prometheus API JSON bodies, mirroring the response shapes
//! of `/api/v1/query` and `/api/v1/query_range`. Probe-engine tests mount
//! these on an HTTP mock server, one body per expected query.

use serde_json::{json, Value};

/// `{"status":"success"}` envelope around a vector result.
pub fn vector_response(samples: &[(&[(&str, &str)], f64)]) -> Value {
    let result: Vec<Value> = samples
        .iter()
        .map(|(labels, value)| {
            json!({
                "metric": labels_value(labels),
                "value": [1614859502.068, value.to_string()],
            })
        })
        .collect();
    json!({
        "status": "success",
        "data": {"resultType": "vector", "result": result}
    })
}

pub fn empty_vector() -> Value {
    vector_response(&[])
}

/// A single always-present instant sample, no labels.
pub fn single_sample_vector() -> Value {
    vector_response(&[(&[], 1.0)])
}

/// One matrix series: labels plus samples every `step` seconds from
/// `start` to `end` inclusive (unix seconds).
pub fn sample_stream(labels: &[(&str, &str)], start: f64, end: f64, step: f64) -> Value {
    let mut values: Vec<Value> = Vec::new();
    let mut ts = start;
    while ts <= end {
        values.push(json!([ts, "1"]));
        ts += step;
    }
    json!({"metric": labels_value(labels), "values": values})
}

/// `{"status":"success"}` envelope around a matrix result.
pub fn matrix_response(streams: Vec<Value>) -> Value {
    json!({
        "status": "success",
        "data": {"resultType": "matrix", "result": streams}
    })
}

pub fn empty_matrix() -> Value {
    matrix_response(Vec::new())
}

/// A Prometheus API error body (`status: error`).
pub fn error_response(error_type: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "errorType": error_type,
        "error": message,
    })
}

fn labels_value(labels: &[(&str, &str)]) -> Value {
    let map: serde_json::Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    Value::Object(map)
}
