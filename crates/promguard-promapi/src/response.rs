use crate::PromError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One element of an instant-query vector result.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InstantSample {
    #[serde(rename = "metric")]
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "value", deserialize_with = "de_sample")]
    pub value: (f64, f64),
}

/// One labeled series of a range-query matrix result.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RangeSeries {
    #[serde(rename = "metric")]
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "values", deserialize_with = "de_samples")]
    pub samples: Vec<(f64, f64)>,
}

/// Prometheus encodes samples as `[<unix seconds>, "<value>"]`.
fn de_sample<'de, D>(deserializer: D) -> Result<(f64, f64), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let (ts, value): (f64, String) = Deserialize::deserialize(deserializer)?;
    let value = value.parse::<f64>().map_err(serde::de::Error::custom)?;
    Ok((ts, value))
}

fn de_samples<'de, D>(deserializer: D) -> Result<Vec<(f64, f64)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<(f64, String)> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(ts, value)| {
            let value = value.parse::<f64>().map_err(serde::de::Error::custom)?;
            Ok((ts, value))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<ApiData>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: serde_json::Value,
}

impl ApiResponse {
    /// Map an API-level error body to a typed error.
    pub(crate) fn into_error(self) -> PromError {
        let message = self.error.unwrap_or_else(|| "unknown error".to_string());
        match self.error_type.as_deref() {
            Some("bad_data") => PromError::BadData(message),
            Some(kind) => PromError::Api {
                kind: kind.to_string(),
                message,
            },
            None => PromError::Api {
                kind: "error".to_string(),
                message,
            },
        }
    }

    pub(crate) fn into_vector(self) -> Result<Vec<InstantSample>, PromError> {
        let data = self
            .data
            .ok_or_else(|| PromError::Decode("missing data field".to_string()))?;
        if data.result_type != "vector" {
            return Err(PromError::Decode(format!(
                "expected vector result, got {}",
                data.result_type
            )));
        }
        serde_json::from_value(data.result).map_err(|e| PromError::Decode(e.to_string()))
    }

    pub(crate) fn into_matrix(self) -> Result<Vec<RangeSeries>, PromError> {
        let data = self
            .data
            .ok_or_else(|| PromError::Decode("missing data field".to_string()))?;
        if data.result_type != "matrix" {
            return Err(PromError::Decode(format!(
                "expected matrix result, got {}",
                data.result_type
            )));
        }
        serde_json::from_value(data.result).map_err(|e| PromError::Decode(e.to_string()))
    }
}
