use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::value::value_to_f64;

/// Body of a `POST extract` response.
#[derive(Deserialize, Debug, Default)]
pub struct ExtractResponse {
    #[serde(default)]
    pub extracted_data: Option<ExtractedData>,
}

/// Character stats read off a screenshot. The service may leave any field
/// out, send it as null, or send a number as a string.
#[derive(Deserialize, Debug, Default)]
pub struct ExtractedData {
    #[serde(default)]
    pub level: Option<Value>,
    #[serde(default)]
    pub exp: Option<Value>,
    #[serde(default)]
    pub meso: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExtractedStats {
    pub level: f64,
    pub exp: f64,
    pub meso: f64,
}

impl ExtractedData {
    /// `None` when no field came back or a present field is not numeric.
    /// Missing fields count as zero as long as one of them is present.
    pub fn into_stats(self) -> Option<ExtractedStats> {
        let fields = [self.level, self.exp, self.meso];
        if fields.iter().all(Option::is_none) {
            return None;
        }
        let mut numbers = [0.0; 3];
        for (slot, field) in numbers.iter_mut().zip(fields.iter()) {
            if let Some(value) = field {
                *slot = value_to_f64(value)?;
            }
        }
        let [level, exp, meso] = numbers;
        Some(ExtractedStats { level, exp, meso })
    }
}
