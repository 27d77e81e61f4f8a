use crate::domain::company::Quarter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub timestamp: String,
    pub text: String,
    pub speaker: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptData {
    pub ticker: String,
    pub quarter: Quarter,
    pub year: i32,
    pub fiscal_date_ending: String,
    pub transcript: String,
    #[serde(default)]
    pub entries: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TranscriptPayload {
    Text(String),
    Segments(Vec<TranscriptSegment>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TranscriptSegment {
    Spoken {
        #[serde(default)]
        speaker: Option<String>,
        #[serde(default)]
        content: Option<String>,
    },
    Other(serde_json::Value),
}

impl TranscriptPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            TranscriptPayload::Text(s) => s.trim().is_empty(),
            TranscriptPayload::Segments(segments) => segments.is_empty(),
        }
    }
}
