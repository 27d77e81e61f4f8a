use crate::domain::transcript::{TranscriptEntry, TranscriptPayload, TranscriptSegment};
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

const WORDS_PER_MINUTE: f64 = 150.0;
const PARAGRAPH_BREAK: &str = "\n\n";

static SPEAKER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z\s\.]+):\s*").expect("speaker pattern is valid"));

pub fn flatten(payload: &TranscriptPayload) -> String {
    match payload {
        TranscriptPayload::Text(text) => text.clone(),
        TranscriptPayload::Segments(segments) => segments
            .iter()
            .filter_map(segment_text)
            .collect::<Vec<_>>()
            .join(PARAGRAPH_BREAK),
    }
}

fn segment_text(segment: &TranscriptSegment) -> Option<String> {
    match segment {
        TranscriptSegment::Spoken { speaker, content } => {
            let content = content.as_deref().filter(|c| !c.is_empty())?;
            match speaker.as_deref().filter(|s| !s.is_empty()) {
                Some(speaker) => Some(format!("{speaker}: {content}")),
                None => Some(content.to_string()),
            }
        }
        TranscriptSegment::Other(serde_json::Value::String(s)) => Some(s.clone()),
        TranscriptSegment::Other(other) => Some(other.to_string()),
    }
}

pub fn parse_entries(text: &str) -> Vec<TranscriptEntry> {
    let normalized = text.replace("\r\n", "\n");
    let mut entries = Vec::new();
    let mut clock_secs: u64 = 0;

    for paragraph in normalized.split(PARAGRAPH_BREAK) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let (speaker, body) = match SPEAKER_PREFIX.captures(paragraph) {
            Some(caps) => {
                let label = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                let rest = &paragraph[caps.get(0).map_or(0, |m| m.end())..];
                (Some(label.to_string()), rest.trim())
            }
            None => (None, paragraph),
        };
        if body.is_empty() {
            continue;
        }

        let index = entries.len();
        entries.push(TranscriptEntry {
            id: entry_id(index, body),
            timestamp: format_clock(clock_secs),
            text: body.to_string(),
            speaker,
            confidence: Some(1.0),
        });

        clock_secs += speaking_secs(body);
    }

    entries
}

fn speaking_secs(text: &str) -> u64 {
    let words = text.split_whitespace().count() as f64;
    (words / WORDS_PER_MINUTE * 60.0).round() as u64
}

fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn entry_id(index: usize, text: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{index}:{text}").as_bytes()).to_string()
}
