/// Recover label → box mappings from free-form model replies.
///
/// Replies are supposed to be a JSON object of `label: [ymin, xmin, ymax, xmax]`
/// but models wrap them in code fences, prefix them with prose or emit
/// slightly broken JSON. Decoding never fails; if nothing usable is found the
/// result is simply empty.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::bbox::types::{LabelledBoxes, NormalizedBox};

static BOX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]+)"\s*:\s*\[\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\]"#)
        .expect("box pattern is a valid regex")
});

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("fence pattern is a valid regex")
});

/// Which decoding stage produced the boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeSource {
    /// The whole reply was a well-formed JSON mapping.
    Structured,
    /// A fenced code block inside the reply was a well-formed JSON mapping.
    Fenced,
    /// Boxes were scraped out of otherwise unparseable text.
    Pattern,
    /// Nothing was found.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Decoded {
    pub boxes: LabelledBoxes,
    pub source: DecodeSource,
}

/// Decode `text` into boxes. An empty result means "no boxes found".
pub fn decode(text: &str) -> LabelledBoxes {
    decode_detailed(text).boxes
}

pub fn decode_detailed(text: &str) -> Decoded {
    let decoded = if let Some(boxes) = parse_strict(text) {
        Decoded { boxes, source: DecodeSource::Structured }
    } else if let Some(boxes) = parse_fenced(text) {
        Decoded { boxes, source: DecodeSource::Fenced }
    } else {
        let boxes = extract_patterns(text);
        let source = if boxes.is_empty() { DecodeSource::Empty } else { DecodeSource::Pattern };
        Decoded { boxes, source }
    };

    tracing::debug!(
        source = ?decoded.source,
        count = decoded.boxes.len(),
        "decoded model reply"
    );
    decoded
}

fn parse_strict(text: &str) -> Option<LabelledBoxes> {
    match serde_json::from_str::<LabelledBoxes>(text) {
        Ok(boxes) => Some(boxes),
        Err(e) => {
            tracing::trace!(error = %e, "strict parse failed");
            None
        }
    }
}

fn parse_fenced(text: &str) -> Option<LabelledBoxes> {
    FENCED_BLOCK
        .captures_iter(text)
        .find_map(|cap| parse_strict(cap.get(1)?.as_str()))
}

/// Scan for `"label": [a, b, c, d]` fragments in order of appearance.
pub fn extract_patterns(text: &str) -> LabelledBoxes {
    let mut boxes = LabelledBoxes::new();
    for cap in BOX_PATTERN.captures_iter(text) {
        let mut coords = [0.0f64; 4];
        // digit runs too long for f64 come out as infinity
        let parsed = (0..4).all(|i| match cap[i + 2].parse::<f64>() {
            Ok(v) if v.is_finite() => {
                coords[i] = v;
                true
            }
            _ => false,
        });
        if !parsed {
            tracing::debug!(label = &cap[1], "skipping box with out-of-range coordinate");
            continue;
        }
        boxes.insert(&cap[1], NormalizedBox::from(coords));
    }
    boxes
}
