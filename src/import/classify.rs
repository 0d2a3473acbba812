use serde_json::{Map, Value};

use super::error::ClassificationError;
use super::fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    StandardMcq,
    CurrentAffairsMcq,
    CurrentAffairsDescriptive,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::StandardMcq => "standard_mcq",
            RecordKind::CurrentAffairsMcq => "currentaffairs_mcq",
            RecordKind::CurrentAffairsDescriptive => "currentaffairs_descriptive",
        }
    }
}

fn is_current_affairs_mcq(raw: &Map<String, Value>) -> bool {
    raw.contains_key("question")
        && (1..=4).all(|n| fields::option(raw, n).is_some())
        && fields::option(raw, 5).is_none()
        && fields::answer_value(raw)
            .and_then(fields::parse_answer)
            .is_some_and(|a| a <= 4)
        && raw.contains_key("categories")
}

fn is_standard_mcq(raw: &Map<String, Value>) -> bool {
    raw.contains_key("question") && (1..=3).all(|n| fields::option(raw, n).is_some())
}

fn is_descriptive(raw: &Map<String, Value>) -> bool {
    raw.contains_key("upper_heading") && raw.contains_key("yellow_heading")
}

pub fn classify(raw: &Value) -> Result<RecordKind, ClassificationError> {
    let Some(raw) = raw.as_object() else {
        return Err(ClassificationError::NotAnObject);
    };

    // Within the MCQ family the current-affairs shape is the more specific one.
    let mcq = if is_current_affairs_mcq(raw) {
        Some(RecordKind::CurrentAffairsMcq)
    } else if is_standard_mcq(raw) {
        Some(RecordKind::StandardMcq)
    } else {
        None
    };

    match (is_descriptive(raw), mcq) {
        (true, Some(_)) => Err(ClassificationError::Ambiguous),
        (true, None) => Ok(RecordKind::CurrentAffairsDescriptive),
        (false, Some(kind)) => Ok(kind),
        (false, None) => Err(ClassificationError::NoMatch),
    }
}
