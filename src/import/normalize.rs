use serde_json::{json, Map, Value};

use super::categories::{map_categories, CategorySet};
use super::classify::RecordKind;
use super::dates::{resolve_dates, Fallback, ResolvedDate};
use super::error::{RecordError, SchemaError};
use super::fields::{self, clip};

pub const DEFAULT_TOPIC: &str = "question-answer";
pub const DEFAULT_SUBTOPIC: &str = "mcq";
pub const DEFAULT_SUBTOPIC_2: &str = "more";

pub const CURRENT_AFFAIRS_BANK: &str = "currentaffairs_mcq";

/// Banks a standard MCQ import may target.
pub const STANDARD_BANKS: [&str; 10] = [
    "mcq",
    "polity",
    "history",
    "geography",
    "economics",
    "physics",
    "chemistry",
    "biology",
    "reasoning",
    "error",
];

const MAX_QUESTION: usize = 1000;
const MAX_OPTION: usize = 600;
const MAX_HEADING: usize = 250;
const MAX_KEY_POINT: usize = 200;
const MAX_CHAPTER: u64 = 41;

pub fn is_standard_bank(bank: &str) -> bool {
    STANDARD_BANKS.contains(&bank)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Difficulty> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Canonical MCQ. `None` on an optional field means the import did not
/// provide it: creation applies the default, an update keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqRecord {
    pub kind: RecordKind,
    pub bank: String,
    pub question: String,
    /// Contiguous from option 1, two to five entries.
    pub options: Vec<String>,
    /// 1-based index into `options`.
    pub answer: u8,
    pub chapter: Option<u8>,
    pub difficulty: Option<Difficulty>,
    pub explanation: Option<String>,
    pub year_exam: Option<String>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub subtopic_2: Option<String>,
    pub home: Option<bool>,
    pub mocktest: Option<bool>,
    pub is_live: Option<bool>,
    /// Always written: an absent `categories` field clears every flag.
    pub categories: CategorySet,
    pub date: ResolvedDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptiveRecord {
    pub upper_heading: String,
    pub yellow_heading: String,
    pub key_points: [Option<String>; 4],
    pub all_key_points: Option<String>,
    pub paragraph: Option<String>,
    pub link: Option<String>,
    pub url: Option<String>,
    pub categories: CategorySet,
    pub date: ResolvedDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalRecord {
    Mcq(McqRecord),
    Descriptive(DescriptiveRecord),
}

impl CanonicalRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            CanonicalRecord::Mcq(m) => m.kind,
            CanonicalRecord::Descriptive(_) => RecordKind::CurrentAffairsDescriptive,
        }
    }

    pub fn date(&self) -> &ResolvedDate {
        match self {
            CanonicalRecord::Mcq(m) => &m.date,
            CanonicalRecord::Descriptive(d) => &d.date,
        }
    }
}

impl McqRecord {
    /// Import-shaped JSON for this record. Normalizing it again with the same
    /// kind and bank yields an equal record.
    pub fn to_raw(&self) -> Value {
        let mut m = Map::new();
        m.insert("question".into(), json!(self.question));
        for (i, o) in self.options.iter().enumerate() {
            m.insert(format!("option_{}", i + 1), json!(o));
        }
        m.insert("ans".into(), json!(self.answer));
        let optional = [
            ("chapter", self.chapter.map(|c| json!(c))),
            ("difficulty", self.difficulty.map(|d| json!(d.as_str()))),
            ("extra", self.explanation.as_ref().map(|s| json!(s))),
            ("year_exam", self.year_exam.as_ref().map(|s| json!(s))),
            ("topic", self.topic.as_ref().map(|s| json!(s))),
            ("subtopic", self.subtopic.as_ref().map(|s| json!(s))),
            ("subtopic_2", self.subtopic_2.as_ref().map(|s| json!(s))),
            ("home", self.home.map(|b| json!(b))),
            ("mocktest", self.mocktest.map(|b| json!(b))),
            ("is_live", self.is_live.map(|b| json!(b))),
        ];
        for (k, v) in optional {
            if let Some(v) = v {
                m.insert(k.into(), v);
            }
        }
        // The key marks the current-affairs shape, so it is kept even when empty.
        if self.kind == RecordKind::CurrentAffairsMcq || self.categories != CategorySet::empty() {
            m.insert("categories".into(), json!(self.categories.tags()));
        }
        m.insert("year_now".into(), json!(self.date.year_now));
        m.insert("month".into(), json!(self.date.month));
        m.insert("day".into(), json!(self.date.day_string()));
        m.insert("creation_time".into(), json!(self.date.time_string()));
        Value::Object(m)
    }
}

pub fn normalize(
    raw: &Map<String, Value>,
    kind: RecordKind,
    bank: &str,
    fallback: &Fallback,
) -> Result<CanonicalRecord, RecordError> {
    match kind {
        RecordKind::StandardMcq => normalize_mcq(raw, kind, bank, fallback).map(CanonicalRecord::Mcq),
        RecordKind::CurrentAffairsMcq => {
            normalize_mcq(raw, kind, CURRENT_AFFAIRS_BANK, fallback).map(CanonicalRecord::Mcq)
        }
        RecordKind::CurrentAffairsDescriptive => {
            normalize_descriptive(raw, fallback).map(CanonicalRecord::Descriptive)
        }
    }
}

fn required(raw: &Map<String, Value>, key: &str, max: usize) -> Result<String, SchemaError> {
    fields::text(raw, key)
        .map(|s| clip(s, max))
        .ok_or_else(|| SchemaError::MissingField(key.to_string()))
}

fn invalid(field: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn flag(raw: &Map<String, Value>, key: &str) -> Result<Option<bool>, SchemaError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(invalid(key, format!("expected true or false, got {other}"))),
    }
}

fn chapter(raw: &Map<String, Value>) -> Result<Option<u8>, SchemaError> {
    let n = match raw.get("chapter") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match n {
        Some(n) if (1..=MAX_CHAPTER).contains(&n) => Ok(Some(n as u8)),
        _ => Err(invalid("chapter", format!("must be a number from 1 to {MAX_CHAPTER}"))),
    }
}

fn difficulty(raw: &Map<String, Value>) -> Result<Option<Difficulty>, SchemaError> {
    match raw.get("difficulty") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Difficulty::parse(s)
            .map(Some)
            .ok_or_else(|| invalid("difficulty", "must be easy, medium or hard")),
        Some(_) => Err(invalid("difficulty", "must be easy, medium or hard")),
    }
}

fn categories(raw: &Map<String, Value>) -> Result<CategorySet, RecordError> {
    Ok(map_categories(raw.get("categories"))?)
}

fn options(raw: &Map<String, Value>, max: usize) -> Result<Vec<String>, SchemaError> {
    let mut out = Vec::new();
    let mut gap: Option<usize> = None;
    for n in 1..=max {
        match fields::option(raw, n) {
            Some(v) => {
                if let Some(g) = gap {
                    return Err(SchemaError::MissingField(format!("option_{g}")));
                }
                out.push(clip(v, MAX_OPTION));
            }
            None => {
                gap.get_or_insert(n);
            }
        }
    }
    if out.len() < 2 {
        return Err(SchemaError::MissingField(format!("option_{}", out.len() + 1)));
    }
    Ok(out)
}

fn answer(raw: &Map<String, Value>, option_count: usize) -> Result<u8, SchemaError> {
    let v = fields::answer_value(raw).ok_or_else(|| SchemaError::MissingField("ans".into()))?;
    let a = fields::parse_answer(v)
        .ok_or_else(|| SchemaError::InvalidAnswer(format!("{v} is not 1-5 or A-E")))?;
    if usize::from(a) > option_count {
        return Err(SchemaError::InvalidAnswer(format!(
            "answer {a} but the record has {option_count} options"
        )));
    }
    Ok(a)
}

fn normalize_mcq(
    raw: &Map<String, Value>,
    kind: RecordKind,
    bank: &str,
    fallback: &Fallback,
) -> Result<McqRecord, RecordError> {
    let max_options = match kind {
        RecordKind::CurrentAffairsMcq => 4,
        _ => 5,
    };

    let question = required(raw, "question", MAX_QUESTION)?;
    let options = options(raw, max_options)?;
    let answer = answer(raw, options.len())?;
    let chapter = chapter(raw)?;
    let difficulty = difficulty(raw)?;
    let home = flag(raw, "home")?;
    let mocktest = flag(raw, "mocktest")?;
    let is_live = flag(raw, "is_live")?;

    let date = resolve_dates(raw, fallback)?;
    let categories = categories(raw)?;

    Ok(McqRecord {
        kind,
        bank: bank.to_string(),
        question,
        options,
        answer,
        chapter,
        difficulty,
        explanation: fields::text_any(raw, &["extra", "explanation"]),
        year_exam: fields::text(raw, "year_exam"),
        topic: fields::text(raw, "topic"),
        subtopic: fields::text(raw, "subtopic"),
        subtopic_2: fields::text(raw, "subtopic_2"),
        home,
        mocktest,
        is_live,
        categories,
        date,
    })
}

fn normalize_descriptive(
    raw: &Map<String, Value>,
    fallback: &Fallback,
) -> Result<DescriptiveRecord, RecordError> {
    let upper_heading = required(raw, "upper_heading", MAX_HEADING)?;
    let yellow_heading = required(raw, "yellow_heading", MAX_HEADING)?;
    let key_points = [1, 2, 3, 4].map(|n| {
        let key = format!("key_{n}");
        let alias = format!("key_point_{n}");
        fields::text_any(raw, &[key.as_str(), alias.as_str()]).map(|s| clip(s, MAX_KEY_POINT))
    });

    let date = resolve_dates(raw, fallback)?;
    let categories = categories(raw)?;

    Ok(DescriptiveRecord {
        upper_heading,
        yellow_heading,
        key_points,
        all_key_points: fields::text_any(raw, &["all_key_points", "key_points"]),
        paragraph: fields::text(raw, "paragraph"),
        link: fields::text(raw, "link"),
        url: fields::text(raw, "url"),
        categories,
        date,
    })
}
