use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record matches both the descriptive and the MCQ shape")]
    Ambiguous,
    #[error("record matches no known shape (needs question + options, or upper_heading + yellow_heading)")]
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("`{0}` given without `day`; supply a complete date or none at all")]
    PartialDate(String),
    #[error("invalid `{field}` format: {value:?}")]
    InvalidFormat { field: String, value: String },
    #[error("invalid month name: {0:?}")]
    InvalidMonth(String),
    #[error("`{field}` = {value:?} disagrees with day {day}")]
    Inconsistent {
        field: String,
        value: String,
        day: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("unknown category tag: {0:?}")]
    UnknownTag(String),
    #[error("categories must be a string or an array of strings")]
    InvalidValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage timed out after {0} ms")]
    Timeout(u64),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Everything that can reject a single record. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Date(#[from] DateError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RecordError {
    /// Stable machine-readable code reported alongside the reason.
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::Classification(e) => match e {
                ClassificationError::NotAnObject => "classification.not_an_object",
                ClassificationError::Ambiguous => "classification.ambiguous",
                ClassificationError::NoMatch => "classification.no_match",
            },
            RecordError::Schema(e) => match e {
                SchemaError::MissingField(_) => "schema.missing_field",
                SchemaError::InvalidAnswer(_) => "schema.invalid_answer",
                SchemaError::InvalidField { .. } => "schema.invalid_field",
            },
            RecordError::Date(e) => match e {
                DateError::PartialDate(_) => "date.partial_date",
                DateError::InvalidFormat { .. } => "date.invalid_format",
                DateError::InvalidMonth(_) => "date.invalid_month",
                DateError::Inconsistent { .. } => "date.inconsistent",
            },
            RecordError::Category(e) => match e {
                CategoryError::UnknownTag(_) => "category.unknown_tag",
                CategoryError::InvalidValue => "category.invalid_value",
            },
            RecordError::Storage(e) => match e {
                StorageError::Timeout(_) => "storage.timeout",
                StorageError::Unavailable(_) => "storage.unavailable",
            },
        }
    }
}

/// Input that cannot be split into records at all.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("import payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("import payload must be a JSON array of records, got {0}")]
    NotArray(&'static str),
}
