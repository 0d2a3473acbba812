use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use super::classify::classify;
use super::dates::Fallback;
use super::error::{BatchError, ClassificationError, RecordError};
use super::normalize::{normalize, CanonicalRecord};
use super::upsert::{plan, upsert, Decision, IdentityKey, RecordId, RecordStore, UpsertOutcome};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub fallback: Fallback,
    /// Target bank for standard MCQ records.
    pub bank: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Apply,
    /// Classify, validate and look up, but never write.
    Preview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Created {
        kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<RecordId>,
        /// Previews of MCQ records echo the normalized record.
        #[serde(skip_serializing_if = "Option::is_none")]
        normalized: Option<Value>,
    },
    Updated {
        kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<RecordId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        normalized: Option<Value>,
    },
    Rejected {
        code: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub index: usize,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub rejected: Vec<Rejection>,
    /// One entry per input element, in input order.
    pub outcomes: Vec<ImportOutcome>,
    pub dry_run: bool,
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn process_one<S: RecordStore>(
    store: &mut S,
    value: &Value,
    opts: &ImportOptions,
    mode: ImportMode,
    seen: &mut HashSet<IdentityKey>,
) -> Result<ImportOutcome, RecordError> {
    let kind = classify(value)?;
    let Some(raw) = value.as_object() else {
        return Err(ClassificationError::NotAnObject.into());
    };
    let record = normalize(raw, kind, &opts.bank, &opts.fallback)?;
    let kind = record.kind().as_str();
    tracing::trace!(kind, day = %record.date().day_string(), "normalized");

    let outcome = match mode {
        ImportMode::Apply => match upsert(store, &record)? {
            UpsertOutcome::Created(id) => ImportOutcome::Created {
                kind,
                id: Some(id),
                normalized: None,
            },
            UpsertOutcome::Updated(id) => ImportOutcome::Updated {
                kind,
                id: Some(id),
                normalized: None,
            },
        },
        ImportMode::Preview => {
            let normalized = match &record {
                CanonicalRecord::Mcq(m) => Some(m.to_raw()),
                CanonicalRecord::Descriptive(_) => None,
            };
            match plan(store, &record, seen)? {
                Decision::Create => ImportOutcome::Created {
                    kind,
                    id: None,
                    normalized,
                },
                Decision::Update(id) => ImportOutcome::Updated {
                    kind,
                    id,
                    normalized,
                },
            }
        }
    };
    Ok(outcome)
}

/// Import every element of a JSON array. Only a payload that is not a JSON
/// array fails as a whole; each record is otherwise accepted or rejected on
/// its own.
pub fn run_batch<S: RecordStore>(
    store: &mut S,
    input: &str,
    opts: &ImportOptions,
    mode: ImportMode,
) -> Result<ImportReport, BatchError> {
    let payload: Value = serde_json::from_str(input)?;
    let items = match payload {
        Value::Array(items) => items,
        other => return Err(BatchError::NotArray(json_type(&other))),
    };

    tracing::info!(
        total = items.len(),
        bank = %opts.bank,
        fallback_date = %opts.fallback.date,
        dry_run = mode == ImportMode::Preview,
        "import started"
    );

    let mut report = ImportReport {
        total: items.len(),
        created: 0,
        updated: 0,
        rejected: Vec::new(),
        outcomes: Vec::with_capacity(items.len()),
        dry_run: mode == ImportMode::Preview,
    };
    let mut seen = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let outcome = match process_one(store, item, opts, mode, &mut seen) {
            Ok(o) => o,
            Err(e) => {
                if let RecordError::Storage(se) = &e {
                    tracing::error!(index, error = %se, "storage failed for record");
                } else {
                    tracing::warn!(index, code = e.code(), reason = %e, "record rejected");
                }
                report.rejected.push(Rejection {
                    index,
                    code: e.code(),
                    reason: e.to_string(),
                });
                ImportOutcome::Rejected {
                    code: e.code(),
                    reason: e.to_string(),
                }
            }
        };
        match &outcome {
            ImportOutcome::Created { kind, id, .. } => {
                report.created += 1;
                tracing::debug!(index, kind, id = ?id, "created");
            }
            ImportOutcome::Updated { kind, id, .. } => {
                report.updated += 1;
                tracing::debug!(index, kind, id = ?id, "updated");
            }
            ImportOutcome::Rejected { .. } => {}
        }
        report.outcomes.push(outcome);
    }

    tracing::info!(
        total = report.total,
        created = report.created,
        updated = report.updated,
        rejected = report.rejected.len(),
        "import finished"
    );
    Ok(report)
}
