use std::collections::HashSet;

use chrono::NaiveDate;

use super::error::StorageError;
use super::normalize::CanonicalRecord;

pub type RecordId = String;

/// What makes two imports "the same record". MCQ keys span every bank, so a
/// record that changes shape between imports still finds its stored row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Mcq {
        question: String,
        day: NaiveDate,
    },
    Descriptive {
        upper_heading: String,
        yellow_heading: String,
        day: NaiveDate,
    },
}

impl CanonicalRecord {
    pub fn identity_key(&self) -> IdentityKey {
        match self {
            CanonicalRecord::Mcq(m) => IdentityKey::Mcq {
                question: m.question.clone(),
                day: m.date.day,
            },
            CanonicalRecord::Descriptive(d) => IdentityKey::Descriptive {
                upper_heading: d.upper_heading.clone(),
                yellow_heading: d.yellow_heading.clone(),
                day: d.date.day,
            },
        }
    }
}

/// Persistence collaborator the import writes through.
pub trait RecordStore {
    fn find_by_identity_key(&mut self, key: &IdentityKey) -> Result<Option<RecordId>, StorageError>;

    /// Insert with defaults for every optional field the record leaves out.
    fn insert(&mut self, record: &CanonicalRecord) -> Result<RecordId, StorageError>;

    /// Overwrite the provided fields only.
    fn update(&mut self, id: &RecordId, record: &CanonicalRecord) -> Result<(), StorageError>;

    /// Run `f` so that no other writer can interleave with it. On error nothing
    /// `f` wrote is kept.
    fn atomically<T, F>(&mut self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Self) -> Result<T, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(RecordId),
    Updated(RecordId),
}

/// Lookup-then-write for one record, inside a single atomic section.
pub fn upsert<S: RecordStore>(
    store: &mut S,
    record: &CanonicalRecord,
) -> Result<UpsertOutcome, StorageError> {
    let key = record.identity_key();
    store.atomically(|s| match s.find_by_identity_key(&key)? {
        Some(id) => {
            s.update(&id, record)?;
            Ok(UpsertOutcome::Updated(id))
        }
        None => s.insert(record).map(UpsertOutcome::Created),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Create,
    /// `None` when the match is an earlier record of the same batch.
    Update(Option<RecordId>),
}

/// Read-only variant of `upsert` for previews. `seen` carries the keys of
/// earlier records in the batch, which would exist by the time this one is
/// written.
pub fn plan<S: RecordStore>(
    store: &mut S,
    record: &CanonicalRecord,
    seen: &mut HashSet<IdentityKey>,
) -> Result<Decision, StorageError> {
    let key = record.identity_key();
    let found = store.find_by_identity_key(&key)?;
    let first_in_batch = seen.insert(key);
    Ok(match found {
        Some(id) => Decision::Update(Some(id)),
        None if first_in_batch => Decision::Create,
        None => Decision::Update(None),
    })
}
