use crate::audit::AuditRecord;
use crate::event::EventRecord;
use crate::scope::Scope;

/// Dynamic dispatch on record type is modeled as a tagged variant, not an
/// open-ended subtype hierarchy: the translator and matcher dispatch on
/// this tag and nothing else.
#[derive(Debug, Clone)]
pub enum Record {
    Audit(AuditRecord),
    Event(EventRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Audit,
    Event,
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Audit(_) => RecordKind::Audit,
            Record::Event(_) => RecordKind::Event,
        }
    }

    pub fn origin_id(&self) -> String {
        match self {
            Record::Audit(record) => record.origin_id(),
            Record::Event(record) => record.origin_id(),
        }
    }

    pub fn target_identity(&self) -> Option<(String, String)> {
        match self {
            Record::Audit(record) => record.target_identity(),
            Record::Event(record) => record.target_identity(),
        }
    }
}

/// A record plus the immutable tenant scope it was stamped with at
/// ingest. The scope is carried alongside the record, never recomputed
/// from the object body.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub record: T,
    pub tenant: Scope,
}

impl<T> Ingested<T> {
    pub fn new(record: T, tenant: Scope) -> Self {
        Self { record, tenant }
    }
}
