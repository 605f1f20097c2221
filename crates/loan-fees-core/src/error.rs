use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeeError {
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("Field not applicable: {field} — {reason}")]
    FieldNotApplicable { field: String, reason: String },

    #[error("Value out of range: {field} = {value} — {reason}")]
    NumericOutOfRange {
        field: String,
        value: Decimal,
        reason: String,
    },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid band range: max must exceed min (min {min}, max {max})")]
    InvalidBandRange { min: Decimal, max: Decimal },

    #[error("Band [{min}, {max}) overlaps existing band {existing_index} [{existing_min}, {existing_max})")]
    OverlappingBandRange {
        min: Decimal,
        max: Decimal,
        existing_index: usize,
        existing_min: Decimal,
        existing_max: Decimal,
    },

    #[error("Band schedule leaves [{from}, {to}) uncovered")]
    BandCoverageGap { from: Decimal, to: Decimal },

    #[error("Band index {index} out of range (collection holds {len} bands)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Pending deletion of band {index} is stale: the collection changed since it was requested")]
    StaleBandDeletion { index: usize },

    #[error("No applicable band for subject value {subject}")]
    NoApplicableBand { subject: Decimal },

    #[error("Invalid subject value: {0}")]
    SubjectValueInvalid(String),

    #[error("Unknown ledger account: {field} = {account}")]
    UnknownLedgerAccount { field: String, account: String },

    #[error("Fee definition not found: {0}")]
    NotFound(Uuid),

    #[error("Fee definition {0} is referenced by a loan product; archive it instead")]
    ReferencedByLoanProduct(Uuid),

    #[error("Fee definition {0} is archived and can no longer be deleted")]
    ArchivedNotDeletable(Uuid),

    #[error("Version conflict on fee definition {id}: expected {expected}, stored {actual}")]
    VersionConflict { id: Uuid, expected: u64, actual: u64 },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl FeeError {
    pub(crate) fn missing(field: &str) -> Self {
        FeeError::MissingRequiredField {
            field: field.into(),
        }
    }

    pub(crate) fn not_applicable(field: &str, reason: &str) -> Self {
        FeeError::FieldNotApplicable {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the form field this error belongs to, when it belongs to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            FeeError::MissingRequiredField { field }
            | FeeError::FieldNotApplicable { field, .. }
            | FeeError::NumericOutOfRange { field, .. }
            | FeeError::InvalidInput { field, .. }
            | FeeError::UnknownLedgerAccount { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FeeError {
    fn from(e: serde_json::Error) -> Self {
        FeeError::SerializationError(e.to_string())
    }
}
