use uuid::Uuid;

use crate::fee_definition::{FeeDefinition, LedgerAccountRef};
use crate::types::Currency;
use crate::FeeResult;

/// Persistence collaborator for fee definitions.
///
/// Implementations apply each write atomically per definition and own the
/// `createdAt`, `updatedAt` and `version` fields.
pub trait FeeRepository: Send + Sync {
    fn get(&self, id: Uuid) -> FeeResult<Option<FeeDefinition>>;
    fn list(&self) -> FeeResult<Vec<FeeDefinition>>;
    /// Store a new definition at version 1.
    fn insert(&self, definition: FeeDefinition) -> FeeResult<FeeDefinition>;
    /// Replace a stored definition. Fails with `VersionConflict` when the
    /// stored version differs from `expected_version`.
    fn update(&self, definition: FeeDefinition, expected_version: u64) -> FeeResult<FeeDefinition>;
    fn remove(&self, id: Uuid) -> FeeResult<()>;
}

/// Loan products that hold fee definition references.
pub trait LoanProductDirectory: Send + Sync {
    fn references_fee(&self, fee_id: Uuid) -> FeeResult<bool>;
    fn product_currency(&self, product_id: Uuid) -> FeeResult<Option<Currency>>;
}

/// Ledger accounts selectable as receivable or income account.
pub trait LedgerAccountDirectory: Send + Sync {
    fn contains(&self, account: &LedgerAccountRef) -> bool;
}
