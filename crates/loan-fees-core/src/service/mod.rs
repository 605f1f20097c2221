//! Fee definition lifecycle: create, update, archive and delete against a
//! persistence collaborator, with referential checks against loan products
//! and the ledger account directory.

mod fee_service;
mod memory;
mod traits;

pub use fee_service::{FeeDefinitionService, RetireOutcome};
pub use memory::{InMemoryFeeRepository, InMemoryLedgerAccounts, InMemoryLoanProducts};
pub use traits::{FeeRepository, LedgerAccountDirectory, LoanProductDirectory};
