pub mod applicability;
pub mod bands;
pub mod config;
pub mod error;
pub mod fee_definition;
pub mod resolution;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

pub use applicability::{Applicability, FormLayout, SecondaryField};
pub use bands::{Band, BandCollection, OverlapPolicy, PeriodBand, PeriodBands, ValueBand, ValueBands};
pub use config::FeeEngineConfig;
pub use error::FeeError;
pub use fee_definition::{FeeDefinition, FeeDefinitionInput, FeeStatus};
pub use resolution::{calculate_fee_charge, resolve_fee, FeeCharge, LoanContext, ResolvedFee};
pub use types::*;

/// Standard result type for all loan fee operations
pub type FeeResult<T> = Result<T, FeeError>;
