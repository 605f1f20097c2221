use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::applicability::{is_applicable, Applicability, SecondaryField};
use crate::bands::{Band, BandCollection, OverlapPolicy, PeriodBands, ValueBands};
use crate::config::FeeEngineConfig;
use crate::error::FeeError;
use crate::types::Money;
use crate::FeeResult;

pub const NAME_MAX_CHARS: usize = 255;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Declares a wire enum whose variant names are also its serialized
/// strings and UI display keys.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = FeeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    other => Err(FeeError::InvalidInput {
                        field: stringify!($name).into(),
                        reason: format!(
                            "'{}' is not one of: {}",
                            other,
                            $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                        ),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// How the fee value is interpreted.
    CalculationMethod {
        /// Percentage of the calculation basis
        Rate,
        FixedAmount,
        FixedAmountPerInstallment,
    }
}

wire_enum! {
    /// Whether the fee is a single value or looked up from a band schedule.
    ApplicationRule {
        FixedValue,
        GraduatedByValue,
        GraduatedByPeriod,
    }
}

wire_enum! {
    /// When the fee is taken from the loan.
    CollectionRule {
        /// Paid by the borrower before disbursement
        Upfront,
        /// Added to the loan balance
        Capitalized,
        /// Withheld from the disbursed amount
        Deducted,
        /// Spread over the repayment installments
        PaidWithLoan,
        /// Held as a refundable deposit
        SecurityDeposit,
    }
}

wire_enum! {
    /// How a fee paid with the loan is spread over installments.
    AllocationMethod {
        EqualInstallments,
        FirstInstallment,
        LastInstallment,
    }
}

wire_enum! {
    /// Monetary base a percentage fee applies to.
    CalculationBasis {
        Principal,
        OutstandingPrincipal,
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Opaque reference into the ledger account directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerAccountRef(String);

impl LedgerAccountRef {
    pub fn new(code: impl Into<String>) -> Self {
        LedgerAccountRef(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for LedgerAccountRef {
    fn from(code: &str) -> Self {
        LedgerAccountRef::new(code)
    }
}

impl fmt::Display for LedgerAccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status. Archived definitions keep their identity and stay
/// resolvable for loans that already reference them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeStatus {
    #[default]
    Active,
    Archived,
}

/// `FeeStatus` travels on the wire as the `isArchived` boolean.
mod archived_flag {
    use super::FeeStatus;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &FeeStatus, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(*status == FeeStatus::Archived)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<FeeStatus, D::Error> {
        Ok(if bool::deserialize(d)? {
            FeeStatus::Archived
        } else {
            FeeStatus::Active
        })
    }
}

/// A validated fee definition as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeDefinition {
    pub id: Uuid,
    pub name: String,
    pub calculation_method: CalculationMethod,
    pub application_rule: ApplicationRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_rule: Option<CollectionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_method: Option<AllocationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_basis: Option<CalculationBasis>,
    pub receivable_account: LedgerAccountRef,
    pub income_account: LedgerAccountRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Flat amount charged on each installment (per-installment fixed fees)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_amount: Option<Money>,
    #[serde(default)]
    pub value_bands: ValueBands,
    #[serde(default)]
    pub period_bands: PeriodBands,
    #[serde(rename = "isArchived", with = "archived_flag", default)]
    pub status: FeeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token, maintained by the repository
    #[serde(default)]
    pub version: u64,
}

/// Form state of a fee definition being created or edited. Every selection
/// may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeDefinitionInput {
    #[serde(default)]
    pub name: String,
    pub calculation_method: Option<CalculationMethod>,
    pub application_rule: Option<ApplicationRule>,
    pub collection_rule: Option<CollectionRule>,
    pub allocation_method: Option<AllocationMethod>,
    pub calculation_basis: Option<CalculationBasis>,
    pub receivable_account: Option<LedgerAccountRef>,
    pub income_account: Option<LedgerAccountRef>,
    pub amount: Option<Decimal>,
    pub installment_amount: Option<Money>,
    #[serde(default)]
    pub value_bands: ValueBands,
    #[serde(default)]
    pub period_bands: PeriodBands,
    /// Version the editing session started from
    pub version: Option<u64>,
}

/// Outcome of checking a draft without saving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicability: Option<Applicability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

impl FeeDefinition {
    /// Validate a draft and turn it into a new definition with a fresh id.
    pub fn from_input(input: &FeeDefinitionInput, config: &FeeEngineConfig) -> FeeResult<Self> {
        validate_definition(input, config)?;
        Ok(Self::build(Uuid::new_v4(), input))
    }

    /// Validate a draft against this definition, keeping identity, status
    /// and persistence metadata.
    pub fn with_update(&self, input: &FeeDefinitionInput, config: &FeeEngineConfig) -> FeeResult<Self> {
        validate_definition(input, config)?;
        let mut next = Self::build(self.id, input);
        next.status = self.status;
        next.created_at = self.created_at;
        next.updated_at = self.updated_at;
        next.version = self.version;
        Ok(next)
    }

    /// Draft for an editing session that starts from this definition.
    pub fn to_input(&self) -> FeeDefinitionInput {
        FeeDefinitionInput {
            name: self.name.clone(),
            calculation_method: Some(self.calculation_method),
            application_rule: Some(self.application_rule),
            collection_rule: self.collection_rule,
            allocation_method: self.allocation_method,
            calculation_basis: self.calculation_basis,
            receivable_account: Some(self.receivable_account.clone()),
            income_account: Some(self.income_account.clone()),
            amount: self.amount,
            installment_amount: self.installment_amount,
            value_bands: self.value_bands.clone(),
            period_bands: self.period_bands.clone(),
            version: Some(self.version),
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == FeeStatus::Archived
    }

    pub fn applicability(&self) -> Applicability {
        Applicability::derive(
            self.calculation_method,
            self.application_rule,
            self.collection_rule,
        )
    }

    // Only called on validated input, so the required selections are present.
    fn build(id: Uuid, input: &FeeDefinitionInput) -> Self {
        FeeDefinition {
            id,
            name: input.name.trim().to_string(),
            calculation_method: input.calculation_method.unwrap_or(CalculationMethod::Rate),
            application_rule: input.application_rule.unwrap_or(ApplicationRule::FixedValue),
            collection_rule: input.collection_rule,
            allocation_method: input.allocation_method,
            calculation_basis: input.calculation_basis,
            receivable_account: input.receivable_account.clone().unwrap_or_else(|| LedgerAccountRef::new("")),
            income_account: input.income_account.clone().unwrap_or_else(|| LedgerAccountRef::new("")),
            amount: input.amount,
            installment_amount: input.installment_amount,
            value_bands: input.value_bands.clone(),
            period_bands: input.period_bands.clone(),
            status: FeeStatus::Active,
            created_at: None,
            updated_at: None,
            version: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a draft and fail with the first violation.
///
/// Violations are ordered: missing fields, inapplicable fields, range and
/// length limits, band invariants. A draft that both leaves a required field empty
/// and fills an inapplicable one therefore reports the missing field.
pub fn validate_definition(input: &FeeDefinitionInput, config: &FeeEngineConfig) -> FeeResult<()> {
    match collect_violations(input, config).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Every violation in a draft, for inline display next to each field.
pub fn collect_violations(input: &FeeDefinitionInput, config: &FeeEngineConfig) -> Vec<FeeError> {
    let mut missing = Vec::new();
    let mut not_applicable = Vec::new();
    let mut out_of_range = Vec::new();
    let mut band_errors = Vec::new();

    // -- Name --
    let name = input.name.trim();
    if name.is_empty() {
        missing.push(FeeError::missing("name"));
    } else if name.chars().count() > NAME_MAX_CHARS {
        out_of_range.push(FeeError::InvalidInput {
            field: "name".into(),
            reason: format!("Name must be at most {NAME_MAX_CHARS} characters"),
        });
    }

    // -- Primary selections --
    if input.calculation_method.is_none() {
        missing.push(FeeError::missing("calculationMethod"));
    }
    if input.application_rule.is_none() {
        missing.push(FeeError::missing("applicationRule"));
    }

    // -- Secondary fields, only where applicability is known --
    for field in SecondaryField::ALL {
        let applicable = is_applicable(
            field,
            input.calculation_method,
            input.application_rule,
            input.collection_rule,
        );
        let populated = input.is_populated(field);
        match applicable {
            Some(true) if !populated && is_required(field) => {
                missing.push(FeeError::missing(field.as_str()));
            }
            Some(false) if populated => {
                not_applicable.push(FeeError::not_applicable(
                    field.as_str(),
                    not_applicable_reason(field),
                ));
            }
            _ => {}
        }
    }

    // -- Ledger accounts --
    for (field, account) in [
        ("receivableAccount", &input.receivable_account),
        ("incomeAccount", &input.income_account),
    ] {
        if account.as_ref().map_or(true, LedgerAccountRef::is_blank) {
            missing.push(FeeError::missing(field));
        }
    }

    // -- Numeric ranges --
    for (field, value) in [
        ("amount", input.amount),
        ("installmentAmount", input.installment_amount),
    ] {
        if let Some(v) = value {
            if v < Decimal::ZERO {
                out_of_range.push(FeeError::NumericOutOfRange {
                    field: field.into(),
                    value: v,
                    reason: "Fee value must be non-negative".into(),
                });
            }
        }
    }

    // -- Band invariants of the selected collection --
    match input.application_rule {
        Some(ApplicationRule::GraduatedByValue) => band_errors.extend(
            input
                .value_bands
                .violations(config.overlap_policy, config.require_full_coverage),
        ),
        Some(ApplicationRule::GraduatedByPeriod) => band_errors.extend(
            input
                .period_bands
                .violations(config.overlap_policy, config.require_full_coverage),
        ),
        _ => {}
    }

    missing
        .into_iter()
        .chain(not_applicable)
        .chain(out_of_range)
        .chain(band_errors)
        .collect()
}

/// Non-blocking observations about a draft.
pub fn collect_warnings(input: &FeeDefinitionInput, config: &FeeEngineConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    match input.application_rule {
        Some(ApplicationRule::GraduatedByValue) => {
            band_warnings(&input.value_bands, "valueBands", config, &mut warnings)
        }
        Some(ApplicationRule::GraduatedByPeriod) => {
            band_warnings(&input.period_bands, "periodBands", config, &mut warnings)
        }
        _ => {}
    }
    warnings
}

pub fn validation_report(input: &FeeDefinitionInput, config: &FeeEngineConfig) -> ValidationReport {
    let errors: Vec<FieldIssue> = collect_violations(input, config)
        .into_iter()
        .map(|e| FieldIssue {
            field: e.field().map(str::to_string),
            message: e.to_string(),
        })
        .collect();

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings: collect_warnings(input, config),
        applicability: Applicability::for_input(input),
    }
}

fn band_warnings<B: Band>(
    bands: &BandCollection<B>,
    field: &str,
    config: &FeeEngineConfig,
    warnings: &mut Vec<String>,
) {
    if bands.is_empty() {
        warnings.push(format!(
            "{field} is empty: every resolution against this fee will fail with no applicable band"
        ));
        return;
    }
    if config.overlap_policy == OverlapPolicy::FirstMatch {
        for (i, j) in bands.overlaps() {
            warnings.push(format!(
                "{field}: bands {i} and {j} overlap; band {i} wins where both match"
            ));
        }
    }
    if !config.require_full_coverage {
        for (from, to) in bands.coverage_gaps() {
            warnings.push(format!("{field}: no band covers [{from}, {to})"));
        }
    }
}

fn is_required(field: SecondaryField) -> bool {
    // Band collections may legitimately be empty while a schedule is being built
    !matches!(field, SecondaryField::ValueBands | SecondaryField::PeriodBands)
}

fn not_applicable_reason(field: SecondaryField) -> &'static str {
    match field {
        SecondaryField::CollectionRule => "Per-installment fees have no collection rule",
        SecondaryField::AllocationMethod => "Allocation applies only to fees paid with the loan",
        SecondaryField::CalculationBasis => "Only rate fees have a calculation basis",
        SecondaryField::Amount => "A single amount applies only to fixed-value, non-installment fees",
        SecondaryField::InstallmentAmount => {
            "An installment amount applies only to fixed-value per-installment fees"
        }
        SecondaryField::ValueBands => "Value bands apply only to fees graduated by value",
        SecondaryField::PeriodBands => "Period bands apply only to fees graduated by period",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
