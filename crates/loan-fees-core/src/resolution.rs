use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::bands::Band;
use crate::config::FeeEngineConfig;
use crate::error::FeeError;
use crate::fee_definition::{
    AllocationMethod, ApplicationRule, CalculationBasis, CalculationMethod, CollectionRule,
    FeeDefinition,
};
use crate::types::*;
use crate::FeeResult;

/// Upper bound on a loan's installment count (100 years of monthly payments).
pub const MAX_INSTALLMENTS: u32 = 1200;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a resolved fee value came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeeSource {
    FixedValue,
    #[serde(rename_all = "camelCase")]
    ValueBand {
        index: usize,
        min_amount: Money,
        max_amount: Money,
    },
    #[serde(rename_all = "camelCase")]
    PeriodBand {
        index: usize,
        min_period: Months,
        max_period: Months,
    },
}

/// The fee value selected for a subject, before it is applied to a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFee {
    pub fee_id: Uuid,
    pub calculation_method: CalculationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation_basis: Option<CalculationBasis>,
    /// Percentage for `Rate`, flat amount otherwise (per installment for
    /// `FixedAmountPerInstallment`)
    pub value: Decimal,
    pub source: FeeSource,
}

/// Loan figures a fee is charged against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanContext {
    pub principal: Money,
    /// Defaults to `principal` when absent
    pub outstanding_principal: Option<Money>,
    pub term_months: Option<Months>,
    pub installments: Option<u32>,
    /// Loan product currency; the engine default applies when absent
    pub currency: Option<Currency>,
}

/// Definition plus loan, as read by the CLI and bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeChargeInput {
    pub definition: FeeDefinition,
    pub loan: LoanContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCharge {
    pub fee_id: Uuid,
    pub fee_name: String,
    pub resolved: ResolvedFee,
    pub currency: Currency,
    /// Amount a percentage fee was applied to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basis_amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_installment_amount: Option<Money>,
    /// Total fee, rounded to the currency's minor unit
    pub charge_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_rule: Option<CollectionRule>,
    /// Split of the charge over installments, for fees paid with the loan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installment_allocation: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Select the fee value that applies to `subject`.
///
/// `subject` is the loan amount for value-graduated fees and the term in
/// months for period-graduated fees; fixed-value fees ignore it. Bands are
/// scanned in collection order and the first band with
/// `min <= subject < max` wins, so a subject equal to a band's `max` falls
/// through to the next band (or to `NoApplicableBand`). Where bands overlap,
/// the earlier band takes precedence.
///
/// Archived definitions resolve like active ones.
pub fn resolve_fee(definition: &FeeDefinition, subject: Option<Decimal>) -> FeeResult<ResolvedFee> {
    if let Some(s) = subject {
        validate_subject(s)?;
    }

    let (value, source) = match definition.application_rule {
        ApplicationRule::FixedValue => (fixed_value(definition)?, FeeSource::FixedValue),
        ApplicationRule::GraduatedByValue => {
            let s = subject.ok_or_else(|| {
                FeeError::SubjectValueInvalid(
                    "A loan amount is required for fees graduated by value".into(),
                )
            })?;
            let (index, band) = definition
                .value_bands
                .find_match(s)
                .ok_or(FeeError::NoApplicableBand { subject: s })?;
            (
                band.fee(),
                FeeSource::ValueBand {
                    index,
                    min_amount: band.min_amount,
                    max_amount: band.max_amount,
                },
            )
        }
        ApplicationRule::GraduatedByPeriod => {
            let s = subject.ok_or_else(|| {
                FeeError::SubjectValueInvalid(
                    "A loan term in months is required for fees graduated by period".into(),
                )
            })?;
            let (index, band) = definition
                .period_bands
                .find_match(s)
                .ok_or(FeeError::NoApplicableBand { subject: s })?;
            (
                band.fee(),
                FeeSource::PeriodBand {
                    index,
                    min_period: band.min_period,
                    max_period: band.max_period,
                },
            )
        }
    };

    debug!(fee_id = %definition.id, %value, ?source, "fee resolved");
    Ok(ResolvedFee {
        fee_id: definition.id,
        calculation_method: definition.calculation_method,
        calculation_basis: definition.calculation_basis,
        value,
        source,
    })
}

/// Convert a float subject, rejecting NaN, infinities and values outside
/// the decimal range.
pub fn subject_from_f64(value: f64) -> FeeResult<Decimal> {
    if !value.is_finite() {
        return Err(FeeError::SubjectValueInvalid(format!(
            "Subject value must be finite, got {value}"
        )));
    }
    let subject = Decimal::from_f64(value).ok_or_else(|| {
        FeeError::SubjectValueInvalid(format!("Subject value {value} is out of range"))
    })?;
    validate_subject(subject)?;
    Ok(subject)
}

// ---------------------------------------------------------------------------
// Charge calculation
// ---------------------------------------------------------------------------

/// Resolve a fee for a concrete loan and turn it into a currency amount.
///
/// The subject is taken from the loan: principal for value-graduated fees,
/// term for period-graduated ones. Rate fees apply their percentage to the
/// calculation basis; per-installment fees multiply by the installment
/// count. The total is rounded to the currency's minor unit.
pub fn calculate_fee_charge(
    definition: &FeeDefinition,
    loan: &LoanContext,
    config: &FeeEngineConfig,
) -> FeeResult<ComputationOutput<FeeCharge>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // ------------------------------------------------------------------
    // 1. Validate loan figures
    // ------------------------------------------------------------------
    validate_loan(loan)?;
    let currency = loan
        .currency
        .clone()
        .unwrap_or_else(|| config.default_currency.clone());

    // ------------------------------------------------------------------
    // 2. Resolve the fee value
    // ------------------------------------------------------------------
    let subject = match definition.application_rule {
        ApplicationRule::FixedValue => None,
        ApplicationRule::GraduatedByValue => Some(loan.principal),
        ApplicationRule::GraduatedByPeriod => Some(loan.term_months.ok_or_else(|| {
            FeeError::SubjectValueInvalid(
                "termMonths is required for fees graduated by period".into(),
            )
        })?),
    };
    let resolved = resolve_fee(definition, subject)?;

    if definition.is_archived() {
        warnings.push(format!(
            "Fee definition '{}' is archived; charged for an existing loan only",
            definition.name
        ));
    }

    // ------------------------------------------------------------------
    // 3. Apply to the loan
    // ------------------------------------------------------------------
    let mut basis_amount = None;
    let mut per_installment_amount = None;

    let raw_charge = match definition.calculation_method {
        CalculationMethod::Rate => {
            let basis = match definition.calculation_basis {
                Some(CalculationBasis::OutstandingPrincipal) => {
                    loan.outstanding_principal.unwrap_or_else(|| {
                        warnings.push(
                            "outstandingPrincipal not supplied; using principal as the basis"
                                .into(),
                        );
                        loan.principal
                    })
                }
                Some(CalculationBasis::Principal) => loan.principal,
                None => {
                    warnings.push("Rate fee has no calculation basis; using principal".into());
                    loan.principal
                }
            };
            basis_amount = Some(basis);
            basis
                .checked_mul(resolved.value)
                .map(|v| v / Decimal::ONE_HUNDRED)
                .ok_or_else(|| charge_overflow(basis))?
        }
        CalculationMethod::FixedAmount => resolved.value,
        CalculationMethod::FixedAmountPerInstallment => {
            let n = loan
                .installments
                .ok_or_else(|| FeeError::missing("installments"))?;
            let per = currency.round(resolved.value);
            per_installment_amount = Some(per);
            per.checked_mul(Decimal::from(n))
                .ok_or_else(|| charge_overflow(per))?
        }
    };
    let charge_amount = currency.round(raw_charge);

    // ------------------------------------------------------------------
    // 4. Spread fees paid with the loan
    // ------------------------------------------------------------------
    let collection_rule = match definition.calculation_method {
        CalculationMethod::FixedAmountPerInstallment => None,
        _ => definition.collection_rule,
    };
    let installment_allocation = if collection_rule == Some(CollectionRule::PaidWithLoan) {
        match (loan.installments, definition.allocation_method) {
            (Some(n), Some(method)) => allocate(charge_amount, n, method, &currency),
            (None, _) => {
                warnings.push(
                    "installments not supplied; fee paid with the loan is not allocated".into(),
                );
                Vec::new()
            }
            (Some(_), None) => {
                warnings.push("No allocation method configured; fee is not allocated".into());
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    // ------------------------------------------------------------------
    // 5. Assemble output
    // ------------------------------------------------------------------
    let output = FeeCharge {
        fee_id: definition.id,
        fee_name: definition.name.clone(),
        resolved,
        currency: currency.clone(),
        basis_amount,
        per_installment_amount,
        charge_amount,
        collection_rule,
        installment_allocation,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan fee charge: band resolution (first match, half-open ranges), currency minor-unit rounding",
        &serde_json::json!({
            "calculation_method": definition.calculation_method.as_str(),
            "application_rule": definition.application_rule.as_str(),
            "principal": loan.principal.to_string(),
            "term_months": loan.term_months.map(|t| t.to_string()),
            "installments": loan.installments,
            "currency": currency.code(),
            "minor_units": currency.minor_units(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_subject(subject: Decimal) -> FeeResult<()> {
    if subject < Decimal::ZERO {
        return Err(FeeError::SubjectValueInvalid(format!(
            "Subject value must be non-negative, got {subject}"
        )));
    }
    Ok(())
}

fn validate_loan(loan: &LoanContext) -> FeeResult<()> {
    if loan.principal < Decimal::ZERO {
        return Err(FeeError::SubjectValueInvalid(format!(
            "Principal must be non-negative, got {}",
            loan.principal
        )));
    }
    if let Some(outstanding) = loan.outstanding_principal {
        if outstanding < Decimal::ZERO {
            return Err(FeeError::InvalidInput {
                field: "outstandingPrincipal".into(),
                reason: "Outstanding principal must be non-negative".into(),
            });
        }
    }
    match loan.installments {
        Some(0) => {
            return Err(FeeError::InvalidInput {
                field: "installments".into(),
                reason: "A loan has at least one installment".into(),
            })
        }
        Some(n) if n > MAX_INSTALLMENTS => {
            return Err(FeeError::InvalidInput {
                field: "installments".into(),
                reason: format!("A loan has at most {MAX_INSTALLMENTS} installments, got {n}"),
            })
        }
        _ => {}
    }
    Ok(())
}

fn charge_overflow(value: Decimal) -> FeeError {
    FeeError::NumericOutOfRange {
        field: "chargeAmount".into(),
        value,
        reason: "Charge exceeds the representable decimal range".into(),
    }
}

fn fixed_value(definition: &FeeDefinition) -> FeeResult<Decimal> {
    match definition.calculation_method {
        CalculationMethod::FixedAmountPerInstallment => definition
            .installment_amount
            .ok_or_else(|| FeeError::missing("installmentAmount")),
        _ => definition.amount.ok_or_else(|| FeeError::missing("amount")),
    }
}

/// Split `total` over `n` installments. Equal splits truncate to the minor
/// unit and put the remainder on the last installment so the parts always
/// sum to the total.
fn allocate(total: Money, n: u32, method: AllocationMethod, currency: &Currency) -> Vec<Money> {
    let n = n as usize;
    let mut parts = vec![Decimal::ZERO; n];
    match method {
        AllocationMethod::FirstInstallment => parts[0] = total,
        AllocationMethod::LastInstallment => parts[n - 1] = total,
        AllocationMethod::EqualInstallments => {
            let share = (total / Decimal::from(n as u64))
                .round_dp_with_strategy(currency.minor_units(), RoundingStrategy::ToZero);
            for part in parts.iter_mut() {
                *part = share;
            }
            parts[n - 1] = total - share * Decimal::from((n - 1) as u64);
        }
    }
    parts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
