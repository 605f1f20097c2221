//! Which secondary fee fields apply, derived from the primary selections.
//!
//! There is no stored state here: every answer is recomputed from the
//! calculation method, application rule and collection rule currently
//! selected, so toggling back and forth between options can never leave
//! stale visibility behind.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::fee_definition::{
    ApplicationRule, CalculationMethod, CollectionRule, FeeDefinitionInput,
};
use crate::types::Currency;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fields whose presence depends on the primary selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecondaryField {
    CollectionRule,
    AllocationMethod,
    CalculationBasis,
    Amount,
    InstallmentAmount,
    ValueBands,
    PeriodBands,
}

impl SecondaryField {
    pub const ALL: [SecondaryField; 7] = [
        SecondaryField::CollectionRule,
        SecondaryField::AllocationMethod,
        SecondaryField::CalculationBasis,
        SecondaryField::Amount,
        SecondaryField::InstallmentAmount,
        SecondaryField::ValueBands,
        SecondaryField::PeriodBands,
    ];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecondaryField::CollectionRule => "collectionRule",
            SecondaryField::AllocationMethod => "allocationMethod",
            SecondaryField::CalculationBasis => "calculationBasis",
            SecondaryField::Amount => "amount",
            SecondaryField::InstallmentAmount => "installmentAmount",
            SecondaryField::ValueBands => "valueBands",
            SecondaryField::PeriodBands => "periodBands",
        }
    }
}

impl fmt::Display for SecondaryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of every secondary field for one combination of selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicability {
    pub collection_rule: bool,
    pub allocation_method: bool,
    pub calculation_basis: bool,
    pub amount: bool,
    pub installment_amount: bool,
    pub value_bands: bool,
    pub period_bands: bool,
}

/// Applicability plus the band fee-column label, as a form would render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormLayout {
    pub fields: Applicability,
    pub visible_fields: Vec<SecondaryField>,
    pub fee_column_label: String,
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// The dependency graph. `None` means the answer depends on a selection
/// that has not been made yet.
pub(crate) fn is_applicable(
    field: SecondaryField,
    method: Option<CalculationMethod>,
    rule: Option<ApplicationRule>,
    collection: Option<CollectionRule>,
) -> Option<bool> {
    use CalculationMethod::*;

    match field {
        SecondaryField::CollectionRule => method.map(|m| m != FixedAmountPerInstallment),
        SecondaryField::AllocationMethod => match method? {
            FixedAmountPerInstallment => Some(false),
            _ => Some(collection == Some(CollectionRule::PaidWithLoan)),
        },
        SecondaryField::CalculationBasis => method.map(|m| m == Rate),
        SecondaryField::Amount => match method? {
            FixedAmountPerInstallment => Some(false),
            _ => rule.map(|r| r == ApplicationRule::FixedValue),
        },
        SecondaryField::InstallmentAmount => match method? {
            FixedAmountPerInstallment => rule.map(|r| r == ApplicationRule::FixedValue),
            _ => Some(false),
        },
        SecondaryField::ValueBands => rule.map(|r| r == ApplicationRule::GraduatedByValue),
        SecondaryField::PeriodBands => rule.map(|r| r == ApplicationRule::GraduatedByPeriod),
    }
}

impl Applicability {
    pub fn derive(
        method: CalculationMethod,
        rule: ApplicationRule,
        collection: Option<CollectionRule>,
    ) -> Self {
        let check = |field| is_applicable(field, Some(method), Some(rule), collection) == Some(true);
        Applicability {
            collection_rule: check(SecondaryField::CollectionRule),
            allocation_method: check(SecondaryField::AllocationMethod),
            calculation_basis: check(SecondaryField::CalculationBasis),
            amount: check(SecondaryField::Amount),
            installment_amount: check(SecondaryField::InstallmentAmount),
            value_bands: check(SecondaryField::ValueBands),
            period_bands: check(SecondaryField::PeriodBands),
        }
    }

    /// `None` until both the calculation method and application rule are chosen.
    pub fn for_input(input: &FeeDefinitionInput) -> Option<Self> {
        Some(Self::derive(
            input.calculation_method?,
            input.application_rule?,
            input.collection_rule,
        ))
    }

    pub fn is(&self, field: SecondaryField) -> bool {
        match field {
            SecondaryField::CollectionRule => self.collection_rule,
            SecondaryField::AllocationMethod => self.allocation_method,
            SecondaryField::CalculationBasis => self.calculation_basis,
            SecondaryField::Amount => self.amount,
            SecondaryField::InstallmentAmount => self.installment_amount,
            SecondaryField::ValueBands => self.value_bands,
            SecondaryField::PeriodBands => self.period_bands,
        }
    }

    pub fn visible_fields(&self) -> Vec<SecondaryField> {
        SecondaryField::ALL
            .into_iter()
            .filter(|f| self.is(*f))
            .collect()
    }
}

/// Header of the band fee column.
pub fn fee_column_label(method: CalculationMethod, currency: &Currency) -> String {
    match method {
        CalculationMethod::Rate => "RATE (%)".to_string(),
        _ => format!("AMOUNT ({})", currency.code()),
    }
}

pub fn form_layout(
    method: CalculationMethod,
    rule: ApplicationRule,
    collection: Option<CollectionRule>,
    currency: &Currency,
) -> FormLayout {
    let fields = Applicability::derive(method, rule, collection);
    FormLayout {
        visible_fields: fields.visible_fields(),
        fields,
        fee_column_label: fee_column_label(method, currency),
    }
}

// ---------------------------------------------------------------------------
// Transitions on a draft
// ---------------------------------------------------------------------------

impl FeeDefinitionInput {
    /// Select a calculation method and clear whatever it made inapplicable.
    /// Returns the cleared fields.
    pub fn set_calculation_method(&mut self, method: CalculationMethod) -> Vec<SecondaryField> {
        self.calculation_method = Some(method);
        self.clear_inapplicable()
    }

    pub fn set_application_rule(&mut self, rule: ApplicationRule) -> Vec<SecondaryField> {
        self.application_rule = Some(rule);
        self.clear_inapplicable()
    }

    pub fn set_collection_rule(&mut self, collection: Option<CollectionRule>) -> Vec<SecondaryField> {
        self.collection_rule = collection;
        self.clear_inapplicable()
    }

    /// Populated secondary fields, in declaration order.
    pub fn populated_fields(&self) -> Vec<SecondaryField> {
        SecondaryField::ALL
            .into_iter()
            .filter(|f| self.is_populated(*f))
            .collect()
    }

    pub fn is_populated(&self, field: SecondaryField) -> bool {
        match field {
            SecondaryField::CollectionRule => self.collection_rule.is_some(),
            SecondaryField::AllocationMethod => self.allocation_method.is_some(),
            SecondaryField::CalculationBasis => self.calculation_basis.is_some(),
            SecondaryField::Amount => self.amount.is_some(),
            SecondaryField::InstallmentAmount => self.installment_amount.is_some(),
            SecondaryField::ValueBands => !self.value_bands.is_empty(),
            SecondaryField::PeriodBands => !self.period_bands.is_empty(),
        }
    }

    /// Clear every populated field the current selections rule out.
    ///
    /// Fields whose applicability is still undetermined are left alone.
    /// Clearing the collection rule can in turn rule out the allocation
    /// method, so the pass repeats until nothing changes.
    pub fn clear_inapplicable(&mut self) -> Vec<SecondaryField> {
        let mut cleared = Vec::new();
        loop {
            let next = SecondaryField::ALL.into_iter().find(|f| {
                self.is_populated(*f)
                    && is_applicable(
                        *f,
                        self.calculation_method,
                        self.application_rule,
                        self.collection_rule,
                    ) == Some(false)
            });
            let Some(field) = next else { break };
            self.clear(field);
            cleared.push(field);
        }
        if !cleared.is_empty() {
            debug!(?cleared, "cleared inapplicable fee fields");
        }
        cleared
    }

    fn clear(&mut self, field: SecondaryField) {
        match field {
            SecondaryField::CollectionRule => self.collection_rule = None,
            SecondaryField::AllocationMethod => self.allocation_method = None,
            SecondaryField::CalculationBasis => self.calculation_basis = None,
            SecondaryField::Amount => self.amount = None,
            SecondaryField::InstallmentAmount => self.installment_amount = None,
            SecondaryField::ValueBands => self.value_bands = Default::default(),
            SecondaryField::PeriodBands => self.period_bands = Default::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::{BandCollection, OverlapPolicy, ValueBand};
    use crate::fee_definition::{AllocationMethod, CalculationBasis};
    use rust_decimal_macros::dec;

    #[test]
    fn test_rate_fixed_value_fields() {
        let a = Applicability::derive(
            CalculationMethod::Rate,
            ApplicationRule::FixedValue,
            Some(CollectionRule::Upfront),
        );
        assert!(a.collection_rule);
        assert!(!a.allocation_method);
        assert!(a.calculation_basis);
        assert!(a.amount);
        assert!(!a.installment_amount);
        assert!(!a.value_bands);
        assert!(!a.period_bands);
    }

    #[test]
    fn test_paid_with_loan_shows_allocation_method() {
        let a = Applicability::derive(
            CalculationMethod::FixedAmount,
            ApplicationRule::GraduatedByValue,
            Some(CollectionRule::PaidWithLoan),
        );
        assert!(a.allocation_method);
        assert!(!a.calculation_basis);
        assert!(!a.amount);
        assert!(a.value_bands);
    }

    #[test]
    fn test_per_installment_hides_collection_and_amount() {
        let a = Applicability::derive(
            CalculationMethod::FixedAmountPerInstallment,
            ApplicationRule::FixedValue,
            Some(CollectionRule::PaidWithLoan),
        );
        assert!(!a.collection_rule);
        assert!(!a.allocation_method);
        assert!(!a.amount);
        assert!(a.installment_amount);
        assert_eq!(a.visible_fields(), vec![SecondaryField::InstallmentAmount]);
    }

    #[test]
    fn test_fee_column_label() {
        assert_eq!(fee_column_label(CalculationMethod::Rate, &Currency::EUR), "RATE (%)");
        assert_eq!(
            fee_column_label(CalculationMethod::FixedAmount, &Currency::EUR),
            "AMOUNT (EUR)"
        );
        assert_eq!(
            fee_column_label(CalculationMethod::FixedAmountPerInstallment, &Currency::JPY),
            "AMOUNT (JPY)"
        );
    }

    #[test]
    fn test_switching_rate_to_fixed_amount_clears_basis() {
        let mut draft = FeeDefinitionInput::default();
        draft.set_calculation_method(CalculationMethod::Rate);
        draft.calculation_basis = Some(CalculationBasis::Principal);

        let cleared = draft.set_calculation_method(CalculationMethod::FixedAmount);
        assert_eq!(cleared, vec![SecondaryField::CalculationBasis]);
        assert_eq!(draft.calculation_basis, None);
    }

    #[test]
    fn test_switching_to_per_installment_cascades_to_allocation() {
        let mut draft = FeeDefinitionInput {
            calculation_method: Some(CalculationMethod::FixedAmount),
            application_rule: Some(ApplicationRule::FixedValue),
            collection_rule: Some(CollectionRule::PaidWithLoan),
            allocation_method: Some(AllocationMethod::EqualInstallments),
            amount: Some(dec!(25)),
            ..Default::default()
        };

        let cleared = draft.set_calculation_method(CalculationMethod::FixedAmountPerInstallment);
        assert_eq!(
            cleared,
            vec![
                SecondaryField::CollectionRule,
                SecondaryField::AllocationMethod,
                SecondaryField::Amount
            ]
        );
        assert!(draft.populated_fields().is_empty());
    }

    #[test]
    fn test_switching_rule_clears_bands() {
        let bands = BandCollection::new()
            .add_band(ValueBand::new(dec!(0), dec!(100), dec!(1)), OverlapPolicy::Reject)
            .unwrap();
        let mut draft = FeeDefinitionInput {
            calculation_method: Some(CalculationMethod::FixedAmount),
            application_rule: Some(ApplicationRule::GraduatedByValue),
            value_bands: bands,
            ..Default::default()
        };

        let cleared = draft.set_application_rule(ApplicationRule::GraduatedByPeriod);
        assert_eq!(cleared, vec![SecondaryField::ValueBands]);
        assert!(draft.value_bands.is_empty());
    }

    #[test]
    fn test_undetermined_fields_are_kept() {
        // No application rule yet: amount cannot be judged, so it stays
        let mut draft = FeeDefinitionInput {
            amount: Some(dec!(10)),
            ..Default::default()
        };
        let cleared = draft.set_calculation_method(CalculationMethod::Rate);
        assert!(cleared.is_empty());
        assert_eq!(draft.amount, Some(dec!(10)));
    }

    #[test]
    fn test_toggling_back_restores_visibility_without_memory() {
        let mut draft = FeeDefinitionInput::default();
        draft.set_application_rule(ApplicationRule::FixedValue);
        draft.set_calculation_method(CalculationMethod::FixedAmountPerInstallment);
        draft.set_calculation_method(CalculationMethod::Rate);

        let a = Applicability::for_input(&draft).unwrap();
        assert!(a.amount);
        assert!(a.calculation_basis);
        assert!(a.collection_rule);
    }
}
