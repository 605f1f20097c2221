//! Property-based invariant tests for band schedules and fee resolution.
//!
//! 1. Every band accepted into a collection has `max > min`.
//! 2. Under `Reject`, accepted collections never contain overlapping bands.
//! 3. A subject equal to a band's min resolves into that band; equal to its
//!    max it resolves into the next band or fails.
//! 4. Under `FirstMatch`, the earliest containing band wins.
//! 5. A validated fixed-value definition never carries bands.
//! 6. Resolution is deterministic.

use loan_fees_core::bands::{Band, OverlapPolicy, ValueBand, ValueBands};
use loan_fees_core::fee_definition::{
    ApplicationRule, CalculationMethod, CollectionRule, FeeDefinition, FeeDefinitionInput,
    LedgerAccountRef,
};
use loan_fees_core::resolution::resolve_fee;
use loan_fees_core::{FeeEngineConfig, FeeError};
use proptest::prelude::*;
use rust_decimal::Decimal;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Raw band rows, including inverted and empty ranges.
fn raw_bands(max_len: usize) -> impl Strategy<Value = Vec<(i64, i64, i64)>> {
    proptest::collection::vec((0i64..10_000, -50i64..500, 0i64..1_000), 0..=max_len)
}

/// Contiguous schedule starting at zero: widths of each consecutive band.
fn contiguous_widths(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(1i64..5_000, 1..=max_len)
}

fn band(min: i64, width: i64, fee: i64) -> ValueBand {
    ValueBand::new(Decimal::from(min), Decimal::from(min + width), Decimal::from(fee))
}

fn contiguous(widths: &[i64]) -> ValueBands {
    let mut start = 0i64;
    let mut bands = Vec::with_capacity(widths.len());
    for (i, w) in widths.iter().enumerate() {
        bands.push(band(start, *w, i as i64));
        start += w;
    }
    ValueBands::from_bands(bands, OverlapPolicy::Reject).expect("contiguous schedule is valid")
}

fn graduated(bands: ValueBands) -> FeeDefinition {
    let input = FeeDefinitionInput {
        name: "Graduated Fee".into(),
        calculation_method: Some(CalculationMethod::FixedAmount),
        application_rule: Some(ApplicationRule::GraduatedByValue),
        collection_rule: Some(CollectionRule::Upfront),
        receivable_account: Some(LedgerAccountRef::new("1200")),
        income_account: Some(LedgerAccountRef::new("4100")),
        value_bands: bands,
        ..Default::default()
    };
    FeeDefinition::from_input(&input, &FeeEngineConfig::legacy()).expect("valid definition")
}

// ═════════════════════════════════════════════════════════════════════════
// 1–2. Accepted collections are well-formed
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn accepted_bands_have_positive_width(rows in raw_bands(20)) {
        let mut bands = ValueBands::new();
        for (min, width, fee) in rows {
            match bands.add_band(band(min, width, fee), OverlapPolicy::FirstMatch) {
                Ok(next) => bands = next,
                Err(e) => prop_assert!(width <= 0, "unexpected rejection {:?}", e),
            }
        }
        for b in bands.iter() {
            prop_assert!(b.max() > b.min());
        }
    }

    #[test]
    fn reject_policy_never_admits_overlap(rows in raw_bands(20)) {
        let mut bands = ValueBands::new();
        for (min, width, fee) in rows {
            if let Ok(next) = bands.add_band(band(min, width, fee), OverlapPolicy::Reject) {
                bands = next;
            }
        }
        prop_assert!(bands.overlaps().is_empty());
        prop_assert!(bands.violations(OverlapPolicy::Reject, false).is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Boundary behaviour on contiguous schedules
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn band_min_is_inclusive_and_max_exclusive(widths in contiguous_widths(10)) {
        let bands = contiguous(&widths);
        let fee = graduated(bands.clone());
        let last = bands.len() - 1;

        for (i, b) in bands.iter().enumerate() {
            let at_min = resolve_fee(&fee, Some(b.min())).unwrap();
            prop_assert_eq!(at_min.value, b.fee());

            match resolve_fee(&fee, Some(b.max())) {
                Ok(at_max) => {
                    prop_assert!(i < last);
                    prop_assert_eq!(at_max.value, bands.bands()[i + 1].fee());
                }
                Err(FeeError::NoApplicableBand { subject }) => {
                    prop_assert_eq!(i, last);
                    prop_assert_eq!(subject, b.max());
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. First match wins under FirstMatch
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn first_containing_band_wins(rows in raw_bands(15), subject in 0i64..11_000) {
        let mut bands = ValueBands::new();
        for (min, width, fee) in rows {
            if let Ok(next) = bands.add_band(band(min, width, fee), OverlapPolicy::FirstMatch) {
                bands = next;
            }
        }
        let subject = Decimal::from(subject);
        let expected = bands.iter().position(|b| b.min() <= subject && subject < b.max());
        prop_assert_eq!(bands.find_match(subject).map(|(i, _)| i), expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Fixed-value definitions carry no bands
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn fixed_value_definition_has_no_bands(rows in raw_bands(5), amount in 0i64..1_000) {
        let bands = rows.into_iter().fold(ValueBands::new(), |acc, (min, width, fee)| {
            acc.add_band(band(min, width, fee), OverlapPolicy::FirstMatch)
                .unwrap_or(acc)
        });

        let input = FeeDefinitionInput {
            name: "Flat Fee".into(),
            calculation_method: Some(CalculationMethod::FixedAmount),
            application_rule: Some(ApplicationRule::FixedValue),
            collection_rule: Some(CollectionRule::Upfront),
            receivable_account: Some(LedgerAccountRef::new("1200")),
            income_account: Some(LedgerAccountRef::new("4100")),
            amount: Some(Decimal::from(amount)),
            value_bands: bands,
            ..Default::default()
        };

        if let Ok(def) = FeeDefinition::from_input(&input, &FeeEngineConfig::default()) {
            prop_assert!(def.value_bands.is_empty());
            prop_assert!(def.period_bands.is_empty());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn resolution_is_deterministic(widths in contiguous_widths(8), subject in 0i64..50_000) {
        let fee = graduated(contiguous(&widths));
        let subject = Decimal::from(subject);
        prop_assert_eq!(resolve_fee(&fee, Some(subject)), resolve_fee(&fee, Some(subject)));
    }
}
