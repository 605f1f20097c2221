use clap::Args;
use serde_json::{json, Value};

use loan_fees_core::applicability::form_layout;
use loan_fees_core::fee_definition::{
    validation_report, ApplicationRule, CalculationMethod, CollectionRule, FeeDefinitionInput,
};
use loan_fees_core::{Currency, FeeEngineConfig};

use crate::input;

/// Arguments for validating a fee definition draft
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to a fee definition draft (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for deriving field applicability
#[derive(Args)]
pub struct ApplicabilityArgs {
    /// Path to a draft the selections are applied to. Inapplicable fields
    /// are cleared and reported.
    #[arg(long)]
    pub input: Option<String>,

    /// Rate, FixedAmount or FixedAmountPerInstallment
    #[arg(long)]
    pub calculation_method: Option<CalculationMethod>,

    /// FixedValue, GraduatedByValue or GraduatedByPeriod
    #[arg(long)]
    pub application_rule: Option<ApplicationRule>,

    /// Upfront, Capitalized, Deducted, PaidWithLoan or SecurityDeposit
    #[arg(long)]
    pub collection_rule: Option<CollectionRule>,

    /// Currency code used in the band fee column label
    #[arg(long)]
    pub currency: Option<String>,
}

pub fn run_validate(
    args: ValidateArgs,
    config: &FeeEngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let draft: FeeDefinitionInput = input::read_input(args.input.as_deref(), "A fee definition draft")?;
    let report = validation_report(&draft, config);
    Ok(serde_json::to_value(report)?)
}

pub fn run_applicability(
    args: ApplicabilityArgs,
    config: &FeeEngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let currency = args
        .currency
        .map(Currency::from)
        .unwrap_or_else(|| config.default_currency.clone());

    // Without a draft the selections alone determine the layout
    let Some(path) = args.input.as_deref() else {
        let method = args
            .calculation_method
            .ok_or("--calculation-method is required (or provide --input)")?;
        let rule = args
            .application_rule
            .ok_or("--application-rule is required (or provide --input)")?;
        let layout = form_layout(method, rule, args.collection_rule, &currency);
        return Ok(serde_json::to_value(layout)?);
    };

    let mut draft: FeeDefinitionInput = input::file::read_document(path)?;
    let mut cleared = Vec::new();
    if let Some(method) = args.calculation_method {
        cleared.extend(draft.set_calculation_method(method));
    }
    if let Some(rule) = args.application_rule {
        cleared.extend(draft.set_application_rule(rule));
    }
    if args.collection_rule.is_some() {
        cleared.extend(draft.set_collection_rule(args.collection_rule));
    }

    let layout = match (draft.calculation_method, draft.application_rule) {
        (Some(method), Some(rule)) => Some(form_layout(
            method,
            rule,
            draft.collection_rule,
            &currency,
        )),
        _ => None,
    };

    Ok(json!({
        "draft": draft,
        "clearedFields": cleared,
        "layout": layout,
    }))
}
