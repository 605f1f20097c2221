use napi::Result as NapiResult;
use napi_derive::napi;

use loan_fees_core::applicability::form_layout;
use loan_fees_core::fee_definition::{
    validation_report, ApplicationRule, CalculationMethod, CollectionRule, FeeDefinition,
    FeeDefinitionInput,
};
use loan_fees_core::resolution::{self, subject_from_f64, FeeChargeInput};
use loan_fees_core::{Currency, FeeEngineConfig};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_config(config_json: Option<String>) -> NapiResult<FeeEngineConfig> {
    match config_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error),
        None => Ok(FeeEngineConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Fee definitions
// ---------------------------------------------------------------------------

/// Every problem in a draft, as a `ValidationReport`.
#[napi]
pub fn validate_fee_definition(
    draft_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let draft: FeeDefinitionInput = serde_json::from_str(&draft_json).map_err(to_napi_error)?;
    let config = parse_config(config_json)?;
    serde_json::to_string(&validation_report(&draft, &config)).map_err(to_napi_error)
}

/// Field visibility and the band fee column label for a set of selections.
#[napi]
pub fn derive_applicability(
    calculation_method: String,
    application_rule: String,
    collection_rule: Option<String>,
    currency: Option<String>,
) -> NapiResult<String> {
    let method: CalculationMethod = calculation_method.parse().map_err(to_napi_error)?;
    let rule: ApplicationRule = application_rule.parse().map_err(to_napi_error)?;
    let collection: Option<CollectionRule> = collection_rule
        .map(|c| c.parse())
        .transpose()
        .map_err(to_napi_error)?;
    let currency = currency.map(Currency::from).unwrap_or_default();

    let layout = form_layout(method, rule, collection, &currency);
    serde_json::to_string(&layout).map_err(to_napi_error)
}

/// Apply new selections to a draft, clearing whatever they rule out.
/// Returns `{ draft, clearedFields }`.
#[napi]
pub fn apply_selections(
    draft_json: String,
    calculation_method: Option<String>,
    application_rule: Option<String>,
    collection_rule: Option<String>,
) -> NapiResult<String> {
    let mut draft: FeeDefinitionInput = serde_json::from_str(&draft_json).map_err(to_napi_error)?;
    let mut cleared = Vec::new();

    if let Some(method) = calculation_method {
        cleared.extend(draft.set_calculation_method(method.parse().map_err(to_napi_error)?));
    }
    if let Some(rule) = application_rule {
        cleared.extend(draft.set_application_rule(rule.parse().map_err(to_napi_error)?));
    }
    if let Some(collection) = collection_rule {
        cleared.extend(draft.set_collection_rule(Some(collection.parse().map_err(to_napi_error)?)));
    }

    let out = serde_json::json!({ "draft": draft, "clearedFields": cleared });
    serde_json::to_string(&out).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a saved definition for a loan amount or term. JavaScript numbers
/// that are NaN, infinite or negative are rejected.
#[napi]
pub fn resolve_fee(definition_json: String, subject: Option<f64>) -> NapiResult<String> {
    let definition: FeeDefinition =
        serde_json::from_str(&definition_json).map_err(to_napi_error)?;
    let subject = subject
        .map(subject_from_f64)
        .transpose()
        .map_err(to_napi_error)?;
    let resolved = resolution::resolve_fee(&definition, subject).map_err(to_napi_error)?;
    serde_json::to_string(&resolved).map_err(to_napi_error)
}

#[napi]
pub fn calculate_fee_charge(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: FeeChargeInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let config = parse_config(config_json)?;
    let output = resolution::calculate_fee_charge(&input.definition, &input.loan, &config)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
