use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_fees_core::fee_definition::FeeDefinition;
use loan_fees_core::resolution::{calculate_fee_charge, resolve_fee, FeeChargeInput};
use loan_fees_core::FeeEngineConfig;

use crate::input;

/// Arguments for resolving a fee value
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ResolveArgs {
    /// Path to a saved fee definition (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan amount (value-graduated fees) or term in months
    /// (period-graduated fees). Ignored for fixed-value fees.
    #[arg(long)]
    pub subject: Option<Decimal>,
}

/// Arguments for computing the charge on a loan
#[derive(Args)]
pub struct ChargeArgs {
    /// Path to a `{ "definition": ..., "loan": ... }` document
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_resolve(args: ResolveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let definition: FeeDefinition = input::read_input(args.input.as_deref(), "A fee definition")?;
    let resolved = resolve_fee(&definition, args.subject)?;
    Ok(serde_json::to_value(resolved)?)
}

pub fn run_charge(
    args: ChargeArgs,
    config: &FeeEngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let charge_input: FeeChargeInput = input::read_input(args.input.as_deref(), "A charge input")?;
    let output = calculate_fee_charge(&charge_input.definition, &charge_input.loan, config)?;
    Ok(serde_json::to_value(output)?)
}
