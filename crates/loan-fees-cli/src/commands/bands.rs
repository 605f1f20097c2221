use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use loan_fees_core::bands::{PeriodBand, ValueBand};
use loan_fees_core::fee_definition::{collect_warnings, ApplicationRule, FeeDefinitionInput};
use loan_fees_core::FeeEngineConfig;

use crate::input;

/// Arguments for appending a band
#[derive(Args)]
pub struct AddBandArgs {
    /// Path to a fee definition draft (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Inclusive lower bound (loan amount or months)
    #[arg(long)]
    pub min: Decimal,

    /// Exclusive upper bound
    #[arg(long)]
    pub max: Decimal,

    /// Rate or amount charged within the band
    #[arg(long)]
    pub fee: Decimal,
}

/// Arguments for replacing a band
#[derive(Args)]
pub struct EditBandArgs {
    /// Path to a fee definition draft (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Zero-based position of the band to replace
    #[arg(long)]
    pub index: usize,

    #[arg(long)]
    pub min: Decimal,

    #[arg(long)]
    pub max: Decimal,

    #[arg(long)]
    pub fee: Decimal,
}

/// Arguments for removing a band
#[derive(Args)]
pub struct DeleteBandArgs {
    /// Path to a fee definition draft (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Zero-based position of the band to remove
    #[arg(long)]
    pub index: usize,

    /// Confirm the deletion. Without it the band is only shown.
    #[arg(long)]
    pub yes: bool,
}

/// The band schedule a draft's application rule selects.
#[derive(Clone, Copy)]
enum Schedule {
    Value,
    Period,
}

fn schedule_of(draft: &FeeDefinitionInput) -> Result<Schedule, Box<dyn std::error::Error>> {
    match draft.application_rule {
        Some(ApplicationRule::GraduatedByValue) => Ok(Schedule::Value),
        Some(ApplicationRule::GraduatedByPeriod) => Ok(Schedule::Period),
        Some(ApplicationRule::FixedValue) => {
            Err("Bands apply only to graduated fees; this draft is FixedValue".into())
        }
        None => Err("Select an applicationRule before editing bands".into()),
    }
}

fn log_warnings(draft: &FeeDefinitionInput, config: &FeeEngineConfig) {
    for warning in collect_warnings(draft, config) {
        tracing::warn!("{warning}");
    }
}

pub fn run_add_band(
    args: AddBandArgs,
    config: &FeeEngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut draft: FeeDefinitionInput = input::read_input(args.input.as_deref(), "A fee definition draft")?;
    let policy = config.overlap_policy;

    match schedule_of(&draft)? {
        Schedule::Value => {
            let band = ValueBand::new(args.min, args.max, args.fee);
            draft.value_bands = draft.value_bands.add_band(band, policy)?;
        }
        Schedule::Period => {
            let band = PeriodBand::new(args.min, args.max, args.fee);
            draft.period_bands = draft.period_bands.add_band(band, policy)?;
        }
    }

    log_warnings(&draft, config);
    Ok(serde_json::to_value(draft)?)
}

pub fn run_edit_band(
    args: EditBandArgs,
    config: &FeeEngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut draft: FeeDefinitionInput = input::read_input(args.input.as_deref(), "A fee definition draft")?;
    let policy = config.overlap_policy;

    match schedule_of(&draft)? {
        Schedule::Value => {
            let mut band = ValueBand::new(args.min, args.max, args.fee);
            band.id = draft.value_bands.get(args.index).and_then(|b| b.id);
            draft.value_bands = draft.value_bands.edit_band(args.index, band, policy)?;
        }
        Schedule::Period => {
            let mut band = PeriodBand::new(args.min, args.max, args.fee);
            band.id = draft.period_bands.get(args.index).and_then(|b| b.id);
            draft.period_bands = draft.period_bands.edit_band(args.index, band, policy)?;
        }
    }

    log_warnings(&draft, config);
    Ok(serde_json::to_value(draft)?)
}

pub fn run_delete_band(args: DeleteBandArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut draft: FeeDefinitionInput = input::read_input(args.input.as_deref(), "A fee definition draft")?;

    match schedule_of(&draft)? {
        Schedule::Value => {
            let pending = draft.value_bands.request_delete(args.index)?;
            if !args.yes {
                return Ok(json!({
                    "confirmed": false,
                    "index": pending.index(),
                    "band": pending.band(),
                }));
            }
            draft.value_bands = draft.value_bands.confirm_delete(pending)?;
        }
        Schedule::Period => {
            let pending = draft.period_bands.request_delete(args.index)?;
            if !args.yes {
                return Ok(json!({
                    "confirmed": false,
                    "index": pending.index(),
                    "band": pending.band(),
                }));
            }
            draft.period_bands = draft.period_bands.confirm_delete(pending)?;
        }
    }

    Ok(serde_json::to_value(draft)?)
}
