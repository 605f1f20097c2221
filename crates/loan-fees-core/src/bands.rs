use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::error::FeeError;
use crate::types::{Money, Months};
use crate::FeeResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a band collection treats ranges that intersect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// Adding or editing a band whose `[min, max)` intersects another band
    /// fails with `OverlappingBandRange`.
    #[default]
    Reject,
    /// Overlaps are tolerated for compatibility with schedules captured
    /// before overlap checks existed. Resolution takes the first matching
    /// band in collection order.
    FirstMatch,
}

/// A half-open range `[min, max)` mapped to a fee value.
pub trait Band: Clone + PartialEq + fmt::Debug {
    /// Wire names of the lower and upper bound, used in error reports.
    const MIN_FIELD: &'static str;
    const MAX_FIELD: &'static str;

    fn id(&self) -> Option<Uuid>;
    fn min(&self) -> Decimal;
    fn max(&self) -> Decimal;
    fn fee(&self) -> Decimal;

    fn contains(&self, subject: Decimal) -> bool {
        self.min() <= subject && subject < self.max()
    }

    fn intersects(&self, min: Decimal, max: Decimal) -> bool {
        self.min() < max && min < self.max()
    }
}

/// Loan-amount range mapped to a fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub min_amount: Money,
    pub max_amount: Money,
    /// Percentage or flat amount, per the owning definition's calculation method
    pub fee: Decimal,
}

impl ValueBand {
    pub fn new(min_amount: Money, max_amount: Money, fee: Decimal) -> Self {
        ValueBand {
            id: None,
            min_amount,
            max_amount,
            fee,
        }
    }
}

impl Band for ValueBand {
    const MIN_FIELD: &'static str = "minAmount";
    const MAX_FIELD: &'static str = "maxAmount";

    fn id(&self) -> Option<Uuid> {
        self.id
    }
    fn min(&self) -> Decimal {
        self.min_amount
    }
    fn max(&self) -> Decimal {
        self.max_amount
    }
    fn fee(&self) -> Decimal {
        self.fee
    }
}

/// Loan-term range (months) mapped to a fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub min_period: Months,
    pub max_period: Months,
    pub fee: Decimal,
}

impl PeriodBand {
    pub fn new(min_period: Months, max_period: Months, fee: Decimal) -> Self {
        PeriodBand {
            id: None,
            min_period,
            max_period,
            fee,
        }
    }
}

impl Band for PeriodBand {
    const MIN_FIELD: &'static str = "minPeriod";
    const MAX_FIELD: &'static str = "maxPeriod";

    fn id(&self) -> Option<Uuid> {
        self.id
    }
    fn min(&self) -> Decimal {
        self.min_period
    }
    fn max(&self) -> Decimal {
        self.max_period
    }
    fn fee(&self) -> Decimal {
        self.fee
    }
}

/// A deletion that has been requested but not yet confirmed.
///
/// Holds a snapshot of the band so that confirming against a collection that
/// changed in the meantime is caught instead of removing the wrong row.
#[must_use = "a pending deletion does nothing until confirmed"]
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeletion<B: Band> {
    index: usize,
    band: B,
}

impl<B: Band> PendingDeletion<B> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn band(&self) -> &B {
        &self.band
    }
}

/// Ordered band list for one fee definition.
///
/// Immutable by replacement: every mutation returns a new collection and
/// leaves the receiver as it was. Order is insertion order, never sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandCollection<B> {
    bands: Vec<B>,
}

impl<B> Default for BandCollection<B> {
    fn default() -> Self {
        BandCollection { bands: Vec::new() }
    }
}

pub type ValueBands = BandCollection<ValueBand>;
pub type PeriodBands = BandCollection<PeriodBand>;

// ---------------------------------------------------------------------------
// Band collection manager
// ---------------------------------------------------------------------------

impl<B: Band> BandCollection<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from existing rows, checking every band and the
    /// overlap policy exactly as successive `add_band` calls would.
    pub fn from_bands(bands: Vec<B>, policy: OverlapPolicy) -> FeeResult<Self> {
        bands
            .into_iter()
            .try_fold(Self::new(), |acc, band| acc.add_band(band, policy))
    }

    pub fn bands(&self) -> &[B] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&B> {
        self.bands.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, B> {
        self.bands.iter()
    }

    pub fn into_inner(self) -> Vec<B> {
        self.bands
    }

    /// Append a band to the end of the collection.
    pub fn add_band(&self, band: B, policy: OverlapPolicy) -> FeeResult<Self> {
        validate_band(&band)?;
        if policy == OverlapPolicy::Reject {
            self.check_overlap(&band, None)?;
        }

        let mut bands = self.bands.clone();
        bands.push(band);
        debug!(len = bands.len(), "band added");
        Ok(BandCollection { bands })
    }

    /// Replace the band at `index`. Overlap is checked against every other band.
    pub fn edit_band(&self, index: usize, band: B, policy: OverlapPolicy) -> FeeResult<Self> {
        self.ensure_index(index)?;
        validate_band(&band)?;
        if policy == OverlapPolicy::Reject {
            self.check_overlap(&band, Some(index))?;
        }

        let mut bands = self.bands.clone();
        bands[index] = band;
        debug!(index, "band edited");
        Ok(BandCollection { bands })
    }

    /// First step of a deletion: capture the row the user is asked to confirm.
    pub fn request_delete(&self, index: usize) -> FeeResult<PendingDeletion<B>> {
        self.ensure_index(index)?;
        Ok(PendingDeletion {
            index,
            band: self.bands[index].clone(),
        })
    }

    /// Second step of a deletion: remove the confirmed row, shifting later
    /// rows down by one.
    pub fn confirm_delete(&self, pending: PendingDeletion<B>) -> FeeResult<Self> {
        self.ensure_index(pending.index)?;
        if self.bands[pending.index] != pending.band {
            return Err(FeeError::StaleBandDeletion {
                index: pending.index,
            });
        }

        let mut bands = self.bands.clone();
        bands.remove(pending.index);
        debug!(index = pending.index, len = bands.len(), "band deleted");
        Ok(BandCollection { bands })
    }

    /// First band, in collection order, whose `[min, max)` contains `subject`.
    pub fn find_match(&self, subject: Decimal) -> Option<(usize, &B)> {
        self.bands
            .iter()
            .enumerate()
            .find(|(_, band)| band.contains(subject))
    }

    /// Index pairs `(i, j)`, `i < j`, of bands whose ranges intersect.
    pub fn overlaps(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.bands.iter().enumerate() {
            for (j, b) in self.bands.iter().enumerate().skip(i + 1) {
                if a.intersects(b.min(), b.max()) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Uncovered ranges between the lowest `min` and the highest `max`.
    pub fn coverage_gaps(&self) -> Vec<(Decimal, Decimal)> {
        let mut ranges: Vec<(Decimal, Decimal)> =
            self.bands.iter().map(|b| (b.min(), b.max())).collect();
        ranges.sort_by(|a, b| a.0.cmp(&b.0));

        let mut gaps = Vec::new();
        let mut covered_to: Option<Decimal> = None;
        for (min, max) in ranges {
            if let Some(reach) = covered_to {
                if min > reach {
                    gaps.push((reach, min));
                }
                covered_to = Some(reach.max(max));
            } else {
                covered_to = Some(max);
            }
        }
        gaps
    }

    /// Every invariant violation in the collection, in index order.
    pub fn violations(&self, policy: OverlapPolicy, require_full_coverage: bool) -> Vec<FeeError> {
        let mut errors: Vec<FeeError> = self
            .bands
            .iter()
            .filter_map(|band| validate_band(band).err())
            .collect();

        if policy == OverlapPolicy::Reject {
            for (i, j) in self.overlaps() {
                let (existing, band) = (&self.bands[i], &self.bands[j]);
                errors.push(overlap_error(band, i, existing));
            }
        }

        if require_full_coverage {
            errors.extend(
                self.coverage_gaps()
                    .into_iter()
                    .map(|(from, to)| FeeError::BandCoverageGap { from, to }),
            );
        }
        errors
    }

    fn ensure_index(&self, index: usize) -> FeeResult<()> {
        if index >= self.bands.len() {
            return Err(FeeError::IndexOutOfRange {
                index,
                len: self.bands.len(),
            });
        }
        Ok(())
    }

    fn check_overlap(&self, band: &B, skip: Option<usize>) -> FeeResult<()> {
        let clash = self
            .bands
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .find(|(_, existing)| existing.intersects(band.min(), band.max()));

        match clash {
            Some((i, existing)) => Err(overlap_error(band, i, existing)),
            None => Ok(()),
        }
    }
}

impl<'a, B> IntoIterator for &'a BandCollection<B> {
    type Item = &'a B;
    type IntoIter = std::slice::Iter<'a, B>;

    fn into_iter(self) -> Self::IntoIter {
        self.bands.iter()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Per-band checks: `max > min`, non-negative lower bound, non-negative fee.
pub fn validate_band<B: Band>(band: &B) -> FeeResult<()> {
    if band.max() <= band.min() {
        return Err(FeeError::InvalidBandRange {
            min: band.min(),
            max: band.max(),
        });
    }
    if band.min() < Decimal::ZERO {
        return Err(FeeError::NumericOutOfRange {
            field: B::MIN_FIELD.into(),
            value: band.min(),
            reason: "Band lower bound must be non-negative".into(),
        });
    }
    if band.fee() < Decimal::ZERO {
        return Err(FeeError::NumericOutOfRange {
            field: "fee".into(),
            value: band.fee(),
            reason: "Band fee must be non-negative".into(),
        });
    }
    Ok(())
}

fn overlap_error<B: Band>(band: &B, existing_index: usize, existing: &B) -> FeeError {
    FeeError::OverlappingBandRange {
        min: band.min(),
        max: band.max(),
        existing_index,
        existing_min: existing.min(),
        existing_max: existing.max(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
