//! Trailing-exposure traffic utility.
//!
//! The mid-experiment engine needs a projection of future daily users.
//! The traffic-health snapshot is day-dimensioned: one row per calendar
//! date with per-variation exposure unit counts. The projection is the
//! plain average over the trailing window, excluding the base date itself
//! because that day's data is still being collected.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Exposure counts for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTraffic {
    /// The calendar date of this row.
    pub date: NaiveDate,
    /// Units exposed per variation on that date.
    pub variation_units: Vec<u64>,
}

impl DailyTraffic {
    /// Total exposure across all variations for this date.
    pub fn total_units(&self) -> u64 {
        self.variation_units.iter().sum()
    }
}

/// Day-dimensioned slice of a traffic-health snapshot.
///
/// Dates may be missing (no exposures recorded that day); they simply
/// contribute nothing to any window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSnapshot {
    /// Exposure rows, one per recorded date, in no particular order.
    pub days: Vec<DailyTraffic>,
}

/// Average daily exposure over the trailing `n_days` calendar dates.
///
/// The window is `[base_date - n_days, base_date)` — exclusive of
/// `base_date`, whose data is assumed incomplete. The sum over the window
/// is divided by `n_days` (missing dates count as zero) and floored to an
/// integer.
pub fn average_exposure_over_last_n_days(
    traffic: &TrafficSnapshot,
    n_days: u32,
    base_date: NaiveDate,
) -> u64 {
    if n_days == 0 {
        return 0;
    }
    let window_start = base_date - chrono::Days::new(u64::from(n_days));
    let total: u64 = traffic
        .days
        .iter()
        .filter(|day| day.date >= window_start && day.date < base_date)
        .map(DailyTraffic::total_units)
        .sum();
    total / u64::from(n_days)
}
