use crate::domain::types::{Amount, PolicyId};
use crate::domain::vehicles::VehicleCategory;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Start of the flat-rate night block, as an hour of day.
pub const NIGHT_START_HOUR: u32 = 22;
/// End of the flat-rate night block, as an hour of day.
pub const NIGHT_END_HOUR: u32 = 6;

/// A time-of-day window during which a fee multiplier applies.
///
/// Hours are fractional hours-of-day (e.g. 17.5 = 17:30). A range is
/// applicable when the entry or exit timestamp's time of day falls inside
/// `[start_hour, end_hour)`. Ranges with a non-positive multiplier are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakRange {
    pub start_hour: f64,
    pub end_hour: f64,
    pub multiplier: Decimal,
}

impl PeakRange {
    pub fn contains(&self, time_of_day: f64) -> bool {
        time_of_day >= self.start_hour && time_of_day < self.end_hour
    }
}

/// A named fee schedule. Policies are pure data: all calculation lives in
/// the free functions below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePolicy {
    pub id: PolicyId,
    pub vehicle_type: VehicleCategory,
    pub rate_per_hour: Amount,
    pub overnight_surcharge: Amount,
    /// Zero means uncapped.
    pub daily_max: Amount,
    pub lost_ticket_fee: Amount,
    /// Base fee for one month of membership, before volume discounts.
    pub monthly_rate: Amount,
    #[serde(default)]
    pub peak_ranges: Vec<PeakRange>,
}

static DEFAULT_POLICY: Lazy<PricePolicy> = Lazy::new(|| PricePolicy {
    id: PolicyId::new("default"),
    vehicle_type: VehicleCategory::Car,
    rate_per_hour: Amount::from_i64(10_000),
    overnight_surcharge: Amount::from_i64(30_000),
    daily_max: Amount::zero(),
    lost_ticket_fee: Amount::from_i64(200_000),
    monthly_rate: Amount::from_i64(1_500_000),
    peak_ranges: Vec::new(),
});

/// Last-resort fee schedule used when neither the zone's configured policy
/// nor a vehicle-type policy resolves.
pub fn default_policy() -> PricePolicy {
    DEFAULT_POLICY.clone()
}

fn time_of_day_hours(t: DateTime<Utc>) -> f64 {
    f64::from(t.hour()) + f64::from(t.minute()) / 60.0 + f64::from(t.second()) / 3600.0
}

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    date.and_hms_opt(hour, 0, 0)
        .expect("hour within 0..24")
        .and_utc()
}

fn overlap_seconds(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> i64 {
    let start = start_a.max(start_b);
    let end = end_a.min(end_b);
    (end - start).num_seconds().max(0)
}

/// Seconds of the stay falling inside the nightly flat-rate block
/// (22:00 - 06:00), summed over every calendar date the stay touches.
fn night_block_seconds(entry: DateTime<Utc>, exit: DateTime<Utc>) -> i64 {
    let mut secs = 0;
    let mut date = entry.date_naive();
    let last = exit.date_naive();
    while date <= last {
        // Early-morning half of the block: [00:00, 06:00)
        secs += overlap_seconds(entry, exit, at_hour(date, 0), at_hour(date, NIGHT_END_HOUR));
        // Late-evening half: [22:00, 24:00)
        let next = date.succ_opt().expect("date within range");
        secs += overlap_seconds(entry, exit, at_hour(date, NIGHT_START_HOUR), at_hour(next, 0));
        date = next;
    }
    secs
}

fn ceil_hours(seconds: i64) -> i64 {
    if seconds <= 0 {
        0
    } else {
        (seconds + 3599) / 3600
    }
}

/// Maximum multiplier among peak ranges applicable to the entry or exit
/// time of day; 1.0 when none apply.
fn peak_multiplier(policy: &PricePolicy, entry: DateTime<Utc>, exit: DateTime<Utc>) -> Decimal {
    let entry_tod = time_of_day_hours(entry);
    let exit_tod = time_of_day_hours(exit);
    policy
        .peak_ranges
        .iter()
        .filter(|r| r.multiplier > Decimal::ZERO)
        .filter(|r| r.contains(entry_tod) || r.contains(exit_tod))
        .map(|r| r.multiplier)
        .max()
        .unwrap_or(Decimal::ONE)
}

/// Compute the fee for a stay. Pure and deterministic.
///
/// - Billable time rounds up to full hours.
/// - The highest applicable peak multiplier scales the hourly component.
/// - When the stay overlaps the 22:00-06:00 night block and the policy
///   carries an overnight surcharge, the flat surcharge is added exactly
///   once regardless of how many midnights are crossed, and the hours
///   inside the block are covered by the surcharge instead of being
///   billed hourly (a 23:00 -> 07:00 stay bills one day hour plus the
///   surcharge). Gating on the overlap rather than on a midnight crossing
///   keeps the fee non-decreasing in the stay's duration: night hours are
///   never billed hourly first and refunded later.
/// - `daily_max`, when positive, caps the final fee.
pub fn calculate_fee(
    entry: DateTime<Utc>,
    exit: DateTime<Utc>,
    fee_factor: Decimal,
    policy: &PricePolicy,
) -> Amount {
    let total_secs = (exit - entry).num_seconds().max(0);
    let night_secs = night_block_seconds(entry, exit);
    let overnight = night_secs > 0 && policy.overnight_surcharge.is_positive();

    let billable_secs = if overnight {
        total_secs - night_secs
    } else {
        total_secs
    };

    let hours = Decimal::from(ceil_hours(billable_secs));
    let mut fee = policy
        .rate_per_hour
        .multiply(hours)
        .multiply(fee_factor)
        .multiply(peak_multiplier(policy, entry, exit));

    if overnight {
        fee = fee.add(policy.overnight_surcharge);
    }

    if policy.daily_max.is_positive() {
        fee = fee.min(policy.daily_max);
    }

    fee
}

/// Lost-ticket settlement is the regular fee plus a flat penalty.
pub fn lost_ticket_total(
    entry: DateTime<Utc>,
    exit: DateTime<Utc>,
    fee_factor: Decimal,
    policy: &PricePolicy,
) -> (Amount, Amount) {
    let base = calculate_fee(entry, exit, fee_factor, policy);
    (base, policy.lost_ticket_fee)
}
