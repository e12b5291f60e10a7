//! Property checks over the pure fee calculation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parkade_facility::domain::pricing::{calculate_fee, PeakRange, PricePolicy};
use parkade_facility::domain::types::{Amount, PolicyId};
use parkade_facility::domain::vehicles::VehicleCategory;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn policy(surcharge: i64, daily_max: i64) -> PricePolicy {
    PricePolicy {
        id: PolicyId::new("prop"),
        vehicle_type: VehicleCategory::Car,
        rate_per_hour: Amount::from_i64(10_000),
        overnight_surcharge: Amount::from_i64(surcharge),
        daily_max: Amount::from_i64(daily_max),
        lost_ticket_fee: Amount::from_i64(200_000),
        monthly_rate: Amount::from_i64(1_500_000),
        peak_ranges: Vec::new(),
    }
}

proptest! {
    /// With a flat policy, a longer stay never costs less.
    #[test]
    fn fee_is_monotone_in_duration(
        entry_offset_min in 0i64..1440,
        shorter_min in 0i64..4320,
        extra_min in 0i64..4320,
    ) {
        let p = policy(0, 0);
        let entry = base_time() + Duration::minutes(entry_offset_min);
        let short_exit = entry + Duration::minutes(shorter_min);
        let long_exit = short_exit + Duration::minutes(extra_min);

        let short_fee = calculate_fee(entry, short_exit, Decimal::ONE, &p);
        let long_fee = calculate_fee(entry, long_exit, Decimal::ONE, &p);
        prop_assert!(long_fee >= short_fee);
    }

    /// The same holds with the overnight surcharge in play.
    #[test]
    fn overnight_fee_is_monotone_in_duration(
        entry_offset_min in 0i64..1440,
        shorter_min in 0i64..4320,
        extra_min in 0i64..4320,
    ) {
        let p = policy(30_000, 0);
        let entry = base_time() + Duration::minutes(entry_offset_min);
        let short_exit = entry + Duration::minutes(shorter_min);
        let long_exit = short_exit + Duration::minutes(extra_min);

        let short_fee = calculate_fee(entry, short_exit, Decimal::ONE, &p);
        let long_fee = calculate_fee(entry, long_exit, Decimal::ONE, &p);
        prop_assert!(long_fee >= short_fee);
    }

    /// The daily cap is an upper bound whenever it is set.
    #[test]
    fn daily_max_bounds_the_fee(
        entry_offset_min in 0i64..1440,
        duration_min in 0i64..2880,
    ) {
        let p = policy(30_000, 50_000);
        let entry = base_time() + Duration::minutes(entry_offset_min);
        let exit = entry + Duration::minutes(duration_min);
        let fee = calculate_fee(entry, exit, Decimal::ONE, &p);
        prop_assert!(fee <= Amount::from_i64(50_000));
    }

    /// A smaller fee factor never produces a larger fee.
    #[test]
    fn fee_factor_is_monotone(
        duration_min in 1i64..2880,
    ) {
        let p = policy(0, 0);
        let entry = base_time();
        let exit = entry + Duration::minutes(duration_min);
        let car = calculate_fee(entry, exit, VehicleCategory::Car.fee_factor(), &p);
        let bike = calculate_fee(entry, exit, VehicleCategory::Motorbike.fee_factor(), &p);
        let bicycle = calculate_fee(entry, exit, VehicleCategory::Bicycle.fee_factor(), &p);
        prop_assert!(bicycle <= bike);
        prop_assert!(bike <= car);
    }

    /// Peak multipliers only ever increase the fee.
    #[test]
    fn peak_pricing_never_discounts(
        entry_offset_min in 0i64..1440,
        duration_min in 0i64..1440,
        peak_start in 0u32..24,
    ) {
        let mut with_peak = policy(0, 0);
        with_peak.peak_ranges = vec![PeakRange {
            start_hour: f64::from(peak_start),
            end_hour: f64::from(peak_start) + 4.0,
            multiplier: Decimal::new(15, 1),
        }];
        let flat = policy(0, 0);

        let entry = base_time() + Duration::minutes(entry_offset_min);
        let exit = entry + Duration::minutes(duration_min);
        let peak_fee = calculate_fee(entry, exit, Decimal::ONE, &with_peak);
        let flat_fee = calculate_fee(entry, exit, Decimal::ONE, &flat);
        prop_assert!(peak_fee >= flat_fee);
    }
}
