use chrono::NaiveDate;
use proptest::prelude::*;
use vacal_core::calendar::{
    DateRange, days_in_month, intervals_overlapping_range, is_date_in_range, layout_percent,
};

proptest! {
    #[test]
    fn february_length_follows_gregorian_rule(year in -4000i32..4000) {
        let leap = year % 4 == 0 && (year % 100 != 0 || year % 400 == 0);
        prop_assert_eq!(days_in_month(1, year) == Some(29), leap);
    }

    #[test]
    fn month_lengths_match_chrono(year in 1i32..3000, month in 1u32..=12) {
        let first = NaiveDate::from_ymd_opt(year, month, 1).expect("first");
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .expect("next month");
        let expected = (next - first).num_days() as u32;
        prop_assert_eq!(days_in_month(month - 1, year), Some(expected));
    }

    #[test]
    fn range_endpoints_are_inside(start in 0i64..2000, len in 0i64..400) {
        let base = NaiveDate::from_ymd_opt(2000, 1, 1).expect("base");
        let start = base + chrono::Duration::days(start);
        let end = start + chrono::Duration::days(len);
        prop_assert!(is_date_in_range(start, start, end));
        prop_assert!(is_date_in_range(end, start, end));
    }

    #[test]
    fn overlap_filter_agrees_with_layout(
        a in 0i64..120,
        a_len in 0i64..40,
        r in 0i64..120,
        r_len in 0i64..40,
    ) {
        let base = NaiveDate::from_ymd_opt(2026, 1, 1).expect("base");
        let interval = DateRange::new(
            base + chrono::Duration::days(a),
            base + chrono::Duration::days(a + a_len),
        ).expect("interval");
        let range = DateRange::new(
            base + chrono::Duration::days(r),
            base + chrono::Duration::days(r + r_len),
        ).expect("range");

        let included = !intervals_overlapping_range([&interval], range.start(), range.end()).is_empty();
        let layout = layout_percent(&interval, range.start(), range.end(), range.len_days());
        prop_assert_eq!(included, layout.is_some());

        if let Some(bar) = layout {
            prop_assert!(bar.offset_day >= 1);
            prop_assert!(bar.duration_days >= 1);
            prop_assert!(bar.left_pct + bar.width_pct <= 100.0 + 1e-9);
        }
    }
}

#[test]
fn march_vacation_layout_example() {
    let ymd = |d| NaiveDate::from_ymd_opt(2026, 3, d).expect("date");
    let vacation = DateRange::new(ymd(10), ymd(15)).expect("vacation");
    let bar = layout_percent(&vacation, ymd(1), ymd(31), 31).expect("visible");
    assert_eq!(bar.offset_day, 10);
    assert_eq!(bar.duration_days, 6);
}

#[test]
fn leap_february_has_29_days() {
    assert_eq!(days_in_month(1, 2024), Some(29));
    assert_eq!(days_in_month(1, 1900), Some(28));
    assert_eq!(days_in_month(12, 2024), None);
}
