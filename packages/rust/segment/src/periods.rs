//! Calendar windows for period-by-period trend analysis.

use chrono::{Datelike, Months, NaiveDate};

use chainfold_shared::{ChainfoldError, PeriodWindow, Result};

/// Split `year` into its four calendar quarters, labelled `Q1 <year>` … `Q4 <year>`.
pub fn quarterly_periods(year: i32) -> Result<Vec<PeriodWindow>> {
    (0..4u32)
        .map(|q| {
            let first_month = q * 3 + 1;
            let start = first_of_month(year, first_month)?;
            let end = last_day_after(start, 3)?;
            Ok(PeriodWindow {
                start,
                end,
                label: format!("Q{} {year}", q + 1),
            })
        })
        .collect()
}

/// One window per calendar month from `month_start` to `month_end` (inclusive).
///
/// Each window runs from the 1st to the month's last day, so February and
/// December come out right without special-casing.
pub fn monthly_periods(year: i32, month_start: u32, month_end: u32) -> Result<Vec<PeriodWindow>> {
    for month in [month_start, month_end] {
        if !(1..=12).contains(&month) {
            return Err(ChainfoldError::validation(format!(
                "month {month} out of range (expected 1-12)"
            )));
        }
    }
    if month_start > month_end {
        return Err(ChainfoldError::validation(format!(
            "month_start {month_start} is after month_end {month_end}"
        )));
    }

    (month_start..=month_end)
        .map(|month| {
            let start = first_of_month(year, month)?;
            let end = last_day_after(start, 1)?;
            Ok(PeriodWindow {
                start,
                end,
                label: start.format("%B %Y").to_string(),
            })
        })
        .collect()
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ChainfoldError::validation(format!("invalid date {year}-{month:02}-01")))
}

/// The day before `start + months`, i.e. the last day of the span.
fn last_day_after(start: NaiveDate, months: u32) -> Result<NaiveDate> {
    start
        .checked_add_months(Months::new(months))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| {
            ChainfoldError::validation(format!(
                "date overflow after {}-{:02}",
                start.year(),
                start.month()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn quarters_cover_the_year() {
        let periods = quarterly_periods(2024).unwrap();
        assert_eq!(periods.len(), 4);
        assert_eq!(periods[0].label, "Q1 2024");
        assert_eq!(periods[0].start, date(2024, 1, 1));
        assert_eq!(periods[0].end, date(2024, 3, 31));
        assert_eq!(periods[1].end, date(2024, 6, 30));
        assert_eq!(periods[2].start, date(2024, 7, 1));
        assert_eq!(periods[3].label, "Q4 2024");
        assert_eq!(periods[3].end, date(2024, 12, 31));
    }

    #[test]
    fn monthly_rolls_over_year_end() {
        let periods = monthly_periods(2024, 11, 12).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].label, "November 2024");
        assert_eq!(periods[0].end, date(2024, 11, 30));
        assert_eq!(periods[1].label, "December 2024");
        assert_eq!(periods[1].start, date(2024, 12, 1));
        assert_eq!(periods[1].end, date(2024, 12, 31));
    }

    #[test]
    fn monthly_handles_leap_february() {
        let leap = monthly_periods(2024, 2, 2).unwrap();
        assert_eq!(leap[0].end, date(2024, 2, 29));
        let common = monthly_periods(2023, 2, 2).unwrap();
        assert_eq!(common[0].end, date(2023, 2, 28));
    }

    #[test]
    fn monthly_full_year_is_contiguous() {
        let periods = monthly_periods(2025, 1, 12).unwrap();
        assert_eq!(periods.len(), 12);
        for pair in periods.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
        }
    }

    #[test]
    fn monthly_rejects_bad_ranges() {
        assert!(monthly_periods(2024, 0, 3).is_err());
        assert!(monthly_periods(2024, 1, 13).is_err());
        let err = monthly_periods(2024, 6, 2).unwrap_err();
        assert!(err.to_string().contains("after month_end"));
    }
}
