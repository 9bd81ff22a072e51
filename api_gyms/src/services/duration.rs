use chrono::{Days, Months, NaiveDate};
use common::error::{AppError, ErrorCode, Res};
use db::models::membership::{DurationUnit, SubscriptionType};

pub const DEFAULT_PRESET: &str = "1_month";

/// Largest step count a preset may carry.
pub const MAX_PRESET_AMOUNT: u32 = 1000;

/// Length of a member subscription, such as `3_months`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionDuration {
    pub amount: u32,
    pub unit: DurationUnit,
}

impl SubscriptionDuration {
    /// Parses `N_day(s)`, `N_week(s)`, `N_month(s)` or `N_year(s)`.
    pub fn parse(preset: &str) -> Option<Self> {
        let (amount, unit) = preset.split_once('_')?;
        let amount: u32 = amount.parse().ok()?;
        if amount == 0 || amount > MAX_PRESET_AMOUNT {
            return None;
        }
        let unit = match unit.strip_suffix('s').unwrap_or(unit) {
            "day" => DurationUnit::Day,
            "week" => DurationUnit::Week,
            "month" => DurationUnit::Month,
            "year" => DurationUnit::Year,
            _ => return None,
        };
        Some(Self { amount, unit })
    }

    pub fn of_type(subscription_type: &SubscriptionType) -> Self {
        Self {
            amount: subscription_type.duration.max(1) as u32,
            unit: subscription_type.unit,
        }
    }

    /// Calendar arithmetic: month and year steps clamp to the last day of
    /// the target month, so Jan 31 plus one month is Feb 28 (or 29).
    pub fn end_date(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self.unit {
            DurationUnit::Day => start.checked_add_days(Days::new(u64::from(self.amount))),
            DurationUnit::Week => start.checked_add_days(Days::new(u64::from(self.amount) * 7)),
            DurationUnit::Month => start.checked_add_months(Months::new(self.amount)),
            DurationUnit::Year => {
                start.checked_add_months(Months::new(self.amount.checked_mul(12)?))
            }
        }
    }
}

/// End date for an optional preset, defaulting to [`DEFAULT_PRESET`].
pub fn end_date(start: NaiveDate, preset: Option<&str>) -> Res<NaiveDate> {
    let preset = preset.unwrap_or(DEFAULT_PRESET);
    let duration = SubscriptionDuration::parse(preset).ok_or_else(|| {
        AppError::coded(
            ErrorCode::ValidationError,
            format!("Unknown subscription duration '{}'", preset),
        )
    })?;
    duration.end_date(start).ok_or_else(|| {
        AppError::coded(ErrorCode::ValidationError, "Subscription end date out of range")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_singular_and_plural_presets() {
        assert_eq!(
            SubscriptionDuration::parse("1_month"),
            Some(SubscriptionDuration { amount: 1, unit: DurationUnit::Month })
        );
        assert_eq!(
            SubscriptionDuration::parse("3_months"),
            Some(SubscriptionDuration { amount: 3, unit: DurationUnit::Month })
        );
        assert_eq!(
            SubscriptionDuration::parse("2_weeks").map(|d| d.unit),
            Some(DurationUnit::Week)
        );
        assert_eq!(SubscriptionDuration::parse("0_days"), None);
        assert_eq!(SubscriptionDuration::parse("month"), None);
        assert_eq!(SubscriptionDuration::parse("1_fortnight"), None);
    }

    #[test]
    fn month_steps_clamp_to_month_end() {
        assert_eq!(end_date(date(2025, 1, 31), Some("1_month")).unwrap(), date(2025, 2, 28));
        assert_eq!(end_date(date(2024, 1, 31), Some("1_month")).unwrap(), date(2024, 2, 29));
        assert_eq!(end_date(date(2024, 2, 29), Some("1_year")).unwrap(), date(2025, 2, 28));
    }

    #[test]
    fn day_and_week_steps() {
        assert_eq!(end_date(date(2025, 3, 1), Some("10_days")).unwrap(), date(2025, 3, 11));
        assert_eq!(end_date(date(2025, 12, 29), Some("1_week")).unwrap(), date(2026, 1, 5));
    }

    #[test]
    fn huge_amounts_are_rejected_not_overflowed() {
        let err = end_date(date(2025, 1, 1), Some("400000000_years")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(end_date(date(2025, 1, 1), Some("1001_months")).is_err());
        assert!(end_date(date(2025, 1, 1), Some("1000_years")).is_ok());

        let typed = SubscriptionDuration { amount: u32::MAX, unit: DurationUnit::Year };
        assert_eq!(typed.end_date(date(2025, 1, 1)), None);
    }

    #[test]
    fn defaults_to_one_month() {
        assert_eq!(end_date(date(2025, 3, 15), None).unwrap(), date(2025, 4, 15));
        let err = end_date(date(2025, 3, 15), Some("forever")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
