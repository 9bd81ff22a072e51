use chrono::{DateTime, Months, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::models::billing::{AppPlan, AppSubscription, BillingCycle, PlanLevel, PlanPrice, PlanType};
use serde::Serialize;

/// Lifetime plans run for a century instead of never ending, so the
/// period arithmetic stays uniform.
const LIFETIME_MONTHS: u32 = 100 * 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChange {
    Upgrade,
    Downgrade,
    SwitchUp,
    SwitchDown,
}

impl PlanChange {
    /// Takes effect at the end of the current period.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, PlanChange::Downgrade | PlanChange::SwitchDown)
    }
}

/// Where a user stands, or wants to stand, on the plan ladder.
#[derive(Debug, Clone, Copy)]
pub struct PlanPosition<'a> {
    pub plan_id: &'a str,
    pub level: PlanLevel,
    pub cycle: BillingCycle,
}

/// Classifies a move from `current` to `target`.
///
/// # Errors
/// `ALREADY_SUBSCRIBED` for the same plan and cycle, `INVALID_PLAN_CHANGE`
/// for moves a lifetime plan does not allow.
pub fn classify_change(current: PlanPosition, target: PlanPosition) -> Res<PlanChange> {
    if current.plan_id == target.plan_id && current.cycle == target.cycle {
        return Err(AppError::coded(
            ErrorCode::AlreadySubscribed,
            "You are already subscribed to this plan",
        ));
    }

    if current.cycle == BillingCycle::OneTime {
        return match target.cycle {
            BillingCycle::OneTime if target.level > current.level => Ok(PlanChange::Upgrade),
            BillingCycle::OneTime => Err(AppError::coded(
                ErrorCode::InvalidPlanChange,
                "A lifetime plan can only be upgraded to a higher lifetime plan",
            )),
            _ => Err(AppError::coded(
                ErrorCode::InvalidPlanChange,
                "A lifetime plan cannot be switched to a recurring plan",
            )),
        };
    }

    let change = if target.level < current.level {
        PlanChange::Downgrade
    } else if target.level > current.level {
        PlanChange::Upgrade
    } else if target.cycle < current.cycle {
        PlanChange::SwitchDown
    } else {
        PlanChange::SwitchUp
    };
    Ok(change)
}

/// Whether a plan bills again at the end of each period.
pub fn is_recurring(plan_type: PlanType, cycle: BillingCycle, level: PlanLevel) -> bool {
    plan_type == PlanType::Subscription && cycle != BillingCycle::OneTime && level != PlanLevel::Free
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionDates {
    pub period_end: DateTime<Utc>,
    pub next_payment_date: Option<DateTime<Utc>>,
}

/// Period boundaries for a subscription starting at `start`.
///
/// Free and lifetime plans get a century long period with no payment due.
pub fn subscription_dates(
    start: DateTime<Utc>,
    cycle: BillingCycle,
    plan_type: PlanType,
    level: PlanLevel,
) -> SubscriptionDates {
    if !is_recurring(plan_type, cycle, level) {
        return SubscriptionDates {
            period_end: start + Months::new(LIFETIME_MONTHS),
            next_payment_date: None,
        };
    }

    let period_end = match cycle {
        BillingCycle::Yearly => start + Months::new(12),
        _ => start + Months::new(1),
    };
    SubscriptionDates {
        period_end,
        next_payment_date: Some(period_end),
    }
}

/// Unused share of the current period, valued at `old_price`.
pub fn proration_credit(sub: &AppSubscription, old_price: i64, now: DateTime<Utc>) -> i64 {
    let total = (sub.current_period_end - sub.current_period_start).num_milliseconds();
    if total <= 0 || old_price <= 0 {
        return 0;
    }

    let remaining = (sub.current_period_end - now).num_milliseconds().clamp(0, total);
    ((old_price as i128 * remaining as i128) / total as i128) as i64
}

/// Price of `plan_type` billed per `cycle`, if the plan offers it.
pub fn plan_cost(plan_type: PlanType, cycle: BillingCycle, price: &PlanPrice) -> Option<i64> {
    if plan_type == PlanType::OneTime {
        return price.one_time;
    }
    match cycle {
        BillingCycle::Monthly => price.monthly,
        BillingCycle::Yearly => price.yearly,
        BillingCycle::OneTime => price.one_time,
    }
}

/// Price table of `plan` in `currency`, or `None` when the plan is not
/// sold in it.
pub fn plan_price(plan: &AppPlan, currency: &str) -> Option<PlanPrice> {
    plan.pricing.0.get(&currency.to_uppercase()).copied()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuePlanChange {
    pub plan_id: String,
    pub cycle: BillingCycle,
    pub effective: DateTime<Utc>,
}

/// The scheduled change of `sub` once its effective date has passed.
pub fn due_plan_change(sub: &AppSubscription, now: DateTime<Utc>) -> Option<DuePlanChange> {
    let plan_id = sub.pending_plan_id.clone()?;
    let effective = sub.pending_change_effective_date.unwrap_or(sub.current_period_end);
    if now < effective {
        return None;
    }
    Some(DuePlanChange {
        plan_id,
        cycle: sub.pending_billing_cycle.unwrap_or(sub.billing_cycle),
        effective,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::status::tests::{at, subscription};
    use chrono::TimeZone;

    fn pos(plan_id: &str, level: PlanLevel, cycle: BillingCycle) -> PlanPosition<'_> {
        PlanPosition {
            plan_id,
            level,
            cycle,
        }
    }

    #[test]
    fn same_plan_same_cycle_is_rejected() {
        let err = classify_change(
            pos("pro", PlanLevel::Pro, BillingCycle::Monthly),
            pos("pro", PlanLevel::Pro, BillingCycle::Monthly),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadySubscribed);
    }

    #[test]
    fn classifies_level_and_cycle_moves() {
        let current = pos("pro", PlanLevel::Pro, BillingCycle::Yearly);
        assert_eq!(
            classify_change(current, pos("starter", PlanLevel::Starter, BillingCycle::Yearly)).unwrap(),
            PlanChange::Downgrade
        );
        assert_eq!(
            classify_change(current, pos("premium", PlanLevel::Premium, BillingCycle::Monthly)).unwrap(),
            PlanChange::Upgrade
        );
        assert_eq!(
            classify_change(current, pos("pro", PlanLevel::Pro, BillingCycle::Monthly)).unwrap(),
            PlanChange::SwitchDown
        );

        let monthly = pos("pro", PlanLevel::Pro, BillingCycle::Monthly);
        assert_eq!(
            classify_change(monthly, pos("pro", PlanLevel::Pro, BillingCycle::Yearly)).unwrap(),
            PlanChange::SwitchUp
        );
        assert!(PlanChange::SwitchDown.is_scheduled());
        assert!(!PlanChange::Upgrade.is_scheduled());
    }

    #[test]
    fn lifetime_plans_only_move_up() {
        let lifetime = pos("premium-lifetime", PlanLevel::Premium, BillingCycle::OneTime);
        let err = classify_change(lifetime, pos("pro", PlanLevel::Pro, BillingCycle::Monthly)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPlanChange);

        let err = classify_change(lifetime, pos("pro-lifetime", PlanLevel::Pro, BillingCycle::OneTime))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPlanChange);

        let starter_lifetime = pos("starter-lifetime", PlanLevel::Starter, BillingCycle::OneTime);
        assert_eq!(classify_change(starter_lifetime, lifetime).unwrap(), PlanChange::Upgrade);
    }

    #[test]
    fn monthly_period_clamps_to_month_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap();
        let dates = subscription_dates(start, BillingCycle::Monthly, PlanType::Subscription, PlanLevel::Pro);
        assert_eq!(dates.period_end, Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0).unwrap());
        assert_eq!(dates.next_payment_date, Some(dates.period_end));
    }

    #[test]
    fn lifetime_and_free_have_no_payment_due() {
        let start = at(1, 0);
        let lifetime = subscription_dates(start, BillingCycle::OneTime, PlanType::OneTime, PlanLevel::Premium);
        assert_eq!(lifetime.period_end, Utc.with_ymd_and_hms(2125, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(lifetime.next_payment_date, None);

        let free = subscription_dates(start, BillingCycle::Monthly, PlanType::Subscription, PlanLevel::Free);
        assert_eq!(free.next_payment_date, None);
    }

    #[test]
    fn credit_is_remaining_share_of_price() {
        let sub = subscription(at(1, 0), at(11, 0));
        assert_eq!(proration_credit(&sub, 1000, at(6, 0)), 500);
        assert_eq!(proration_credit(&sub, 1000, at(12, 0)), 0);
        assert_eq!(proration_credit(&sub, 1000, at(1, 0)), 1000);

        let empty = subscription(at(1, 0), at(1, 0));
        assert_eq!(proration_credit(&empty, 1000, at(1, 0)), 0);
    }

    #[test]
    fn cost_follows_cycle() {
        let price = PlanPrice {
            monthly: Some(2900),
            yearly: Some(29000),
            one_time: None,
        };
        assert_eq!(plan_cost(PlanType::Subscription, BillingCycle::Monthly, &price), Some(2900));
        assert_eq!(plan_cost(PlanType::Subscription, BillingCycle::Yearly, &price), Some(29000));
        assert_eq!(plan_cost(PlanType::OneTime, BillingCycle::Monthly, &price), None);
    }

    #[test]
    fn pending_change_is_due_at_effective_date() {
        let mut sub = subscription(at(1, 0), at(11, 0));
        assert!(due_plan_change(&sub, at(20, 0)).is_none());

        sub.pending_plan_id = Some("starter".to_string());
        sub.pending_billing_cycle = Some(BillingCycle::Monthly);
        sub.pending_change_effective_date = Some(at(11, 0));

        assert!(due_plan_change(&sub, at(10, 23)).is_none());
        let due = due_plan_change(&sub, at(11, 0)).expect("change should be due");
        assert_eq!(due.plan_id, "starter");
        assert_eq!(due.effective, at(11, 0));
    }
}
