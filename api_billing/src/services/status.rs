//! Effective subscription status.
//!
//! Everything here is pure: callers pass `now` and persist whatever the
//! returned [`Resolution`] asks for (an opened grace window).

use chrono::{DateTime, Duration, Utc};
use db::models::billing::{AppSubscription, AppSubscriptionStatus, AutoRenewType, SoftGracePeriod};
use serde::Serialize;

/// Hours after a lapse during which the app keeps working with a warning.
pub const SOFT_GRACE_HOURS: i64 = 6;
/// Days after the soft grace window during which data is read-only.
pub const READ_ONLY_GRACE_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Active,
    Trialing,
    /// Lapsed, inside the soft grace window. Works like active.
    GraceWarning,
    /// Lapsed, soft grace spent. Reads allowed, writes refused.
    ReadOnly,
    /// Lapsed and every grace window spent.
    Blocked,
    /// Ended on purpose (cancelled, or marked expired).
    Expired,
}

impl EffectiveStatus {
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            EffectiveStatus::Active
                | EffectiveStatus::Trialing
                | EffectiveStatus::GraceWarning
                | EffectiveStatus::ReadOnly
        )
    }

    pub fn allows_writes(&self) -> bool {
        matches!(
            self,
            EffectiveStatus::Active | EffectiveStatus::Trialing | EffectiveStatus::GraceWarning
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    TrialExpiring,
    TrialExpired,
    ManualRenewalDue,
    ManualExpired,
    CancelledEnding,
    CancelledExpired,
    RenewalFailed,
}

impl ExpiryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryReason::TrialExpiring => "trial_expiring",
            ExpiryReason::TrialExpired => "trial_expired",
            ExpiryReason::ManualRenewalDue => "manual_renewal_due",
            ExpiryReason::ManualExpired => "manual_expired",
            ExpiryReason::CancelledEnding => "cancelled_ending",
            ExpiryReason::CancelledExpired => "cancelled_expired",
            ExpiryReason::RenewalFailed => "renewal_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GracePhase {
    Warning,
    ReadOnly,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub status: EffectiveStatus,
    pub reason: Option<ExpiryReason>,
    /// When access ended or will end.
    pub expiry_date: DateTime<Utc>,
    /// Grace window in effect, already stored or about to be.
    pub grace: Option<SoftGracePeriod>,
    /// Set on the first read after a lapse; the caller must store it.
    #[serde(skip)]
    pub grace_to_open: Option<SoftGracePeriod>,
    pub grants_access: bool,
    pub allows_writes: bool,
}

impl Resolution {
    fn new(
        status: EffectiveStatus,
        reason: Option<ExpiryReason>,
        expiry: DateTime<Utc>,
        grace: Option<SoftGracePeriod>,
        grace_to_open: Option<SoftGracePeriod>,
    ) -> Self {
        Self {
            status,
            reason,
            expiry_date: expiry,
            grace,
            grace_to_open,
            grants_access: status.grants_access(),
            allows_writes: status.allows_writes(),
        }
    }

    fn settled(status: EffectiveStatus, reason: Option<ExpiryReason>, expiry: DateTime<Utc>) -> Self {
        Self::new(status, reason, expiry, None, None)
    }
}

pub fn open_grace(now: DateTime<Utc>) -> SoftGracePeriod {
    SoftGracePeriod {
        start_date: now,
        expires_at: now + Duration::hours(SOFT_GRACE_HOURS),
    }
}

pub fn read_only_end(grace: &SoftGracePeriod) -> DateTime<Utc> {
    grace.expires_at + Duration::days(READ_ONLY_GRACE_DAYS)
}

/// Phase of a lapsed subscription. No window yet means the warning phase
/// is about to start.
pub fn grace_phase(grace: Option<&SoftGracePeriod>, now: DateTime<Utc>) -> GracePhase {
    match grace {
        None => GracePhase::Warning,
        Some(g) if now < g.expires_at => GracePhase::Warning,
        Some(g) if now < read_only_end(g) => GracePhase::ReadOnly,
        Some(_) => GracePhase::Expired,
    }
}

/// Resolves the effective status of `sub` at `now`.
pub fn resolve(sub: &AppSubscription, now: DateTime<Utc>) -> Resolution {
    let period_end = sub.current_period_end;

    match sub.status {
        AppSubscriptionStatus::Expired => {
            let reason = if sub.cancel_at_period_end || sub.cancelled_at.is_some() {
                ExpiryReason::CancelledExpired
            } else {
                ExpiryReason::ManualExpired
            };
            Resolution::settled(
                EffectiveStatus::Expired,
                Some(reason),
                sub.end_date.unwrap_or(period_end),
            )
        }
        AppSubscriptionStatus::Cancelled => {
            let end = sub.end_date.unwrap_or(period_end);
            if now < end {
                Resolution::settled(EffectiveStatus::Active, None, end)
            } else {
                Resolution::settled(
                    EffectiveStatus::Expired,
                    Some(ExpiryReason::CancelledExpired),
                    end,
                )
            }
        }
        AppSubscriptionStatus::Trialing => {
            let trial_end = sub.trial().map(|t| t.end_date).unwrap_or(period_end);
            if now < trial_end {
                Resolution::settled(EffectiveStatus::Trialing, None, trial_end)
            } else {
                lapsed(sub, ExpiryReason::TrialExpired, trial_end, now)
            }
        }
        AppSubscriptionStatus::Active => {
            if now < period_end {
                Resolution::settled(EffectiveStatus::Active, None, period_end)
            } else if sub.cancel_at_period_end {
                Resolution::settled(
                    EffectiveStatus::Expired,
                    Some(ExpiryReason::CancelledExpired),
                    period_end,
                )
            } else {
                let reason = match sub.auto_renew_type {
                    AutoRenewType::Manual => ExpiryReason::ManualExpired,
                    AutoRenewType::Auto => ExpiryReason::RenewalFailed,
                };
                lapsed(sub, reason, period_end, now)
            }
        }
    }
}

fn lapsed(
    sub: &AppSubscription,
    reason: ExpiryReason,
    expiry: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Resolution {
    let (grace, grace_to_open) = match sub.soft_grace() {
        Some(existing) => (*existing, None),
        None => {
            let opened = open_grace(now);
            (opened, Some(opened))
        }
    };

    let status = match grace_phase(Some(&grace), now) {
        GracePhase::Warning => EffectiveStatus::GraceWarning,
        GracePhase::ReadOnly => EffectiveStatus::ReadOnly,
        GracePhase::Expired => EffectiveStatus::Blocked,
    };

    Resolution::new(status, Some(reason), expiry, Some(grace), grace_to_open)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::models::billing::{BillingCycle, TrialInfo};
    use sqlx::types::Json;
    use uuid::Uuid;

    pub(crate) fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    pub(crate) fn subscription(period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> AppSubscription {
        AppSubscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: "pro".to_string(),
            status: AppSubscriptionStatus::Active,
            billing_cycle: BillingCycle::Monthly,
            start_date: period_start,
            end_date: None,
            current_period_start: period_start,
            current_period_end: period_end,
            auto_renew: true,
            auto_renew_type: AutoRenewType::Auto,
            payment_method: None,
            provider: None,
            provider_subscription_id: None,
            trial: None,
            soft_grace_period: None,
            cancel_at_period_end: false,
            cancelled_at: None,
            cancellation_reason: None,
            pending_plan_id: None,
            pending_billing_cycle: None,
            pending_change_effective_date: None,
            last_payment_date: None,
            next_payment_date: Some(period_end),
            created_at: period_start,
            updated_at: period_start,
        }
    }

    #[test]
    fn inside_period_is_active() {
        let sub = subscription(at(1, 0), at(20, 0));
        let res = resolve(&sub, at(10, 0));
        assert_eq!(res.status, EffectiveStatus::Active);
        assert_eq!(res.reason, None);
        assert!(res.grace_to_open.is_none());
    }

    #[test]
    fn trial_window_wins_over_period() {
        let mut sub = subscription(at(1, 0), at(30, 0));
        sub.status = AppSubscriptionStatus::Trialing;
        sub.trial = Some(Json(TrialInfo {
            start_date: at(1, 0),
            end_date: at(15, 0),
            has_used_trial: true,
            converted_to_paid: false,
        }));

        assert_eq!(resolve(&sub, at(14, 23)).status, EffectiveStatus::Trialing);

        let lapsed = resolve(&sub, at(15, 1));
        assert_eq!(lapsed.status, EffectiveStatus::GraceWarning);
        assert_eq!(lapsed.reason, Some(ExpiryReason::TrialExpired));
        assert_eq!(lapsed.expiry_date, at(15, 0));
    }

    #[test]
    fn cancel_at_period_end_expires_without_grace() {
        let mut sub = subscription(at(1, 0), at(10, 0));
        sub.cancel_at_period_end = true;
        let res = resolve(&sub, at(10, 1));
        assert_eq!(res.status, EffectiveStatus::Expired);
        assert_eq!(res.reason, Some(ExpiryReason::CancelledExpired));
        assert!(res.grace.is_none());
        assert!(!res.grants_access);
    }

    #[test]
    fn first_lapse_opens_six_hour_window() {
        let sub = subscription(at(1, 0), at(10, 0));
        let now = at(10, 2);
        let res = resolve(&sub, now);
        assert_eq!(res.status, EffectiveStatus::GraceWarning);
        assert_eq!(res.reason, Some(ExpiryReason::RenewalFailed));
        let opened = res.grace_to_open.expect("window should be opened");
        assert_eq!(opened.start_date, now);
        assert_eq!(opened.expires_at, at(10, 8));
    }

    #[test]
    fn grace_moves_through_read_only_to_blocked() {
        let mut sub = subscription(at(1, 0), at(10, 0));
        sub.auto_renew_type = AutoRenewType::Manual;
        sub.soft_grace_period = Some(Json(SoftGracePeriod {
            start_date: at(10, 0),
            expires_at: at(10, 6),
        }));

        let warning = resolve(&sub, at(10, 5));
        assert_eq!(warning.status, EffectiveStatus::GraceWarning);
        assert_eq!(warning.reason, Some(ExpiryReason::ManualExpired));
        assert!(warning.grace_to_open.is_none());

        let read_only = resolve(&sub, at(12, 0));
        assert_eq!(read_only.status, EffectiveStatus::ReadOnly);
        assert!(read_only.grants_access);
        assert!(!read_only.allows_writes);
        assert!(warning.allows_writes);

        // read-only ends exactly three days after the soft window
        assert_eq!(resolve(&sub, at(13, 5)).status, EffectiveStatus::ReadOnly);
        assert_eq!(resolve(&sub, at(13, 6)).status, EffectiveStatus::Blocked);
    }

    #[test]
    fn cancelled_status_is_paid_through_end_date() {
        let mut sub = subscription(at(1, 0), at(10, 0));
        sub.status = AppSubscriptionStatus::Cancelled;
        sub.end_date = Some(at(10, 0));
        assert_eq!(resolve(&sub, at(9, 0)).status, EffectiveStatus::Active);
        assert_eq!(resolve(&sub, at(11, 0)).status, EffectiveStatus::Expired);
    }

    #[test]
    fn stored_expired_is_final() {
        let mut sub = subscription(at(1, 0), at(30, 0));
        sub.status = AppSubscriptionStatus::Expired;
        let res = resolve(&sub, at(2, 0));
        assert_eq!(res.status, EffectiveStatus::Expired);
        assert_eq!(res.reason, Some(ExpiryReason::ManualExpired));
    }

    #[test]
    fn grace_phase_without_window_is_warning() {
        assert_eq!(grace_phase(None, at(1, 0)), GracePhase::Warning);
        let g = open_grace(at(1, 0));
        assert_eq!(grace_phase(Some(&g), at(1, 7)), GracePhase::ReadOnly);
        assert_eq!(grace_phase(Some(&g), at(5, 0)), GracePhase::Expired);
    }
}
