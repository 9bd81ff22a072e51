//! Warning and blocker modal descriptors shown by the dashboard.

use chrono::{DateTime, Utc};
use db::models::billing::{AppSubscription, AppSubscriptionStatus, AutoRenewType, SoftGracePeriod};
use serde::Serialize;

use super::status::{self, EffectiveStatus, ExpiryReason, Resolution};

const KEY_PREFIX: &str = "subscription.blocker";
const URGENCY_MESSAGE_KEY: &str = "subscription.blocker.urgency_message";

const MS_PER_HOUR: i64 = 60 * 60 * 1000;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalType {
    Warning,
    Blocker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Urgent,
    Critical,
    Blocker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Timing {
    #[serde(rename = "days_7")]
    Days7,
    #[serde(rename = "days_3")]
    Days3,
    #[serde(rename = "days_1")]
    Days1,
    #[serde(rename = "hours_6")]
    Hours6,
    #[serde(rename = "expired")]
    Expired,
    #[serde(rename = "post_grace")]
    PostGrace,
}

impl Timing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::Days7 => "days_7",
            Timing::Days3 => "days_3",
            Timing::Days1 => "days_1",
            Timing::Hours6 => "hours_6",
            Timing::Expired => "expired",
            Timing::PostGrace => "post_grace",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Timing::Days7 => Severity::Info,
            Timing::Days3 => Severity::Notice,
            Timing::Days1 => Severity::Warning,
            Timing::Hours6 => Severity::Urgent,
            Timing::Expired => Severity::Critical,
            Timing::PostGrace => Severity::Blocker,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalAction {
    Subscribe,
    Renew,
    Reactivate,
    ViewPlans,
    ExportData,
}

/// What the UI renders. `None` everywhere means no modal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockerConfig {
    pub show: bool,
    #[serde(rename = "type")]
    pub modal_type: ModalType,
    pub reason: ExpiryReason,
    pub expiry_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_until_block: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_grace_expires_at: Option<DateTime<Utc>>,
    pub can_dismiss: bool,
    pub primary_action: ModalAction,
    pub secondary_actions: Vec<ModalAction>,
    pub title_key: String,
    pub message_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency_message_key: Option<String>,
    pub severity: Severity,
    pub timing: Timing,
    pub show_countdown: bool,
    /// Whether the app stays usable behind the modal.
    pub grants_access: bool,
    /// `false` once data is read-only.
    pub allows_writes: bool,
}

/// Modal plus the writes the caller must persist.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockerDecision {
    pub config: Option<BlockerConfig>,
    pub grace_to_open: Option<SoftGracePeriod>,
    /// Grace fully spent while the stored status is still live.
    pub mark_expired: bool,
}

impl BlockerDecision {
    fn none() -> Self {
        Self {
            config: None,
            grace_to_open: None,
            mark_expired: false,
        }
    }
}

fn ceil_div(value: i64, unit: i64) -> i64 {
    let q = value / unit;
    if value % unit > 0 { q + 1 } else { q }
}

/// Pre-expiry threshold for `end`. The six hour window is checked before
/// the day thresholds; day thresholds match exactly.
pub fn pre_expiry_timing(end: DateTime<Utc>, now: DateTime<Utc>) -> Option<(Timing, i64)> {
    let ms = (end - now).num_milliseconds();
    if ms <= 0 {
        return None;
    }

    let hours = ceil_div(ms, MS_PER_HOUR);
    let days = ceil_div(ms, MS_PER_DAY);

    let timing = if hours <= 6 {
        Timing::Hours6
    } else {
        match days {
            7 => Timing::Days7,
            3 => Timing::Days3,
            1 => Timing::Days1,
            _ => return None,
        }
    };
    Some((timing, days))
}

pub fn primary_action(reason: ExpiryReason) -> ModalAction {
    match reason {
        ExpiryReason::TrialExpiring | ExpiryReason::TrialExpired => ModalAction::Subscribe,
        ExpiryReason::ManualRenewalDue
        | ExpiryReason::ManualExpired
        | ExpiryReason::RenewalFailed => ModalAction::Renew,
        ExpiryReason::CancelledEnding | ExpiryReason::CancelledExpired => ModalAction::Reactivate,
    }
}

fn pre_expiry_reason(sub: &AppSubscription) -> ExpiryReason {
    if sub.status == AppSubscriptionStatus::Trialing {
        ExpiryReason::TrialExpiring
    } else if sub.cancel_at_period_end {
        ExpiryReason::CancelledEnding
    } else {
        ExpiryReason::ManualRenewalDue
    }
}

fn pre_expiry_modal(
    sub: &AppSubscription,
    status: EffectiveStatus,
    end: DateTime<Utc>,
    timing: Timing,
    days: i64,
) -> BlockerConfig {
    let reason = pre_expiry_reason(sub);
    BlockerConfig {
        show: true,
        modal_type: ModalType::Warning,
        reason,
        expiry_date: end,
        days_remaining: Some(days),
        hours_until_block: None,
        soft_grace_expires_at: None,
        can_dismiss: true,
        primary_action: primary_action(reason),
        secondary_actions: vec![ModalAction::ViewPlans],
        title_key: format!("{KEY_PREFIX}.{}.{}.title", reason.as_str(), timing.as_str()),
        message_key: format!("{KEY_PREFIX}.{}.{}.message", reason.as_str(), timing.as_str()),
        urgency_message_key: None,
        severity: timing.severity(),
        timing,
        show_countdown: true,
        grants_access: status.grants_access(),
        allows_writes: status.allows_writes(),
    }
}

fn grace_warning_modal(
    status: EffectiveStatus,
    reason: ExpiryReason,
    expiry: DateTime<Utc>,
    grace: &SoftGracePeriod,
    now: DateTime<Utc>,
) -> BlockerConfig {
    let hours_left = ceil_div((grace.expires_at - now).num_milliseconds(), MS_PER_HOUR).max(0);
    BlockerConfig {
        show: true,
        modal_type: ModalType::Warning,
        reason,
        expiry_date: expiry,
        days_remaining: None,
        hours_until_block: Some(hours_left),
        soft_grace_expires_at: Some(grace.expires_at),
        can_dismiss: true,
        primary_action: primary_action(reason),
        secondary_actions: vec![ModalAction::ViewPlans, ModalAction::ExportData],
        title_key: format!("{KEY_PREFIX}.{}.warning_title", reason.as_str()),
        message_key: format!("{KEY_PREFIX}.{}.warning_message", reason.as_str()),
        urgency_message_key: Some(URGENCY_MESSAGE_KEY.to_string()),
        severity: Timing::Expired.severity(),
        timing: Timing::Expired,
        show_countdown: true,
        grants_access: status.grants_access(),
        allows_writes: status.allows_writes(),
    }
}

fn blocker_modal(status: EffectiveStatus, reason: ExpiryReason, expiry: DateTime<Utc>) -> BlockerConfig {
    BlockerConfig {
        show: true,
        modal_type: ModalType::Blocker,
        reason,
        expiry_date: expiry,
        days_remaining: None,
        hours_until_block: None,
        soft_grace_expires_at: None,
        can_dismiss: false,
        primary_action: primary_action(reason),
        secondary_actions: vec![ModalAction::ViewPlans, ModalAction::ExportData],
        title_key: format!("{KEY_PREFIX}.{}.blocker_title", reason.as_str()),
        message_key: format!("{KEY_PREFIX}.{}.blocker_message", reason.as_str()),
        urgency_message_key: None,
        severity: Timing::PostGrace.severity(),
        timing: Timing::PostGrace,
        show_countdown: false,
        grants_access: status.grants_access(),
        allows_writes: status.allows_writes(),
    }
}

/// Decides which modal `sub` calls for at `now`.
///
/// Pre-expiry warnings are skipped for manual renewals, since those users
/// renew on their own schedule.
pub fn blocker_config(sub: &AppSubscription, now: DateTime<Utc>) -> BlockerDecision {
    let Resolution {
        status,
        reason,
        expiry_date,
        grace,
        grace_to_open,
        ..
    } = status::resolve(sub, now);

    match status {
        EffectiveStatus::Active | EffectiveStatus::Trialing => {
            if sub.auto_renew_type == AutoRenewType::Manual {
                return BlockerDecision::none();
            }
            match pre_expiry_timing(expiry_date, now) {
                Some((timing, days)) => BlockerDecision {
                    config: Some(pre_expiry_modal(sub, status, expiry_date, timing, days)),
                    grace_to_open: None,
                    mark_expired: false,
                },
                None => BlockerDecision::none(),
            }
        }
        EffectiveStatus::GraceWarning => {
            let (Some(reason), Some(grace)) = (reason, grace) else {
                return BlockerDecision::none();
            };
            BlockerDecision {
                config: Some(grace_warning_modal(status, reason, expiry_date, &grace, now)),
                grace_to_open,
                mark_expired: false,
            }
        }
        EffectiveStatus::ReadOnly | EffectiveStatus::Blocked | EffectiveStatus::Expired => {
            let reason = reason.unwrap_or(ExpiryReason::ManualExpired);
            let live = matches!(
                sub.status,
                AppSubscriptionStatus::Active | AppSubscriptionStatus::Trialing
            );
            BlockerDecision {
                config: Some(blocker_modal(status, reason, expiry_date)),
                grace_to_open,
                mark_expired: live && status != EffectiveStatus::ReadOnly,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::status::tests::{at, subscription};
    use chrono::Duration;
    use db::models::billing::TrialInfo;
    use sqlx::types::Json;

    #[test]
    fn thresholds_match_exact_days() {
        let end = at(20, 12);
        assert_eq!(pre_expiry_timing(end, end - Duration::days(7)).map(|t| t.0), Some(Timing::Days7));
        assert_eq!(pre_expiry_timing(end, end - Duration::days(5)), None);
        assert_eq!(pre_expiry_timing(end, end - Duration::days(3)).map(|t| t.0), Some(Timing::Days3));
        assert_eq!(pre_expiry_timing(end, end - Duration::hours(20)).map(|t| t.0), Some(Timing::Days1));
        assert_eq!(pre_expiry_timing(end, end - Duration::hours(6)).map(|t| t.0), Some(Timing::Hours6));
        assert_eq!(pre_expiry_timing(end, end + Duration::hours(1)), None);
    }

    #[test]
    fn trial_ending_in_three_days_warns() {
        let mut sub = subscription(at(1, 0), at(30, 0));
        sub.status = AppSubscriptionStatus::Trialing;
        sub.trial = Some(Json(TrialInfo {
            start_date: at(1, 0),
            end_date: at(15, 0),
            has_used_trial: true,
            converted_to_paid: false,
        }));

        let decision = blocker_config(&sub, at(12, 0));
        let config = decision.config.expect("modal expected");
        assert_eq!(config.modal_type, ModalType::Warning);
        assert_eq!(config.reason, ExpiryReason::TrialExpiring);
        assert_eq!(config.timing, Timing::Days3);
        assert_eq!(config.severity, Severity::Notice);
        assert_eq!(config.primary_action, ModalAction::Subscribe);
        assert_eq!(config.title_key, "subscription.blocker.trial_expiring.days_3.title");
        assert!(config.can_dismiss);
    }

    #[test]
    fn manual_renewal_gets_no_pre_expiry_warning() {
        let mut sub = subscription(at(1, 0), at(10, 0));
        sub.auto_renew_type = AutoRenewType::Manual;
        assert!(blocker_config(&sub, at(9, 0)).config.is_none());
    }

    #[test]
    fn cancelled_ending_offers_reactivation() {
        let mut sub = subscription(at(1, 0), at(10, 0));
        sub.cancel_at_period_end = true;
        let config = blocker_config(&sub, at(9, 20)).config.expect("modal expected");
        assert_eq!(config.reason, ExpiryReason::CancelledEnding);
        assert_eq!(config.timing, Timing::Hours6);
        assert_eq!(config.severity, Severity::Urgent);
        assert_eq!(config.primary_action, ModalAction::Reactivate);
    }

    #[test]
    fn first_lapse_opens_grace_and_warns() {
        let mut sub = subscription(at(1, 0), at(10, 0));
        sub.auto_renew_type = AutoRenewType::Manual;

        let decision = blocker_config(&sub, at(10, 1));
        assert!(decision.grace_to_open.is_some());
        assert!(!decision.mark_expired);

        let config = decision.config.expect("modal expected");
        assert_eq!(config.modal_type, ModalType::Warning);
        assert_eq!(config.severity, Severity::Critical);
        assert_eq!(config.hours_until_block, Some(6));
        assert!(config.grants_access && config.allows_writes);
        assert_eq!(config.title_key, "subscription.blocker.manual_expired.warning_title");
        assert_eq!(
            config.urgency_message_key.as_deref(),
            Some("subscription.blocker.urgency_message")
        );
    }

    #[test]
    fn spent_grace_blocks_and_expires() {
        let mut sub = subscription(at(1, 0), at(10, 0));
        sub.soft_grace_period = Some(Json(SoftGracePeriod {
            start_date: at(10, 0),
            expires_at: at(10, 6),
        }));

        let read_only = blocker_config(&sub, at(11, 0));
        let config = read_only.config.expect("modal expected");
        assert_eq!(config.modal_type, ModalType::Blocker);
        assert!(!config.can_dismiss);
        assert!(config.grants_access);
        assert!(!config.allows_writes);
        assert!(!read_only.mark_expired);

        let blocked = blocker_config(&sub, at(20, 0));
        assert!(blocked.mark_expired);
        let config = blocked.config.expect("modal expected");
        assert_eq!(config.timing, Timing::PostGrace);
        assert_eq!(config.primary_action, ModalAction::Renew);
        assert!(!config.grants_access);
        assert!(!config.allows_writes);
    }

    #[test]
    fn quiet_mid_period() {
        let sub = subscription(at(1, 0), at(30, 0));
        assert_eq!(blocker_config(&sub, at(5, 0)), BlockerDecision::none());
    }
}
