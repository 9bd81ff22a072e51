use chrono::{DateTime, Days, NaiveDate, Utc};
use common::error::{AppError, Res};
use db::{
    dtos::operations::AttendanceCreateRequest,
    models::{
        gym::GymSettings,
        membership::{GymMembership, MemberSubscriptionStatus, MembershipStatus},
        operations::{AttendanceRecord, AttendanceStatus},
        user::UserRole,
    },
};
use sqlx::PgConnection;
use uuid::Uuid;

/// Days covered by an attendance listing without an explicit range.
pub const DEFAULT_RANGE_DAYS: u64 = 7;

#[derive(Debug)]
pub enum CheckInOutcome {
    Admitted(AttendanceRecord),
    /// The attempt was recorded with status `denied`.
    Denied {
        record: AttendanceRecord,
        reason: &'static str,
    },
}

/// Reason a check-in is refused, or `None` when the member may enter.
/// Staff only need an active membership.
pub fn check_in_denial(
    membership: Option<&GymMembership>,
    settings: &GymSettings,
    today: NaiveDate,
) -> Option<&'static str> {
    let membership = match membership {
        Some(m) => m,
        None => return Some("not_a_member"),
    };
    if membership.status != MembershipStatus::Active {
        return Some("membership_inactive");
    }
    let is_staff = membership.roles.iter().any(|r| r.is_staff());
    if is_staff || !settings.require_active_subscription {
        return None;
    }

    match membership.subscription.as_ref().map(|s| s.effective_status(today)) {
        None => Some("no_subscription"),
        Some(MemberSubscriptionStatus::Active) => None,
        Some(MemberSubscriptionStatus::Expired) => Some("subscription_expired"),
        Some(MemberSubscriptionStatus::Cancelled) => Some("subscription_cancelled"),
    }
}

/// Whole-day window `[from 00:00, to + 1 day 00:00)` in UTC.
pub fn day_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Res<(DateTime<Utc>, DateTime<Utc>)> {
    let to = to.unwrap_or(today);
    let from = from.unwrap_or_else(|| to - Days::new(DEFAULT_RANGE_DAYS));
    if from > to {
        return Err(AppError::BadRequest("`from` must not be after `to`".to_string()));
    }
    let start = from.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = (to + Days::new(1)).and_time(chrono::NaiveTime::MIN).and_utc();
    Ok((start, end))
}

pub async fn check_in(
    conn: &mut PgConnection,
    gym_id: Uuid,
    settings: &GymSettings,
    user_id: Uuid,
    notes: Option<String>,
    today: NaiveDate,
) -> Res<CheckInOutcome> {
    if db::operations::find_open_check_in(&mut *conn, gym_id, user_id).await?.is_some() {
        return Err(AppError::Conflict("Member is already checked in".to_string()));
    }

    let membership = db::membership::find_membership(&mut *conn, gym_id, user_id).await?;
    if let Some(reason) = check_in_denial(membership.as_ref(), settings, today) {
        let record = db::operations::insert_attendance(
            &mut *conn,
            AttendanceCreateRequest {
                gym_id,
                user_id,
                status: AttendanceStatus::Denied,
                notes: Some(reason.to_string()),
            },
        )
        .await?;
        log::info!("Check-in denied for {} at gym {}: {}", user_id, gym_id, reason);
        return Ok(CheckInOutcome::Denied { record, reason });
    }

    let record = db::operations::insert_attendance(
        &mut *conn,
        AttendanceCreateRequest {
            gym_id,
            user_id,
            status: AttendanceStatus::CheckedIn,
            notes,
        },
    )
    .await?;
    Ok(CheckInOutcome::Admitted(record))
}

pub async fn check_out(
    conn: &mut PgConnection,
    gym_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<AttendanceRecord> {
    let open = db::operations::find_open_check_in(&mut *conn, gym_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No open check-in found".to_string()))?;
    db::operations::check_out(&mut *conn, open.id, now).await
}

pub async fn list(
    conn: &mut PgConnection,
    gym_id: Uuid,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Res<Vec<AttendanceRecord>> {
    let (start, end) = day_range(from, to, today)?;
    db::operations::get_attendance(&mut *conn, gym_id, start, end).await
}

/// Whether `user_id` checking in as themselves skips the check-in permission.
pub fn is_self_service(actor: Uuid, target: Uuid, settings: &GymSettings) -> bool {
    actor == target && settings.allow_self_check_in
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::permissions::tests::membership;
    use db::models::membership::SubscriptionInfo;
    use sqlx::types::Json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn member_until(end_date: NaiveDate, status: MemberSubscriptionStatus) -> GymMembership {
        let mut m = membership(vec![UserRole::Member], vec![]);
        m.subscription = Some(Json(SubscriptionInfo {
            type_id: None,
            start_date: date(1),
            end_date,
            status,
            payment_method: None,
        }));
        m
    }

    #[test]
    fn active_subscription_is_admitted() {
        let settings = GymSettings::default();
        let m = member_until(date(20), MemberSubscriptionStatus::Active);
        assert_eq!(check_in_denial(Some(&m), &settings, date(10)), None);
        assert_eq!(check_in_denial(Some(&m), &settings, date(20)), None);
    }

    #[test]
    fn lapsed_or_missing_subscription_is_denied() {
        let settings = GymSettings::default();
        let lapsed = member_until(date(5), MemberSubscriptionStatus::Active);
        assert_eq!(
            check_in_denial(Some(&lapsed), &settings, date(10)),
            Some("subscription_expired")
        );
        let cancelled = member_until(date(20), MemberSubscriptionStatus::Cancelled);
        assert_eq!(
            check_in_denial(Some(&cancelled), &settings, date(10)),
            Some("subscription_cancelled")
        );
        let bare = membership(vec![UserRole::Member], vec![]);
        assert_eq!(check_in_denial(Some(&bare), &settings, date(10)), Some("no_subscription"));
        assert_eq!(check_in_denial(None, &settings, date(10)), Some("not_a_member"));
    }

    #[test]
    fn inactive_membership_is_denied_even_for_staff() {
        let settings = GymSettings::default();
        let mut coach = membership(vec![UserRole::Coach], vec![]);
        assert_eq!(check_in_denial(Some(&coach), &settings, date(10)), None);
        coach.status = MembershipStatus::Banned;
        assert_eq!(
            check_in_denial(Some(&coach), &settings, date(10)),
            Some("membership_inactive")
        );
    }

    #[test]
    fn subscription_check_can_be_disabled() {
        let settings = GymSettings {
            require_active_subscription: false,
            ..GymSettings::default()
        };
        let bare = membership(vec![UserRole::Member], vec![]);
        assert_eq!(check_in_denial(Some(&bare), &settings, date(10)), None);
    }

    #[test]
    fn default_range_is_the_last_week() {
        let (start, end) = day_range(None, None, date(10)).unwrap();
        assert_eq!(start.date_naive(), date(3));
        assert_eq!(end.date_naive(), date(11));
        assert!(day_range(Some(date(9)), Some(date(8)), date(10)).is_err());
    }
}
