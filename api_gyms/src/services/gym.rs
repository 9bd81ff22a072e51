use chrono::NaiveDate;
use common::error::{AppError, Res};
use db::{
    dtos::gym::{GymCreateRequest, MembershipCreateRequest},
    models::{
        gym::{Gym, GymStats},
        membership::{
            GymMembership, GymPermission, MemberSubscriptionStatus, MembershipSettings,
            MembershipStatus,
        },
        user::UserRole,
    },
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::dtos::gym::CreateGymRequest;

pub const DEFAULT_CURRENCY: &str = "DZD";

/// Lowercase ASCII slug with single dashes between words.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() { "gym".to_string() } else { slug }
}

async fn unique_slug(conn: &mut PgConnection, name: &str) -> Res<String> {
    let base = slugify(name);
    let mut candidate = base.clone();
    let mut suffix = 2;
    while db::gym::exists_slug(&mut *conn, &candidate).await? {
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    Ok(candidate)
}

/// Creates a gym and the owner's membership.
pub async fn create_gym(conn: &mut PgConnection, owner_id: Uuid, req: CreateGymRequest) -> Res<Gym> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Gym name is required".to_string()));
    }

    let slug = unique_slug(conn, &name).await?;
    let gym = db::gym::insert_gym(
        &mut *conn,
        GymCreateRequest {
            owner_id,
            name,
            slug,
            address: req.address,
            city: req.city,
            country: req.country,
            currency: req
                .currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            settings: req.settings.unwrap_or_default(),
        },
    )
    .await?;

    db::membership::insert_membership(
        &mut *conn,
        MembershipCreateRequest {
            user_id: owner_id,
            gym_id: gym.id,
            roles: vec![UserRole::Owner],
            status: MembershipStatus::Active,
            subscription: None,
            custom_permissions: None,
            permissions: GymPermission::ALL.to_vec(),
            settings: MembershipSettings::default(),
        },
    )
    .await?;

    log::info!("Gym {} ({}) created by {}", gym.id, gym.slug, owner_id);
    Ok(gym)
}

/// Member counters over memberships holding the `member` role. Canceled
/// memberships are not counted; an active membership whose subscription
/// lapsed counts as expired.
pub fn compute_stats(memberships: &[GymMembership], today: NaiveDate) -> GymStats {
    let mut stats = GymStats::default();
    for m in memberships.iter().filter(|m| m.has_role(UserRole::Member)) {
        let lapsed = m.subscription.as_ref().is_some_and(|s| {
            s.effective_status(today) != MemberSubscriptionStatus::Active
        });
        match m.status {
            MembershipStatus::Canceled => continue,
            MembershipStatus::Active if lapsed => stats.expired_members += 1,
            MembershipStatus::Active => stats.active_members += 1,
            MembershipStatus::Expired => stats.expired_members += 1,
            MembershipStatus::Pending => stats.pending_members += 1,
            MembershipStatus::Banned => {}
        }
        stats.total_members += 1;
    }
    stats
}

pub async fn refresh_stats(conn: &mut PgConnection, gym_id: Uuid, today: NaiveDate) -> Res<GymStats> {
    let memberships = db::membership::get_memberships_by_gym(&mut *conn, gym_id, None).await?;
    let stats = compute_stats(&memberships, today);
    db::gym::update_gym_stats(&mut *conn, gym_id, stats).await?;
    Ok(stats)
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

    fn member(status: MembershipStatus, end: Option<NaiveDate>) -> GymMembership {
        let mut m = membership(vec![UserRole::Member], vec![]);
        m.status = status;
        m.subscription = end.map(|end_date| {
            Json(SubscriptionInfo {
                type_id: None,
                start_date: date(1),
                end_date,
                status: MemberSubscriptionStatus::Active,
                payment_method: None,
            })
        });
        m
    }

    #[test]
    fn slugs_are_url_safe() {
        assert_eq!(slugify("  Iron Temple Gym "), "iron-temple-gym");
        assert_eq!(slugify("Fit&Go -- Oran!"), "fit-go-oran");
        assert_eq!(slugify("***"), "gym");
    }

    #[test]
    fn stats_count_members_only() {
        let memberships = vec![
            member(MembershipStatus::Active, Some(date(20))),
            member(MembershipStatus::Active, Some(date(5))),
            member(MembershipStatus::Active, None),
            member(MembershipStatus::Pending, None),
            member(MembershipStatus::Expired, Some(date(2))),
            member(MembershipStatus::Canceled, Some(date(20))),
            member(MembershipStatus::Banned, None),
            membership(vec![UserRole::Coach], vec![]),
        ];
        assert_eq!(
            compute_stats(&memberships, date(10)),
            GymStats {
                total_members: 6,
                active_members: 2,
                expired_members: 2,
                pending_members: 1,
            }
        );
    }
}
