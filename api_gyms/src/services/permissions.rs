//! Who may do what inside a gym.
//!
//! Two layers: the coarse role table (`RolePermissions`) with per-member
//! overrides, and the granular `GymPermission` list checked by routes.
//! Both are recomputed on every request.

use common::error::{AppError, ErrorCode, Res};
use db::models::{
    gym::Gym,
    membership::{CustomPermissions, GymMembership, GymPermission, MembershipStatus},
    user::UserRole,
};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use GymPermission::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions {
    pub can_manage_members: bool,
    pub can_manage_subscriptions: bool,
    pub can_manage_staff: bool,
    pub can_view_financials: bool,
    pub can_assign_programs: bool,
    pub can_manage_app_subscriptions: bool,
    pub can_customize_permissions: bool,
}

impl RolePermissions {
    const ALL: RolePermissions = RolePermissions {
        can_manage_members: true,
        can_manage_subscriptions: true,
        can_manage_staff: true,
        can_view_financials: true,
        can_assign_programs: true,
        can_manage_app_subscriptions: true,
        can_customize_permissions: true,
    };

    fn union(self, other: RolePermissions) -> RolePermissions {
        RolePermissions {
            can_manage_members: self.can_manage_members || other.can_manage_members,
            can_manage_subscriptions: self.can_manage_subscriptions
                || other.can_manage_subscriptions,
            can_manage_staff: self.can_manage_staff || other.can_manage_staff,
            can_view_financials: self.can_view_financials || other.can_view_financials,
            can_assign_programs: self.can_assign_programs || other.can_assign_programs,
            can_manage_app_subscriptions: self.can_manage_app_subscriptions
                || other.can_manage_app_subscriptions,
            can_customize_permissions: self.can_customize_permissions
                || other.can_customize_permissions,
        }
    }

    fn apply(mut self, custom: &CustomPermissions) -> RolePermissions {
        let overrides = [
            (&mut self.can_manage_members, custom.can_manage_members),
            (&mut self.can_manage_subscriptions, custom.can_manage_subscriptions),
            (&mut self.can_manage_staff, custom.can_manage_staff),
            (&mut self.can_view_financials, custom.can_view_financials),
            (&mut self.can_assign_programs, custom.can_assign_programs),
            (&mut self.can_manage_app_subscriptions, custom.can_manage_app_subscriptions),
            (&mut self.can_customize_permissions, custom.can_customize_permissions),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        self
    }
}

/// Coarse flag that governs a group of granular permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFlag {
    ManageMembers,
    ManageSubscriptions,
    ManageStaff,
    ViewFinancials,
    AssignPrograms,
}

impl RoleFlag {
    /// `None` for permissions no flag covers (attendance, schedules,
    /// settings).
    pub fn governing(permission: GymPermission) -> Option<RoleFlag> {
        match permission {
            MembersView | MembersCreate | MembersEdit | MembersDelete => Some(RoleFlag::ManageMembers),
            PricingView | PricingManage => Some(RoleFlag::ManageSubscriptions),
            StaffView | StaffManage => Some(RoleFlag::ManageStaff),
            PaymentsView | PaymentsManage | AnalyticsView | AnalyticsExport => {
                Some(RoleFlag::ViewFinancials)
            }
            ClientsView | ClientsManage => Some(RoleFlag::AssignPrograms),
            _ => None,
        }
    }

    fn get(self, permissions: &RolePermissions) -> bool {
        match self {
            RoleFlag::ManageMembers => permissions.can_manage_members,
            RoleFlag::ManageSubscriptions => permissions.can_manage_subscriptions,
            RoleFlag::ManageStaff => permissions.can_manage_staff,
            RoleFlag::ViewFinancials => permissions.can_view_financials,
            RoleFlag::AssignPrograms => permissions.can_assign_programs,
        }
    }

    fn overridden(self, custom: &CustomPermissions) -> Option<bool> {
        match self {
            RoleFlag::ManageMembers => custom.can_manage_members,
            RoleFlag::ManageSubscriptions => custom.can_manage_subscriptions,
            RoleFlag::ManageStaff => custom.can_manage_staff,
            RoleFlag::ViewFinancials => custom.can_view_financials,
            RoleFlag::AssignPrograms => custom.can_assign_programs,
        }
    }
}

/// Row of the static role table.
pub fn role_permissions(role: UserRole) -> RolePermissions {
    match role {
        UserRole::Owner => RolePermissions::ALL,
        UserRole::Manager => RolePermissions {
            can_view_financials: false,
            ..RolePermissions::ALL
        },
        UserRole::Coach => RolePermissions {
            can_assign_programs: true,
            ..RolePermissions::default()
        },
        _ => RolePermissions::default(),
    }
}

/// Union of the role rows, then custom overrides field by field.
/// An owner keeps everything whatever the overrides say.
pub fn resolve_role_permissions(
    roles: &[UserRole],
    custom: Option<&CustomPermissions>,
) -> RolePermissions {
    if roles.contains(&UserRole::Owner) {
        return RolePermissions::ALL;
    }

    let base = roles
        .iter()
        .map(|role| role_permissions(*role))
        .fold(RolePermissions::default(), RolePermissions::union);

    match custom {
        Some(custom) => base.apply(custom),
        None => base,
    }
}

const MANAGER_DEFAULTS: &[GymPermission] = &[
    MembersView,
    MembersCreate,
    MembersEdit,
    MembersDelete,
    AttendanceView,
    AttendanceCheckin,
    AttendanceManage,
    PricingView,
    PricingManage,
    StaffView,
    StaffManage,
    SettingsView,
    SettingsManage,
    AnalyticsView,
    AnalyticsExport,
    SchedulesView,
    SchedulesManage,
];

const RECEPTIONIST_DEFAULTS: &[GymPermission] = &[
    MembersView,
    MembersCreate,
    MembersEdit,
    AttendanceView,
    AttendanceCheckin,
    AttendanceManage,
    PricingView,
    SchedulesView,
];

const COACH_DEFAULTS: &[GymPermission] = &[
    AttendanceView,
    AttendanceCheckin,
    SchedulesView,
    SchedulesManage,
    ClientsView,
    ClientsManage,
    PaymentsView,
];

pub fn default_permissions(role: UserRole) -> &'static [GymPermission] {
    match role {
        UserRole::Owner => &GymPermission::ALL,
        UserRole::Manager => MANAGER_DEFAULTS,
        UserRole::Receptionist => RECEPTIONIST_DEFAULTS,
        UserRole::Coach => COACH_DEFAULTS,
        _ => &[],
    }
}

/// Union of the defaults of `roles`, in canonical order.
pub fn defaults_for_roles(roles: &[UserRole]) -> Vec<GymPermission> {
    GymPermission::ALL
        .into_iter()
        .filter(|p| roles.iter().any(|r| default_permissions(*r).contains(p)))
        .collect()
}

/// Granular permissions a membership carries. An empty stored list falls
/// back to the role defaults. A custom override on the governing
/// [`RoleFlag`] then wins: `Some(false)` removes the whole group and
/// `Some(true)` grants it.
pub fn effective_gym_permissions(membership: &GymMembership) -> Vec<GymPermission> {
    if membership.has_role(UserRole::Owner) {
        return GymPermission::ALL.to_vec();
    }
    let granted = if membership.permissions.is_empty() {
        defaults_for_roles(&membership.roles)
    } else {
        membership.permissions.clone()
    };
    match membership.custom_permissions.as_ref() {
        Some(custom) => apply_overrides(granted, &membership.roles, &custom.0),
        None => granted,
    }
}

fn apply_overrides(
    granted: Vec<GymPermission>,
    roles: &[UserRole],
    custom: &CustomPermissions,
) -> Vec<GymPermission> {
    let resolved = resolve_role_permissions(roles, Some(custom));
    GymPermission::ALL
        .into_iter()
        .filter(|p| match RoleFlag::governing(*p) {
            Some(flag) if flag.overridden(custom).is_some() => flag.get(&resolved),
            _ => granted.contains(p),
        })
        .collect()
}

pub fn has_permission(permissions: &[GymPermission], permission: GymPermission) -> bool {
    permissions.contains(&permission)
}

pub fn has_any_permission(permissions: &[GymPermission], required: &[GymPermission]) -> bool {
    required.iter().any(|p| permissions.contains(p))
}

pub fn has_all_permissions(permissions: &[GymPermission], required: &[GymPermission]) -> bool {
    required.iter().all(|p| permissions.contains(p))
}

/// Result of a successful [`authorize`] call.
#[derive(Debug, Clone)]
pub struct GymAccess {
    pub gym: Gym,
    /// `None` only for an owner without a membership row.
    pub membership: Option<GymMembership>,
    pub permissions: Vec<GymPermission>,
}

impl GymAccess {
    pub fn can(&self, permission: GymPermission) -> bool {
        has_permission(&self.permissions, permission)
    }
}

/// Effective permissions of an active, non-owner membership, or `None`
/// when it holds none of `required`.
pub fn member_permissions(
    membership: &GymMembership,
    required: &[GymPermission],
) -> Option<Vec<GymPermission>> {
    let permissions = effective_gym_permissions(membership);
    if !required.is_empty() && !has_any_permission(&permissions, required) {
        return None;
    }
    Some(permissions)
}

/// Checks that `user_id` may act on `gym_id` with any of `required`.
/// An empty `required` only asks for an active membership.
///
/// # Errors
/// `GYM_NOT_FOUND` when the gym does not exist, `INSUFFICIENT_PERMISSIONS`
/// otherwise.
pub async fn authorize(
    pool: &PgPool,
    user_id: Uuid,
    gym_id: Uuid,
    required: &[GymPermission],
) -> Res<GymAccess> {
    let gym = db::gym::find_gym_by_id(pool, gym_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::GymNotFound, "Gym not found"))?;
    let membership = db::membership::find_membership(pool, gym_id, user_id).await?;

    if gym.owner_id == user_id {
        return Ok(GymAccess {
            gym,
            membership,
            permissions: GymPermission::ALL.to_vec(),
        });
    }

    let denied = || {
        log::debug!("User {} denied {:?} on gym {}", user_id, required, gym_id);
        AppError::coded(
            ErrorCode::InsufficientPermissions,
            "You do not have permission to perform this action",
        )
    };

    let membership = match membership {
        Some(m) if m.status == MembershipStatus::Active => m,
        _ => return Err(denied()),
    };
    let permissions = member_permissions(&membership, required).ok_or_else(denied)?;

    Ok(GymAccess {
        gym,
        membership: Some(membership),
        permissions,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use db::models::membership::MembershipSettings;
    use sqlx::types::Json;

    pub(crate) fn membership(roles: Vec<UserRole>, permissions: Vec<GymPermission>) -> GymMembership {
        let now = Utc::now();
        GymMembership {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            gym_id: Uuid::new_v4(),
            roles,
            joined_at: now,
            status: MembershipStatus::Active,
            subscription: None,
            custom_permissions: None,
            permissions,
            settings: Json(MembershipSettings::default()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn owner_has_everything_despite_overrides() {
        let custom = CustomPermissions {
            can_manage_staff: Some(false),
            can_view_financials: Some(false),
            ..Default::default()
        };
        assert_eq!(
            resolve_role_permissions(&[UserRole::Owner], Some(&custom)),
            RolePermissions::ALL
        );
    }

    #[test]
    fn manager_lacks_financials_until_overridden() {
        let base = resolve_role_permissions(&[UserRole::Manager], None);
        assert!(base.can_manage_staff);
        assert!(!base.can_view_financials);

        let custom = CustomPermissions {
            can_view_financials: Some(true),
            can_manage_staff: Some(false),
            ..Default::default()
        };
        let resolved = resolve_role_permissions(&[UserRole::Manager], Some(&custom));
        assert!(resolved.can_view_financials);
        assert!(!resolved.can_manage_staff);
        assert!(resolved.can_manage_members);
    }

    #[test]
    fn roles_are_unioned() {
        let resolved = resolve_role_permissions(&[UserRole::Coach, UserRole::Member], None);
        assert_eq!(
            resolved,
            RolePermissions {
                can_assign_programs: true,
                ..RolePermissions::default()
            }
        );
        assert_eq!(
            resolve_role_permissions(&[UserRole::Cleaner], None),
            RolePermissions::default()
        );
    }

    #[test]
    fn default_lists_per_role() {
        assert_eq!(default_permissions(UserRole::Owner).len(), 21);
        assert_eq!(default_permissions(UserRole::Manager).len(), 17);
        assert!(!default_permissions(UserRole::Receptionist).contains(&MembersDelete));
        assert!(default_permissions(UserRole::Coach).contains(&ClientsManage));
        assert!(default_permissions(UserRole::Security).is_empty());
    }

    #[test]
    fn empty_stored_list_falls_back_to_role_defaults() {
        let coach = membership(vec![UserRole::Coach, UserRole::Receptionist], vec![]);
        let perms = effective_gym_permissions(&coach);
        assert!(has_all_permissions(&perms, &[ClientsView, MembersCreate]));
        assert!(!has_permission(&perms, StaffManage));

        let custom = membership(vec![UserRole::Coach], vec![PaymentsManage]);
        assert_eq!(effective_gym_permissions(&custom), vec![PaymentsManage]);

        let owner = membership(vec![UserRole::Owner], vec![]);
        assert_eq!(effective_gym_permissions(&owner).len(), 21);
    }

    #[test]
    fn revoked_member_flag_denies_member_routes() {
        let mut manager = membership(vec![UserRole::Manager], vec![]);
        assert!(member_permissions(&manager, &[MembersCreate]).is_some());

        manager.custom_permissions = Some(Json(CustomPermissions {
            can_manage_members: Some(false),
            ..Default::default()
        }));
        assert!(member_permissions(&manager, &[MembersCreate]).is_none());
        let perms = effective_gym_permissions(&manager);
        assert!(!has_any_permission(&perms, &[MembersView, MembersEdit, MembersDelete]));
        assert!(has_all_permissions(&perms, &[StaffManage, PricingManage]));
    }

    #[test]
    fn granted_financials_flag_opens_payments() {
        let mut coach = membership(vec![UserRole::Coach], vec![]);
        assert!(member_permissions(&coach, &[PaymentsManage]).is_none());

        coach.custom_permissions = Some(Json(CustomPermissions {
            can_view_financials: Some(true),
            ..Default::default()
        }));
        let perms = member_permissions(&coach, &[PaymentsManage]).unwrap();
        assert!(has_all_permissions(&perms, &[PaymentsView, PaymentsManage, AnalyticsView]));
        assert!(has_all_permissions(&perms, &[ClientsView, SchedulesManage]));
        assert!(!has_permission(&perms, StaffView));
    }

    #[test]
    fn unset_overrides_keep_the_stored_list() {
        let mut receptionist = membership(vec![UserRole::Receptionist], vec![]);
        receptionist.custom_permissions = Some(Json(CustomPermissions {
            can_manage_staff: None,
            ..Default::default()
        }));
        assert_eq!(
            effective_gym_permissions(&receptionist),
            defaults_for_roles(&[UserRole::Receptionist])
        );
    }

    #[test]
    fn any_and_all_checks() {
        let perms = [MembersView, AttendanceView];
        assert!(has_any_permission(&perms, &[StaffManage, MembersView]));
        assert!(!has_any_permission(&perms, &[StaffManage]));
        assert!(!has_all_permissions(&perms, &[MembersView, StaffManage]));
        assert!(has_all_permissions(&perms, &[]));
    }
}
