use actix_web::web::{self};

pub mod routes {
    pub mod attendance;
    pub mod class;
    pub mod equipment;
    pub mod gym;
    pub mod member;
    pub mod pricing;
    pub mod staff;
}

pub mod services {
    pub mod attendance;
    pub mod class;
    pub mod duration;
    pub mod equipment;
    pub mod gym;
    pub mod membership;
    pub mod permissions;
    pub mod pricing;
    pub mod staff;
}

pub mod dtos {
    pub mod gym;
    pub mod member;
    pub mod operations;
}

/// Gym administration. Wrap with the auth middleware.
pub fn mount_gyms() -> actix_web::Scope {
    web::scope("/gyms")
        .service(routes::gym::post_gym)
        .service(routes::gym::get_my_gyms)
        .service(routes::gym::get_gym)
        .service(routes::gym::put_gym)
        .service(routes::gym::post_refresh_stats)
        .service(routes::gym::get_my_permissions)
        .service(routes::member::get_members)
        .service(routes::member::post_member)
        .service(routes::member::get_member)
        .service(routes::member::put_member_status)
        .service(routes::member::post_renew)
        .service(routes::member::delete_member)
        .service(routes::staff::get_staff)
        .service(routes::staff::post_staff)
        .service(routes::staff::put_staff)
        .service(routes::staff::delete_staff)
        .service(routes::pricing::get_pricing)
        .service(routes::pricing::get_tier)
        .service(routes::pricing::post_pricing)
        .service(routes::pricing::put_pricing)
        .service(routes::pricing::delete_pricing)
        .service(routes::attendance::post_check_in)
        .service(routes::attendance::post_check_out)
        .service(routes::attendance::get_attendance)
        .service(routes::class::get_classes)
        .service(routes::class::post_class)
        .service(routes::class::post_booking)
        .service(routes::class::delete_booking)
        .service(routes::equipment::get_equipment)
        .service(routes::equipment::post_equipment)
        .service(routes::equipment::put_equipment)
        .service(routes::equipment::delete_equipment)
}

/// The caller's own memberships. Wrap with the auth middleware.
pub fn mount_memberships() -> actix_web::Scope {
    web::scope("/memberships")
        .service(routes::member::get_my_memberships)
        .service(routes::member::put_my_settings)
}
