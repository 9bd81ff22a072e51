use actix_web::web::{self};

pub mod routes {
    pub mod affiliation;
    pub mod coaching;
    pub mod training;
}

pub mod services {
    pub mod affiliation;
    pub mod coaching;
    pub mod history;
    pub mod program;
}

pub mod dtos {
    pub mod coaching;
    pub mod training;
}

/// Programs and the caller's own runs through them. Wrap with the auth
/// middleware.
pub fn mount_training() -> actix_web::Scope {
    web::scope("/training")
        .service(routes::training::get_programs)
        .service(routes::training::post_program)
        .service(routes::training::get_program)
        .service(routes::training::put_program)
        .service(routes::training::post_start_program)
        .service(routes::training::get_active)
        .service(routes::training::post_pause)
        .service(routes::training::post_resume)
        .service(routes::training::post_session)
        .service(routes::training::get_history)
}

/// Coach and client relationships plus gym affiliations. Wrap with the auth
/// middleware.
pub fn mount_coaching() -> actix_web::Scope {
    web::scope("/coaching")
        .service(routes::coaching::get_sent_requests)
        .service(routes::coaching::get_received_requests)
        .service(routes::coaching::post_request_coach)
        .service(routes::coaching::post_offer_coaching)
        .service(routes::coaching::post_respond_request)
        .service(routes::coaching::get_clients)
        .service(routes::coaching::delete_client)
        .service(routes::coaching::post_assign_program)
        .service(routes::coaching::delete_assigned_program)
        .service(routes::affiliation::get_my_affiliations)
        .service(routes::affiliation::get_gym_coaches)
        .service(routes::affiliation::post_invite_coach)
        .service(routes::affiliation::post_request_gym)
        .service(routes::affiliation::post_respond_affiliation)
        .service(routes::affiliation::delete_affiliation)
}
