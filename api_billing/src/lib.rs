use actix_web::web::{self};

pub mod routes {
    pub mod plan;
    pub mod sub;
    pub mod webhook;
}

pub mod services {
    pub mod blocker;
    pub mod plan;
    pub mod plan_change;
    pub mod status;
    pub mod subscription;
    pub(crate) mod webhook;
}

pub mod dtos {
    pub mod sub;
}

/// Plans and the caller's subscription. Wrap with the auth middleware.
pub fn mount_billing() -> actix_web::Scope {
    web::scope("/billing")
        .service(
            web::scope("/plans")
                .service(routes::plan::get_plans)
                .service(routes::plan::get_plan),
        )
        .service(
            web::scope("/sub")
                .service(routes::sub::get_me)
                .service(routes::sub::post_subscribe)
                .service(routes::sub::post_trial)
                .service(routes::sub::post_downgrade)
                .service(routes::sub::post_cancel)
                .service(routes::sub::post_reactivate)
                .service(routes::sub::delete_pending)
                .service(routes::sub::get_history)
                .service(routes::sub::get_blocker),
        )
}

/// Public; the provider signs every request. Register before
/// [`mount_billing`] so the longer prefix wins.
pub fn mount_webhook() -> actix_web::Scope {
    web::scope("/billing/webhook").service(routes::webhook::post_webhook)
}
