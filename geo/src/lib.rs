use actix_web::web;

pub mod routes {
    pub mod region;
}
pub mod services {
    pub mod detector;
    pub mod region;
}

/// Public; region detection needs no account.
pub fn mount_region() -> actix_web::Scope {
    web::scope("/region").service(routes::region::get_region)
}
