use actix_web::web::{self};

pub mod routes {
    pub mod invoice;
}

pub mod services {
    pub mod invoice;
    pub mod status;
}

pub mod dtos {
    pub mod invoice;
}

/// Member invoices and payments. Wrap with the auth middleware.
pub fn mount_payments() -> actix_web::Scope {
    web::scope("/payments")
        .service(routes::invoice::get_invoices)
        .service(routes::invoice::post_invoice)
        .service(routes::invoice::get_member_invoices)
        .service(routes::invoice::get_invoice)
        .service(routes::invoice::post_payment)
        .service(routes::invoice::post_refund)
        .service(routes::invoice::post_void)
}
