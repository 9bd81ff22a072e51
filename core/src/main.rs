mod cors;

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::env_config::Config;
use geo::services::detector::{HeaderLookup, RegionDetector};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    // get info
    let is_production = config.is_production();
    let origin = config.cors_allowed_origin.clone();
    let console_logging = config.console_logging_enabled;
    let rate_limit = config.rate_limit_per_second;

    // init logger
    if console_logging {
        logger::setup().expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    // shared by all workers
    let region_detector = web::Data::new(Arc::new(RegionDetector::new(
        HeaderLookup,
        chrono::Duration::hours(config.region_cache_ttl_hours),
    )));
    let rate_limiter = limiter::middleware(rate_limit);

    log::info!(
        "Starting server on {}:{} ({} workers)",
        config.server_host,
        config.server_port,
        config.num_workers
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .app_data(region_detector.clone())
            .wrap(extractor::middleware()) // 4th
            .wrap(rate_limiter.clone()) // 3rd
            .wrap(logger::middleware(console_logging)) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(api_auth::mount_auth())
                    .service(api_billing::mount_webhook())
                    .service(geo::mount_region())
                    .service(api_auth::mount_user().wrap(api_auth::auth_middleware(config_data.clone())))
                    .service(
                        api_billing::mount_billing()
                            .wrap(api_auth::auth_middleware(config_data.clone())),
                    )
                    .service(
                        api_gyms::mount_gyms().wrap(api_auth::auth_middleware(config_data.clone())),
                    )
                    .service(
                        api_gyms::mount_memberships()
                            .wrap(api_auth::auth_middleware(config_data.clone())),
                    )
                    .service(
                        api_payments::mount_payments()
                            .wrap(api_auth::auth_middleware(config_data.clone())),
                    )
                    .service(
                        api_training::mount_training()
                            .wrap(api_auth::auth_middleware(config_data.clone())),
                    )
                    .service(
                        api_training::mount_coaching()
                            .wrap(api_auth::auth_middleware(config_data.clone())),
                    ),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
