use actix_cors::Cors;
use actix_web::{http, web::Data, App, HttpServer};
use dotenv::dotenv;
use log::info;
use std::sync::Arc;

use seva_setu_api::{
    config::AppConfig,
    db,
    routes,
    services::{
        approval::ApprovalService, face, jwt::JwtService, lifecycle::RequestService,
        notify::Notifier, otp::OtpLedger,
    },
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::new().expect("Failed to load configuration");

    let pool = db::establish_connection(&config.database)
        .await
        .expect("Failed to connect to database");

    let jwt_service = JwtService::new(config.jwt.clone());
    let ledger = OtpLedger::new(pool.clone());
    // Mode is fixed at startup; mock mode logs its own warning.
    let face_provider = face::provider_from_config(&config.face);
    let notifier =
        Arc::new(Notifier::new(config.email.clone()).expect("Failed to initialise notifier"));

    let approval_service = Data::new(ApprovalService::new(
        pool.clone(),
        ledger,
        face_provider,
        notifier,
        jwt_service.clone(),
    ));
    let request_service = Data::new(RequestService::new(pool.clone()));

    let bind_addr = (config.host.clone(), config.port);
    info!(
        "Starting Seva Setu API on {}:{} ({})",
        config.host, config.port, config.environment
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![http::header::AUTHORIZATION, http::header::ACCEPT])
            .allowed_header(http::header::CONTENT_TYPE)
            .max_age(3600);

        let jwt = jwt_service.clone();
        App::new()
            .wrap(cors)
            .app_data(Data::new(pool.clone()))
            .app_data(approval_service.clone())
            .app_data(request_service.clone())
            .configure(|cfg| routes::configure(cfg, jwt))
    })
    .bind(bind_addr)?
    .run()
    .await
}
