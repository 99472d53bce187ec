pub mod approvals;
pub mod auth;
pub mod health;
pub mod requests;

use actix_web::web;

use crate::middleware::AuthMiddleware;
use crate::services::jwt::JwtService;

pub fn configure(cfg: &mut web::ServiceConfig, jwt_service: JwtService) {
    cfg.route("/health", web::get().to(health::health));

    cfg.service(
        web::scope("/api/auth")
            .route("/register", web::post().to(auth::register))
            .route("/verify", web::post().to(auth::verify))
            .route("/login", web::post().to(auth::login))
            .route("/login/face", web::post().to(auth::face_login))
            .route(
                "/password-reset/request",
                web::post().to(auth::request_password_reset),
            )
            .route(
                "/password-reset/confirm",
                web::post().to(auth::confirm_password_reset),
            )
            .service(
                web::scope("")
                    .wrap(AuthMiddleware::new(jwt_service.clone()))
                    .route("/profile", web::get().to(auth::profile)),
            ),
    );

    cfg.service(
        web::scope("/api/approvals")
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .route("", web::get().to(approvals::list_pending))
            .route("/{id}/decide", web::post().to(approvals::decide)),
    );

    cfg.service(
        web::scope("/api/requests")
            .wrap(AuthMiddleware::new(jwt_service))
            .route("", web::post().to(requests::create))
            .route("", web::get().to(requests::list))
            .route("/{id}", web::get().to(requests::get))
            .route("/{id}/respond", web::post().to(requests::respond))
            .route("/{id}/resolve", web::post().to(requests::resolve)),
    );
}
