use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::{
    db::models::UserRole,
    error::{ApiError, ApiResult},
    middleware::claims_from_request,
    services::approval::{ApprovalService, Registration},
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    pub role: UserRole,
    /// Base64-encoded face image for biometric login enrolment.
    pub face_image: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginBody {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FaceLoginBody {
    #[validate(email)]
    pub email: String,
    pub image: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyBody {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequestBody {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetConfirmBody {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub code: String,
    #[validate(length(min = 8))]
    pub new_password: String,
}

pub async fn register(
    body: web::Json<RegisterBody>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let body = body.into_inner();

    let user = approval
        .register(Registration {
            username: body.username,
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            role: body.role,
            face_image: body.face_image,
        })
        .await?;

    let message = if user.is_approved {
        "Registration successful. Verify the code sent to your email."
    } else {
        "Registration submitted for administrator approval. Verify the code sent to your email."
    };

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": message,
        "user": user,
    })))
}

pub async fn verify(
    body: web::Json<VerifyBody>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    approval.verify_registration(&body.email, &body.code)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Email verified successfully"
    })))
}

pub async fn login(
    body: web::Json<LoginBody>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let (user, token) = approval.login(&body.email, &body.password)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "user": user,
    })))
}

pub async fn face_login(
    body: web::Json<FaceLoginBody>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let (user, token) = approval.face_login(&body.email, &body.image).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "user": user,
    })))
}

pub async fn request_password_reset(
    body: web::Json<ResetRequestBody>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    approval.request_password_reset(&body.email)?;

    // Same response whether or not the account exists.
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "If the account exists, a reset code has been sent"
    })))
}

pub async fn confirm_password_reset(
    body: web::Json<ResetConfirmBody>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    approval.confirm_password_reset(&body.email, &body.code, &body.new_password)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Password updated successfully"
    })))
}

pub async fn profile(
    req: HttpRequest,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    let claims = claims_from_request(&req).map_err(|_| ApiError::InvalidCredentials)?;
    let user = approval
        .find_by_id(claims.user_id()?)?
        .ok_or(ApiError::NotFound)?;

    Ok(HttpResponse::Ok().json(user))
}
