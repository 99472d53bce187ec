use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::models::{RequestDomain, User},
    error::{ApiError, ApiResult},
    middleware::claims_from_request,
    services::{approval::ApprovalService, lifecycle::RequestService},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRequestBody {
    pub domain: RequestDomain,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RespondBody {
    #[validate(length(min = 1))]
    pub message: String,
}

fn current_user(req: &HttpRequest, approval: &ApprovalService) -> ApiResult<User> {
    let claims = claims_from_request(req).map_err(|_| ApiError::InvalidCredentials)?;
    approval
        .find_by_id(claims.user_id()?)?
        .ok_or(ApiError::InvalidCredentials)
}

pub async fn create(
    req: HttpRequest,
    body: web::Json<CreateRequestBody>,
    requests: web::Data<RequestService>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let user = current_user(&req, &approval)?;
    let body = body.into_inner();

    let request = requests.create(&user, body.domain, body.subject, body.description)?;
    Ok(HttpResponse::Created().json(request))
}

pub async fn list(
    req: HttpRequest,
    requests: web::Data<RequestService>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    let user = current_user(&req, &approval)?;
    let visible = requests.list_for(&user)?;
    Ok(HttpResponse::Ok().json(visible))
}

pub async fn get(
    req: HttpRequest,
    path: web::Path<Uuid>,
    requests: web::Data<RequestService>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    let user = current_user(&req, &approval)?;
    let request = requests.get_for(&user, path.into_inner())?;
    Ok(HttpResponse::Ok().json(request))
}

pub async fn respond(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<RespondBody>,
    requests: web::Data<RequestService>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    body.validate()?;
    let user = current_user(&req, &approval)?;

    let response = requests.respond(&user, path.into_inner(), body.into_inner().message)?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn resolve(
    req: HttpRequest,
    path: web::Path<Uuid>,
    requests: web::Data<RequestService>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    let user = current_user(&req, &approval)?;

    let resolved = requests.resolve(&user, path.into_inner())?;
    Ok(HttpResponse::Ok().json(resolved))
}
