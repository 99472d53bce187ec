use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::claims_from_request,
    services::{
        approval::{ApprovalService, Decision},
        permissions::{allows, Action},
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBodyKind {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct DecideBody {
    pub decision: DecisionBodyKind,
    pub notes: Option<String>,
}

fn require_admin(req: &HttpRequest, action: Action) -> ApiResult<()> {
    let claims = claims_from_request(req).map_err(|_| ApiError::InvalidCredentials)?;
    if !allows(claims.role, action) {
        return Err(ApiError::InsufficientPermissions);
    }
    Ok(())
}

pub async fn list_pending(
    req: HttpRequest,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    require_admin(&req, Action::ListApprovals)?;

    let pending = approval.list_pending()?;
    Ok(HttpResponse::Ok().json(pending))
}

pub async fn decide(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<DecideBody>,
    approval: web::Data<ApprovalService>,
) -> ApiResult<HttpResponse> {
    require_admin(&req, Action::DecideApproval)?;

    let decision = match body.decision {
        DecisionBodyKind::Approve => Decision::Approve,
        DecisionBodyKind::Reject => Decision::Reject,
    };

    let request = approval.decide(path.into_inner(), decision, body.into_inner().notes)?;
    Ok(HttpResponse::Ok().json(request))
}
