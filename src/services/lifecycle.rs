use chrono::Utc;
use diesel::prelude::*;
use log::info;
use uuid::Uuid;

use crate::{
    db::{
        models::{
            NewRequestResponse, NewServiceRequest, RequestDomain, RequestResponse, RequestStatus,
            ServiceRequest, User, UserRole,
        },
        schemas::{request_responses, service_requests},
        DbPool,
    },
    error::{ApiError, ApiResult},
    services::permissions,
};

fn ensure_open(status: RequestStatus) -> ApiResult<()> {
    if status.is_terminal() {
        return Err(ApiError::InvalidStateTransition(format!(
            "request already {:?}",
            status
        )));
    }
    Ok(())
}

/// The shared submitted -> in_progress -> resolved progression behind
/// appointments, complaints and farmer queries. The first staff response
/// moves a request into progress; resolution is terminal and stamps
/// completed_at.
#[derive(Clone)]
pub struct RequestService {
    pool: DbPool,
}

impl RequestService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(
        &self,
        citizen: &User,
        domain: RequestDomain,
        subject: String,
        description: String,
    ) -> ApiResult<ServiceRequest> {
        if !permissions::allows(citizen.role, permissions::Action::CreateRequest) {
            return Err(ApiError::InsufficientPermissions);
        }

        let mut conn = self.pool.get()?;
        let request = diesel::insert_into(service_requests::table)
            .values(&NewServiceRequest {
                citizen_id: citizen.id,
                domain,
                subject,
                description,
            })
            .returning(ServiceRequest::as_returning())
            .get_result::<ServiceRequest>(&mut conn)?;

        info!("Service request {} submitted ({:?})", request.id, domain);
        Ok(request)
    }

    /// Attach a staff response. The first response on a submitted request
    /// assigns the responder and moves the request to in_progress.
    pub fn respond(
        &self,
        staff: &User,
        request_id: Uuid,
        message: String,
    ) -> ApiResult<RequestResponse> {
        if !permissions::allows(staff.role, permissions::Action::RespondToRequest) {
            return Err(ApiError::InsufficientPermissions);
        }

        let mut conn = self.pool.get()?;
        conn.transaction::<_, ApiError, _>(|conn| {
            let request = service_requests::table
                .find(request_id)
                .first::<ServiceRequest>(conn)
                .optional()?
                .ok_or(ApiError::NotFound)?;

            if !permissions::can_act_on(staff.role, &request) {
                return Err(ApiError::InsufficientPermissions);
            }
            ensure_open(request.status)?;

            let response = diesel::insert_into(request_responses::table)
                .values(&NewRequestResponse {
                    request_id,
                    staff_id: staff.id,
                    message,
                })
                .returning(RequestResponse::as_returning())
                .get_result::<RequestResponse>(conn)?;

            if request.status == RequestStatus::Submitted {
                diesel::update(service_requests::table.find(request_id))
                    .set((
                        service_requests::status.eq(RequestStatus::InProgress),
                        service_requests::assignee_id.eq(staff.id),
                        service_requests::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
            }

            Ok(response)
        })
    }

    /// Terminal transition: no request ever leaves resolved, and
    /// completed_at is set here and only here.
    pub fn resolve(&self, staff: &User, request_id: Uuid) -> ApiResult<ServiceRequest> {
        if !permissions::allows(staff.role, permissions::Action::ResolveRequest) {
            return Err(ApiError::InsufficientPermissions);
        }

        let mut conn = self.pool.get()?;
        conn.transaction::<_, ApiError, _>(|conn| {
            let request = service_requests::table
                .find(request_id)
                .first::<ServiceRequest>(conn)
                .optional()?
                .ok_or(ApiError::NotFound)?;

            if !permissions::can_act_on(staff.role, &request) {
                return Err(ApiError::InsufficientPermissions);
            }
            ensure_open(request.status)?;

            let now = Utc::now();
            let resolved = diesel::update(service_requests::table.find(request_id))
                .set((
                    service_requests::status.eq(RequestStatus::Resolved),
                    service_requests::completed_at.eq(now),
                    service_requests::updated_at.eq(now),
                ))
                .returning(ServiceRequest::as_returning())
                .get_result::<ServiceRequest>(conn)?;

            info!("Service request {} resolved", resolved.id);
            Ok(resolved)
        })
    }

    /// Role-scoped listing: citizens get their own records, staff their
    /// domain, admins everything.
    pub fn list_for(&self, viewer: &User) -> ApiResult<Vec<ServiceRequest>> {
        let mut conn = self.pool.get()?;

        let requests = match viewer.role {
            UserRole::Admin => service_requests::table
                .order(service_requests::created_at.desc())
                .load::<ServiceRequest>(&mut conn)?,
            UserRole::Citizen => service_requests::table
                .filter(service_requests::citizen_id.eq(viewer.id))
                .order(service_requests::created_at.desc())
                .load::<ServiceRequest>(&mut conn)?,
            _ => {
                let domain = permissions::staff_domain(viewer.role)
                    .ok_or(ApiError::InsufficientPermissions)?;
                service_requests::table
                    .filter(service_requests::domain.eq(domain))
                    .order(service_requests::created_at.desc())
                    .load::<ServiceRequest>(&mut conn)?
            }
        };

        Ok(requests)
    }

    pub fn get_for(&self, viewer: &User, request_id: Uuid) -> ApiResult<ServiceRequest> {
        let mut conn = self.pool.get()?;
        let request = service_requests::table
            .find(request_id)
            .first::<ServiceRequest>(&mut conn)
            .optional()?
            .ok_or(ApiError::NotFound)?;

        if !permissions::can_view(viewer.id, viewer.role, &request) {
            // Hide existence from viewers outside the record's scope.
            return Err(ApiError::NotFound);
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_statuses_accept_transitions() {
        assert!(ensure_open(RequestStatus::Submitted).is_ok());
        assert!(ensure_open(RequestStatus::InProgress).is_ok());
    }

    #[test]
    fn resolved_is_terminal() {
        assert!(matches!(
            ensure_open(RequestStatus::Resolved),
            Err(ApiError::InvalidStateTransition(_))
        ));
    }
}
