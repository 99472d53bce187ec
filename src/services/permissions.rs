//! Capability checks expressed as pure functions over the role and the
//! resource-ownership relation, independent of the transport layer.

use uuid::Uuid;

use crate::db::models::{RequestDomain, ServiceRequest, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateRequest,
    RespondToRequest,
    ResolveRequest,
    DecideApproval,
    ListApprovals,
}

/// Whether a role is allowed to perform an action at all. Ownership- and
/// domain-scoping is layered on top via `can_view` / `staff_domain`.
pub fn allows(role: UserRole, action: Action) -> bool {
    match action {
        Action::CreateRequest => matches!(role, UserRole::Citizen),
        Action::RespondToRequest | Action::ResolveRequest => matches!(
            role,
            UserRole::Doctor | UserRole::CityStaff | UserRole::AgricultureOfficer | UserRole::Admin
        ),
        Action::DecideApproval | Action::ListApprovals => matches!(role, UserRole::Admin),
    }
}

/// The request domain a staff role serves, if any.
pub fn staff_domain(role: UserRole) -> Option<RequestDomain> {
    match role {
        UserRole::Doctor => Some(RequestDomain::Healthcare),
        UserRole::CityStaff => Some(RequestDomain::City),
        UserRole::AgricultureOfficer => Some(RequestDomain::Agriculture),
        UserRole::Citizen | UserRole::Admin => None,
    }
}

/// Visibility: citizens see their own records, staff see their domain,
/// admins see everything.
pub fn can_view(viewer_id: Uuid, role: UserRole, request: &ServiceRequest) -> bool {
    match role {
        UserRole::Admin => true,
        UserRole::Citizen => request.citizen_id == viewer_id,
        _ => staff_domain(role) == Some(request.domain),
    }
}

/// Staff may act on a request only inside their own domain; admins anywhere.
pub fn can_act_on(role: UserRole, request: &ServiceRequest) -> bool {
    match role {
        UserRole::Admin => true,
        UserRole::Citizen => false,
        _ => staff_domain(role) == Some(request.domain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::RequestStatus;
    use chrono::Utc;

    fn request(citizen_id: Uuid, domain: RequestDomain) -> ServiceRequest {
        let now = Utc::now();
        ServiceRequest {
            id: Uuid::new_v4(),
            citizen_id,
            assignee_id: None,
            domain,
            subject: "Streetlight out".to_string(),
            description: "Pole 14, Ward 3".to_string(),
            status: RequestStatus::Submitted,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn only_admins_decide_approvals() {
        for role in [
            UserRole::Citizen,
            UserRole::Doctor,
            UserRole::CityStaff,
            UserRole::AgricultureOfficer,
        ] {
            assert!(!allows(role, Action::DecideApproval));
        }
        assert!(allows(UserRole::Admin, Action::DecideApproval));
    }

    #[test]
    fn citizens_see_only_their_own_requests() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let req = request(owner, RequestDomain::City);

        assert!(can_view(owner, UserRole::Citizen, &req));
        assert!(!can_view(stranger, UserRole::Citizen, &req));
    }

    #[test]
    fn staff_visibility_is_domain_scoped() {
        let req = request(Uuid::new_v4(), RequestDomain::Healthcare);
        let viewer = Uuid::new_v4();

        assert!(can_view(viewer, UserRole::Doctor, &req));
        assert!(!can_view(viewer, UserRole::CityStaff, &req));
        assert!(!can_view(viewer, UserRole::AgricultureOfficer, &req));
        assert!(can_view(viewer, UserRole::Admin, &req));
    }

    #[test]
    fn acting_requires_matching_domain() {
        let req = request(Uuid::new_v4(), RequestDomain::Agriculture);

        assert!(can_act_on(UserRole::AgricultureOfficer, &req));
        assert!(!can_act_on(UserRole::Doctor, &req));
        assert!(!can_act_on(UserRole::Citizen, &req));
        assert!(can_act_on(UserRole::Admin, &req));
    }
}
