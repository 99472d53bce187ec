use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::schemas::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, DbEnum, PartialEq, Eq)]
#[db_enum(existing_type_path = "crate::db::schemas::sql_types::UserRole")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Citizen,
    Doctor,
    CityStaff,
    AgricultureOfficer,
    Admin,
}

impl UserRole {
    /// Roles other than plain citizens need an admin decision before they
    /// can authenticate. Admin accounts are provisioned out of band but
    /// still go through the same gate when self-registered.
    pub fn requires_clearance(&self) -> bool {
        !matches!(self, UserRole::Citizen)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, DbEnum, PartialEq, Eq)]
#[db_enum(existing_type_path = "crate::db::schemas::sql_types::OtpPurpose")]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Registration,
    PasswordReset,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, DbEnum, PartialEq, Eq)]
#[db_enum(existing_type_path = "crate::db::schemas::sql_types::ApprovalStatus")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, DbEnum, PartialEq, Eq)]
#[db_enum(existing_type_path = "crate::db::schemas::sql_types::RequestStatus")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    InProgress,
    Resolved,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Resolved)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        match (self, next) {
            (RequestStatus::Submitted, RequestStatus::InProgress) => true,
            (RequestStatus::Submitted, RequestStatus::Resolved) => true,
            (RequestStatus::InProgress, RequestStatus::Resolved) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, DbEnum, PartialEq, Eq)]
#[db_enum(existing_type_path = "crate::db::schemas::sql_types::RequestDomain")]
#[serde(rename_all = "snake_case")]
pub enum RequestDomain {
    Healthcare,
    City,
    Agriculture,
}

// User models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub role: UserRole,
    pub is_approved: bool,
    pub is_active: bool,
    pub face_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub role: UserRole,
    pub is_approved: bool,
    pub face_token: Option<String>,
}

// OTP models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = one_time_codes)]
pub struct OneTimeCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: OtpPurpose,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl OneTimeCode {
    /// A code is redeemable for `candidate` only while unverified, unexpired
    /// and an exact match. All failure causes are indistinguishable to the
    /// caller.
    pub fn accepts(&self, candidate: &str, now: DateTime<Utc>) -> bool {
        !self.is_verified && now < self.expires_at && self.code == candidate
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = one_time_codes)]
pub struct NewOneTimeCode {
    pub user_id: Uuid,
    pub purpose: OtpPurpose,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

// Approval models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = approval_requests)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub requested_role: UserRole,
    pub status: ApprovalStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = approval_requests)]
pub struct NewApprovalRequest {
    pub user_id: Uuid,
    pub requested_role: UserRole,
}

// Service request models
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = service_requests)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub citizen_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub domain: RequestDomain,
    pub subject: String,
    pub description: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = service_requests)]
pub struct NewServiceRequest {
    pub citizen_id: Uuid,
    pub domain: RequestDomain,
    pub subject: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Selectable)]
#[diesel(table_name = request_responses)]
pub struct RequestResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub staff_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = request_responses)]
pub struct NewRequestResponse {
    pub request_id: Uuid,
    pub staff_id: Uuid,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_code(code: &str, is_verified: bool, expires_in: Duration) -> OneTimeCode {
        let now = Utc::now();
        OneTimeCode {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            purpose: OtpPurpose::Registration,
            code: code.to_string(),
            expires_at: now + expires_in,
            is_verified,
            created_at: now,
        }
    }

    #[test]
    fn only_citizens_skip_clearance() {
        assert!(!UserRole::Citizen.requires_clearance());
        assert!(UserRole::Doctor.requires_clearance());
        assert!(UserRole::CityStaff.requires_clearance());
        assert!(UserRole::AgricultureOfficer.requires_clearance());
        assert!(UserRole::Admin.requires_clearance());
    }

    #[test]
    fn code_accepts_exact_unexpired_unverified_match() {
        let otp = sample_code("042913", false, Duration::minutes(10));
        assert!(otp.accepts("042913", Utc::now()));
    }

    #[test]
    fn code_rejects_wrong_expired_or_verified() {
        let now = Utc::now();

        let otp = sample_code("042913", false, Duration::minutes(10));
        assert!(!otp.accepts("000000", now));

        let expired = sample_code("042913", false, Duration::minutes(-1));
        assert!(!expired.accepts("042913", now));

        let spent = sample_code("042913", true, Duration::minutes(10));
        assert!(!spent.accepts("042913", now));
    }

    #[test]
    fn approval_pending_is_the_only_non_terminal_status() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }

    #[test]
    fn request_status_never_leaves_terminal() {
        assert!(RequestStatus::Submitted.can_transition_to(RequestStatus::InProgress));
        assert!(RequestStatus::Submitted.can_transition_to(RequestStatus::Resolved));
        assert!(RequestStatus::InProgress.can_transition_to(RequestStatus::Resolved));

        assert!(!RequestStatus::Resolved.can_transition_to(RequestStatus::InProgress));
        assert!(!RequestStatus::Resolved.can_transition_to(RequestStatus::Submitted));
        assert!(!RequestStatus::Resolved.can_transition_to(RequestStatus::Resolved));
        assert!(!RequestStatus::InProgress.can_transition_to(RequestStatus::Submitted));
    }
}
