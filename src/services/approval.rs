use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use std::sync::Arc;
use tera::Context;
use uuid::Uuid;

use crate::{
    db::{
        models::{
            ApprovalRequest, ApprovalStatus, NewApprovalRequest, NewUser, OtpPurpose, User,
            UserRole,
        },
        schemas::{approval_requests, users},
        DbPool,
    },
    error::{ApiError, ApiResult},
    services::{
        face::FaceProvider,
        jwt::JwtService,
        notify::{Notifier, TemplateKind},
        otp::OtpLedger,
        password::PasswordService,
    },
};

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub role: UserRole,
    /// Optional base64 face image for passwordless login enrolment.
    pub face_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// A decision is final: anything already out of `pending` cannot move again.
fn ensure_pending(status: ApprovalStatus) -> ApiResult<()> {
    if status != ApprovalStatus::Pending {
        return Err(ApiError::InvalidStateTransition(format!(
            "approval request already {:?}",
            status
        )));
    }
    Ok(())
}

/// The gate every login path passes after credentials succeed. A
/// deactivated account looks like bad credentials; an unapproved one gets
/// the explicit pending answer.
fn ensure_login_allowed(user: &User) -> ApiResult<()> {
    if !user.is_active {
        return Err(ApiError::InvalidCredentials);
    }
    if !user.is_approved {
        return Err(ApiError::AccountNotApproved);
    }
    Ok(())
}

/// Governs an account from registration through admin approval or
/// rejection. Coordinates with the OTP ledger, the face provider and the
/// notifier; the notifier is strictly best-effort.
pub struct ApprovalService {
    pool: DbPool,
    ledger: OtpLedger,
    face: Arc<dyn FaceProvider>,
    notifier: Arc<Notifier>,
    jwt: JwtService,
}

impl ApprovalService {
    pub fn new(
        pool: DbPool,
        ledger: OtpLedger,
        face: Arc<dyn FaceProvider>,
        notifier: Arc<Notifier>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            ledger,
            face,
            notifier,
            jwt,
        }
    }

    /// Create the account. Citizens are activated immediately; clearance
    /// roles start unapproved with a pending ApprovalRequest queued for
    /// admin review. A registration OTP goes out either way.
    pub async fn register(&self, registration: Registration) -> ApiResult<User> {
        {
            let mut conn = self.pool.get()?;
            let existing: i64 = users::table
                .filter(
                    users::email
                        .eq(&registration.email)
                        .or(users::username.eq(&registration.username)),
                )
                .count()
                .get_result(&mut conn)?;
            if existing > 0 {
                return Err(ApiError::Validation(
                    "An account with this email or username already exists".to_string(),
                ));
            }
        }

        // Enrol the face before touching the database so upstream failures
        // leave no half-created account behind.
        let face_token = match &registration.face_image {
            Some(image) => Some(self.face.register(image, &registration.username).await?),
            None => None,
        };

        let password_hash = PasswordService::hash_password(&registration.password)?;
        let requires_clearance = registration.role.requires_clearance();

        let new_user = NewUser {
            username: registration.username.clone(),
            email: registration.email.clone(),
            password_hash,
            first_name: registration.first_name.clone(),
            role: registration.role,
            is_approved: !requires_clearance,
            face_token,
        };

        // The account and its pending approval request must land together:
        // a clearance-required user without a request could never be
        // decided.
        let mut conn = self.pool.get()?;
        let user = conn.transaction::<_, ApiError, _>(|conn| {
            let user = diesel::insert_into(users::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result::<User>(conn)?;

            if requires_clearance {
                diesel::insert_into(approval_requests::table)
                    .values(&NewApprovalRequest {
                        user_id: user.id,
                        requested_role: user.role,
                    })
                    .execute(conn)?;
            }

            Ok(user)
        })?;

        if requires_clearance {
            let mut ctx = Context::new();
            ctx.insert("first_name", &user.first_name);
            ctx.insert("role", &user.role);
            self.notify_best_effort(&user, TemplateKind::ApprovalSubmitted, &ctx);
        }

        let code = self.ledger.issue(user.id, OtpPurpose::Registration)?;
        let mut ctx = Context::new();
        ctx.insert("first_name", &user.first_name);
        ctx.insert("otp_code", &code);
        self.notify_best_effort(&user, TemplateKind::OtpRegistration, &ctx);

        info!(
            "Registered user {} ({:?}, approved={})",
            user.username, user.role, user.is_approved
        );
        Ok(user)
    }

    /// Redeem the registration OTP sent at sign-up.
    pub fn verify_registration(&self, email: &str, code: &str) -> ApiResult<()> {
        let user = self.find_by_email(email)?.ok_or(ApiError::InvalidOrExpiredCode)?;
        self.ledger.verify(user.id, OtpPurpose::Registration, code)
    }

    /// Password login. Approval gating applies after the credential check so
    /// a pending account with correct credentials still cannot log in.
    pub fn login(&self, email: &str, password: &str) -> ApiResult<(User, String)> {
        let user = self.find_by_email(email)?.ok_or(ApiError::InvalidCredentials)?;

        if !PasswordService::verify_password(password, &user.password_hash)? {
            return Err(ApiError::InvalidCredentials);
        }
        self.issue_session(user)
    }

    /// Biometric login via the face provider. The adapter's retryable
    /// upstream errors pass through untouched; an unverified comparison is
    /// reported as plain invalid credentials.
    pub async fn face_login(&self, email: &str, image_base64: &str) -> ApiResult<(User, String)> {
        let user = self.find_by_email(email)?.ok_or(ApiError::InvalidCredentials)?;

        let stored_token = user
            .face_token
            .as_deref()
            .ok_or(ApiError::InvalidCredentials)?;

        let result = self.face.verify(image_base64, stored_token).await?;
        if result.mock {
            warn!("Face login for {} verified by mock fixture", user.username);
        }
        if !result.verified {
            return Err(ApiError::InvalidCredentials);
        }
        self.issue_session(user)
    }

    fn issue_session(&self, user: User) -> ApiResult<(User, String)> {
        ensure_login_allowed(&user)?;
        let token = self.jwt.generate_access_token(user.id, &user.email, user.role)?;
        Ok((user, token))
    }

    pub fn list_pending(&self) -> ApiResult<Vec<ApprovalRequest>> {
        let mut conn = self.pool.get()?;
        let pending = approval_requests::table
            .filter(approval_requests::status.eq(ApprovalStatus::Pending))
            .order(approval_requests::created_at.asc())
            .load::<ApprovalRequest>(&mut conn)?;
        Ok(pending)
    }

    /// Apply an admin decision. The transition out of `pending` happens
    /// exactly once; approval flips the user's gate in the same
    /// transaction. The decision notification is sent after commit and
    /// never affects the outcome.
    pub fn decide(
        &self,
        request_id: Uuid,
        decision: Decision,
        notes: Option<String>,
    ) -> ApiResult<ApprovalRequest> {
        let mut conn = self.pool.get()?;

        let (request, user) = conn.transaction::<_, ApiError, _>(|conn| {
            let request = approval_requests::table
                .find(request_id)
                .first::<ApprovalRequest>(conn)
                .optional()?
                .ok_or(ApiError::NotFound)?;

            ensure_pending(request.status)?;

            let status = match decision {
                Decision::Approve => ApprovalStatus::Approved,
                Decision::Reject => ApprovalStatus::Rejected,
            };

            let request = diesel::update(approval_requests::table.find(request_id))
                .set((
                    approval_requests::status.eq(status),
                    approval_requests::notes.eq(notes.clone()),
                    approval_requests::decided_at.eq(Utc::now()),
                ))
                .returning(ApprovalRequest::as_returning())
                .get_result::<ApprovalRequest>(conn)?;

            if decision == Decision::Approve {
                diesel::update(users::table.find(request.user_id))
                    .set((
                        users::is_approved.eq(true),
                        users::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
            }

            let user = users::table.find(request.user_id).first::<User>(conn)?;
            Ok((request, user))
        })?;

        let kind = match decision {
            Decision::Approve => TemplateKind::ApprovalApproved,
            Decision::Reject => TemplateKind::ApprovalRejected,
        };
        let mut ctx = Context::new();
        ctx.insert("first_name", &user.first_name);
        ctx.insert(
            "notes",
            request.notes.as_deref().unwrap_or("No additional details provided."),
        );
        self.notify_best_effort(&user, kind, &ctx);

        info!(
            "Approval request {} for {} decided: {:?}",
            request.id, user.username, request.status
        );
        Ok(request)
    }

    /// Issue a password-reset code. An unknown address succeeds silently so
    /// the endpoint cannot be used to probe for accounts.
    pub fn request_password_reset(&self, email: &str) -> ApiResult<()> {
        let Some(user) = self.find_by_email(email)? else {
            info!("Password reset requested for unknown address");
            return Ok(());
        };

        let code = self.ledger.issue(user.id, OtpPurpose::PasswordReset)?;
        let mut ctx = Context::new();
        ctx.insert("first_name", &user.first_name);
        ctx.insert("otp_code", &code);
        self.notify_best_effort(&user, TemplateKind::OtpPasswordReset, &ctx);
        Ok(())
    }

    /// Redeem a password-reset code and set the new credential. The code's
    /// own lifecycle is the only "reset in progress" state.
    pub fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        let user = self.find_by_email(email)?.ok_or(ApiError::InvalidOrExpiredCode)?;

        self.ledger.verify(user.id, OtpPurpose::PasswordReset, code)?;

        let password_hash = PasswordService::hash_password(new_password)?;
        let mut conn = self.pool.get()?;
        diesel::update(users::table.find(user.id))
            .set((
                users::password_hash.eq(password_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        info!("Password reset completed for {}", user.username);
        Ok(())
    }

    pub fn find_by_id(&self, user_id: Uuid) -> ApiResult<Option<User>> {
        let mut conn = self.pool.get()?;
        let user = users::table
            .find(user_id)
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user)
    }

    fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let mut conn = self.pool.get()?;
        let user = users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user)
    }

    fn notify_best_effort(&self, user: &User, kind: TemplateKind, ctx: &Context) {
        if let Err(e) = self.notifier.send(&user.email, &user.first_name, kind, ctx) {
            warn!(
                "Failed to send {:?} notification to {}: {}",
                kind, user.email, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user(role: UserRole, is_approved: bool, is_active: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "asha".to_string(),
            email: "asha@example.org".to_string(),
            password_hash: "x".to_string(),
            first_name: "Asha".to_string(),
            role,
            is_approved,
            is_active,
            face_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn decisions_are_final() {
        assert!(ensure_pending(ApprovalStatus::Pending).is_ok());

        for decided in [ApprovalStatus::Approved, ApprovalStatus::Rejected] {
            assert!(matches!(
                ensure_pending(decided),
                Err(ApiError::InvalidStateTransition(_))
            ));
        }
    }

    #[test]
    fn unapproved_user_cannot_log_in_until_approved() {
        let mut user = sample_user(UserRole::Doctor, false, true);
        assert!(matches!(
            ensure_login_allowed(&user),
            Err(ApiError::AccountNotApproved)
        ));

        user.is_approved = true;
        assert!(ensure_login_allowed(&user).is_ok());
    }

    #[test]
    fn deactivated_user_is_indistinguishable_from_bad_credentials() {
        let user = sample_user(UserRole::Citizen, true, false);
        assert!(matches!(
            ensure_login_allowed(&user),
            Err(ApiError::InvalidCredentials)
        ));

        // Deactivation wins over the approval gate.
        let user = sample_user(UserRole::Doctor, false, false);
        assert!(matches!(
            ensure_login_allowed(&user),
            Err(ApiError::InvalidCredentials)
        ));
    }

    // Registration touches two tables; these run only against a reachable
    // database, like the ledger tests.
    mod with_database {
        use super::*;
        use crate::config::{EmailConfig, JwtConfig};
        use crate::services::face::MockProvider;
        use diesel::r2d2::{ConnectionManager, Pool};

        fn test_service() -> Option<(ApprovalService, DbPool)> {
            let url = std::env::var("TEST_DATABASE_URL").ok()?;
            let manager = ConnectionManager::<diesel::PgConnection>::new(url);
            let pool: DbPool = Pool::builder().max_size(2).build(manager).ok()?;

            let notifier = Arc::new(
                Notifier::new(EmailConfig {
                    smtp_host: "localhost".to_string(),
                    smtp_port: 2525,
                    smtp_username: String::new(),
                    smtp_password: String::new(),
                    from_email: "noreply@sevasetu.gov.in".to_string(),
                    from_name: "Seva Setu".to_string(),
                })
                .ok()?,
            );
            let jwt = JwtService::new(JwtConfig {
                secret: "test-secret".to_string(),
                access_token_expiry: 3600,
            });

            let service = ApprovalService::new(
                pool.clone(),
                OtpLedger::new(pool.clone()),
                Arc::new(MockProvider),
                notifier,
                jwt,
            );
            Some((service, pool))
        }

        #[tokio::test]
        async fn clearance_registration_creates_user_and_pending_request_together() {
            let Some((service, pool)) = test_service() else { return };

            let suffix = Uuid::new_v4();
            let user = service
                .register(Registration {
                    username: format!("doc-{}", suffix),
                    email: format!("doc-{}@example.org", suffix),
                    password: "hunter2hunter2".to_string(),
                    first_name: "Meera".to_string(),
                    role: UserRole::Doctor,
                    face_image: None,
                })
                .await
                .unwrap();

            assert!(!user.is_approved);

            let mut conn = pool.get().unwrap();
            let pending: Vec<ApprovalRequest> = approval_requests::table
                .filter(approval_requests::user_id.eq(user.id))
                .filter(approval_requests::status.eq(ApprovalStatus::Pending))
                .load(&mut conn)
                .unwrap();
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].requested_role, UserRole::Doctor);
        }
    }
}
