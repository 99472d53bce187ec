use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use log::debug;
use rand::Rng;
use uuid::Uuid;

use crate::{
    db::{
        models::{NewOneTimeCode, OneTimeCode, OtpPurpose},
        schemas::one_time_codes,
        DbPool,
    },
    error::{ApiError, ApiResult},
};

/// Codes expire ten minutes after issuance.
const CODE_TTL_MINUTES: i64 = 10;

/// Issues, verifies and invalidates short-lived one-time codes, keyed by
/// (user, purpose). At most one unverified, unexpired code exists per pair:
/// issuing supersedes any earlier unverified codes in the same transaction.
#[derive(Clone)]
pub struct OtpLedger {
    pool: DbPool,
}

impl OtpLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Generate a uniformly random 6-digit code. Leading zeros are allowed,
    /// so the code is always handled as a fixed-width string.
    pub fn generate_code() -> String {
        let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{:06}", n)
    }

    pub fn expiry_from(issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::minutes(CODE_TTL_MINUTES)
    }

    /// Issue a fresh code for (user, purpose), superseding any unverified
    /// codes for the same pair. Returns the code for out-of-band delivery.
    pub fn issue(&self, user_id: Uuid, purpose: OtpPurpose) -> ApiResult<String> {
        let mut conn = self.pool.get()?;
        let code = Self::generate_code();
        let new_code = NewOneTimeCode {
            user_id,
            purpose,
            code: code.clone(),
            expires_at: Self::expiry_from(Utc::now()),
        };

        // Delete-then-insert must be atomic so concurrent issuance for the
        // same pair cannot leave two active codes visible.
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(
                one_time_codes::table
                    .filter(one_time_codes::user_id.eq(user_id))
                    .filter(one_time_codes::purpose.eq(purpose))
                    .filter(one_time_codes::is_verified.eq(false)),
            )
            .execute(conn)?;

            diesel::insert_into(one_time_codes::table)
                .values(&new_code)
                .execute(conn)?;

            Ok(())
        })?;

        debug!("Issued {:?} code for user {}", purpose, user_id);
        Ok(code)
    }

    /// Verify a code for (user, purpose). Succeeds only against an exact,
    /// unverified, unexpired match, which is then marked verified. Every
    /// failure cause reports the same error so callers cannot enumerate
    /// which sub-condition applied.
    pub fn verify(&self, user_id: Uuid, purpose: OtpPurpose, code: &str) -> ApiResult<()> {
        let mut conn = self.pool.get()?;

        let record = one_time_codes::table
            .filter(one_time_codes::user_id.eq(user_id))
            .filter(one_time_codes::purpose.eq(purpose))
            .filter(one_time_codes::code.eq(code))
            .filter(one_time_codes::is_verified.eq(false))
            .first::<OneTimeCode>(&mut conn)
            .optional()?;

        let record = record.ok_or(ApiError::InvalidOrExpiredCode)?;

        if !record.accepts(code, Utc::now()) {
            return Err(ApiError::InvalidOrExpiredCode);
        }

        // Guarded redemption: the is_verified filter makes the update the
        // single point of consumption, so concurrent verifies of the same
        // code redeem it at most once.
        let redeemed = diesel::update(
            one_time_codes::table
                .filter(one_time_codes::id.eq(record.id))
                .filter(one_time_codes::is_verified.eq(false)),
        )
        .set(one_time_codes::is_verified.eq(true))
        .execute(&mut conn)?;

        if redeemed == 0 {
            return Err(ApiError::InvalidOrExpiredCode);
        }

        Ok(())
    }

    /// Storage hygiene: expiry is enforced at verification time, so this is
    /// optional. Deletes expired and already-verified rows.
    pub fn sweep_expired(&self) -> ApiResult<usize> {
        let mut conn = self.pool.get()?;

        let deleted = diesel::delete(
            one_time_codes::table
                .filter(one_time_codes::expires_at.lt(Utc::now()))
                .or_filter(one_time_codes::is_verified.eq(true)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_fixed_width_decimal() {
        for _ in 0..200 {
            let code = OtpLedger::generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn expiry_is_ten_minutes_from_issuance() {
        let issued = Utc::now();
        let expires = OtpLedger::expiry_from(issued);
        assert_eq!((expires - issued).num_minutes(), 10);
    }

    // Storage-backed behaviour (supersession, double-verify rejection) needs
    // a live database; these run only when one is reachable.
    mod with_database {
        use super::super::*;
        use diesel::r2d2::{ConnectionManager, Pool};

        fn test_pool() -> Option<DbPool> {
            let url = std::env::var("TEST_DATABASE_URL").ok()?;
            let manager = ConnectionManager::<diesel::PgConnection>::new(url);
            Pool::builder().max_size(2).build(manager).ok()
        }

        fn insert_user(pool: &DbPool) -> Uuid {
            use crate::db::models::{NewUser, User, UserRole};
            use crate::db::schemas::users;

            let mut conn = pool.get().unwrap();
            let user = NewUser {
                username: format!("otp-test-{}", Uuid::new_v4()),
                email: format!("otp-test-{}@example.org", Uuid::new_v4()),
                password_hash: "x".to_string(),
                first_name: "Test".to_string(),
                role: UserRole::Citizen,
                is_approved: true,
                face_token: None,
            };
            diesel::insert_into(users::table)
                .values(&user)
                .returning(User::as_returning())
                .get_result::<User>(&mut conn)
                .unwrap()
                .id
        }

        #[test]
        fn reissue_leaves_at_most_one_unverified_code() {
            let Some(pool) = test_pool() else { return };
            let user_id = insert_user(&pool);
            let ledger = OtpLedger::new(pool.clone());

            ledger.issue(user_id, OtpPurpose::Registration).unwrap();
            let second = ledger.issue(user_id, OtpPurpose::Registration).unwrap();

            let mut conn = pool.get().unwrap();
            let active: Vec<OneTimeCode> = one_time_codes::table
                .filter(one_time_codes::user_id.eq(user_id))
                .filter(one_time_codes::purpose.eq(OtpPurpose::Registration))
                .filter(one_time_codes::is_verified.eq(false))
                .load(&mut conn)
                .unwrap();

            assert_eq!(active.len(), 1);
            assert_eq!(active[0].code, second);
        }

        #[test]
        fn verify_consumes_the_code_exactly_once() {
            let Some(pool) = test_pool() else { return };
            let user_id = insert_user(&pool);
            let ledger = OtpLedger::new(pool);

            let code = ledger.issue(user_id, OtpPurpose::PasswordReset).unwrap();

            assert!(matches!(
                ledger.verify(user_id, OtpPurpose::PasswordReset, "000000"),
                Err(ApiError::InvalidOrExpiredCode)
            ));
            assert!(ledger
                .verify(user_id, OtpPurpose::PasswordReset, &code)
                .is_ok());
            assert!(matches!(
                ledger.verify(user_id, OtpPurpose::PasswordReset, &code),
                Err(ApiError::InvalidOrExpiredCode)
            ));
        }

        #[test]
        fn concurrent_verifies_redeem_the_code_at_most_once() {
            let Some(pool) = test_pool() else { return };
            let user_id = insert_user(&pool);
            let ledger = OtpLedger::new(pool);

            let code = ledger.issue(user_id, OtpPurpose::Registration).unwrap();

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let ledger = ledger.clone();
                    let code = code.clone();
                    std::thread::spawn(move || {
                        ledger
                            .verify(user_id, OtpPurpose::Registration, &code)
                            .is_ok()
                    })
                })
                .collect();

            let successes = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(successes, 1);
        }

        #[test]
        fn purposes_are_isolated() {
            let Some(pool) = test_pool() else { return };
            let user_id = insert_user(&pool);
            let ledger = OtpLedger::new(pool);

            let code = ledger.issue(user_id, OtpPurpose::Registration).unwrap();
            assert!(matches!(
                ledger.verify(user_id, OtpPurpose::PasswordReset, &code),
                Err(ApiError::InvalidOrExpiredCode)
            ));
            assert!(ledger
                .verify(user_id, OtpPurpose::Registration, &code)
                .is_ok());
        }
    }
}
