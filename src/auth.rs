//! Doctor accounts and bearer sessions.
//!
//! Credentials are email + password. A successful login issues an opaque
//! bearer token; only its SHA-256 hash is stored, with an expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::crypto::{self, CryptoError};
use crate::db::{self, DatabaseError};
use crate::models::Doctor;
use crate::validation;

/// Consecutive failures before an email is locked out.
const MAX_LOGIN_FAILURES: u32 = 5;
/// Failures older than this are forgotten.
const FAILURE_WINDOW: Duration = Duration::from_secs(15 * 60);
/// How long a locked email stays locked.
const LOCKOUT_DURATION: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Too many failed attempts")]
    LockedOut { retry_after: u64 },
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Credential error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDoctor {
    pub email: String,
    pub password: String,
    #[serde(alias = "first_name")]
    pub first_name: String,
    #[serde(alias = "last_name")]
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub doctor: Doctor,
}

/// Create a doctor account.
pub fn register(
    conn: &Connection,
    request: &RegisterDoctor,
    hash_iterations: u32,
) -> Result<Doctor, AuthError> {
    let email = validation::normalize_email(&request.email).map_err(AuthError::Validation)?;
    validation::check_password(&request.password).map_err(AuthError::Validation)?;
    let first_name =
        validation::require_name("First name", &request.first_name).map_err(AuthError::Validation)?;
    let last_name =
        validation::require_name("Last name", &request.last_name).map_err(AuthError::Validation)?;

    if db::doctor_email_exists(conn, &email)? {
        return Err(AuthError::EmailTaken);
    }

    let doctor = Doctor {
        id: Uuid::new_v4(),
        email,
        first_name,
        last_name,
        created_at: db::now_utc(),
    };
    let password_hash = crypto::hash_password_with_iterations(&request.password, hash_iterations);

    match db::insert_doctor(conn, &doctor, &password_hash) {
        Ok(()) => {}
        // Lost a race with a concurrent registration of the same email.
        Err(DatabaseError::ConstraintViolation(_)) => return Err(AuthError::EmailTaken),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(doctor_id = %doctor.id, "Doctor registered");
    Ok(doctor)
}

/// Verify credentials and open a session valid for `ttl`.
///
/// `hash_iterations` is the cost accounts are registered with. Unknown emails
/// are checked against a dummy hash of that cost so both failures take as long.
pub fn login(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl: chrono::Duration,
    hash_iterations: u32,
) -> Result<LoginOutcome, AuthError> {
    let email = validation::normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
    if password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    let Some(creds) = db::get_doctor_credentials(conn, &email)? else {
        crypto::verify_password(password, &crypto::dummy_hash(hash_iterations))?;
        return Err(AuthError::InvalidCredentials);
    };
    if !crypto::verify_password(password, &creds.password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    let token = crypto::generate_token();
    let created_at = db::now_utc();
    let expires_at = created_at + ttl;
    db::insert_auth_session(
        conn,
        &crypto::hash_token(&token),
        &creds.doctor.id,
        &created_at,
        &expires_at,
    )?;

    if let Err(e) = db::purge_expired_sessions(conn, &created_at) {
        tracing::warn!("Failed to purge expired sessions: {e}");
    }

    tracing::info!(doctor_id = %creds.doctor.id, "Doctor logged in");
    Ok(LoginOutcome {
        token,
        expires_at,
        doctor: creds.doctor,
    })
}

/// Resolve a bearer token to its doctor. Expired and unknown tokens yield `None`.
pub fn authenticate(conn: &Connection, token: &str) -> Result<Option<Doctor>, AuthError> {
    let found = db::find_session_doctor(conn, &crypto::hash_token(token), &db::now_utc())?;
    Ok(found.map(|(doctor, _)| doctor))
}

/// End the session behind `token`. Returns `false` if it was already gone.
pub fn logout(conn: &Connection, token: &str) -> Result<bool, AuthError> {
    Ok(db::delete_auth_session(conn, &crypto::hash_token(token))?)
}

// ═══════════════════════════════════════════════════════════
// Login throttle: per-email lockout
// ═══════════════════════════════════════════════════════════

struct AttemptWindow {
    failures: u32,
    in_flight: u32,
    started: Instant,
    locked_until: Option<Instant>,
}

impl AttemptWindow {
    fn fresh(now: Instant, in_flight: u32) -> Self {
        Self {
            failures: 0,
            in_flight,
            started: now,
            locked_until: None,
        }
    }
}

/// Locks an email after repeated failed logins.
///
/// Attempts still being verified count against the limit, so concurrent
/// guesses cannot slip past it.
pub struct LoginThrottle {
    attempts: HashMap<String, AttemptWindow>,
    max_failures: u32,
    window: Duration,
    lockout: Duration,
}

impl LoginThrottle {
    pub fn new() -> Self {
        Self::with_limits(MAX_LOGIN_FAILURES, FAILURE_WINDOW, LOCKOUT_DURATION)
    }

    pub fn with_limits(max_failures: u32, window: Duration, lockout: Duration) -> Self {
        Self {
            attempts: HashMap::new(),
            max_failures,
            window,
            lockout,
        }
    }

    /// Reserve a login attempt for `key`. `Err(retry_after_secs)` while the
    /// key is locked or too many attempts are in flight. Every `Ok` must be
    /// settled with `record_failure`, `clear` or `release`.
    pub fn begin_attempt(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        self.evict_stale(now);

        let window = self.window;
        let entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptWindow::fresh(now, 0));

        let locked_until = entry.locked_until;
        match locked_until {
            Some(until) if now < until => return Err(until.duration_since(now).as_secs().max(1)),
            Some(_) => *entry = AttemptWindow::fresh(now, entry.in_flight),
            None if now.duration_since(entry.started) >= window => {
                entry.failures = 0;
                entry.started = now;
            }
            None => {}
        }

        if entry.failures + entry.in_flight >= self.max_failures {
            return Err(1);
        }
        entry.in_flight += 1;
        Ok(())
    }

    /// Settle an attempt that failed on bad credentials.
    pub fn record_failure(&mut self, key: &str) {
        let now = Instant::now();
        let entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptWindow::fresh(now, 0));

        entry.in_flight = entry.in_flight.saturating_sub(1);
        entry.failures += 1;
        if entry.failures >= self.max_failures && entry.locked_until.is_none() {
            entry.locked_until = Some(now + self.lockout);
            tracing::warn!(failures = entry.failures, "Login locked out after repeated failures");
        }
    }

    /// Settle an attempt that succeeded: the key starts over.
    pub fn clear(&mut self, key: &str) {
        self.attempts.remove(key);
    }

    /// Settle an attempt that failed for a reason other than credentials.
    pub fn release(&mut self, key: &str) {
        if let Some(entry) = self.attempts.get_mut(key) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
            if entry.in_flight == 0 && entry.failures == 0 && entry.locked_until.is_none() {
                self.attempts.remove(key);
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }

    fn evict_stale(&mut self, now: Instant) {
        let window = self.window;
        self.attempts.retain(|_, entry| {
            entry.in_flight > 0
                || entry.locked_until.is_some_and(|until| now < until)
                || now.duration_since(entry.started) < window
        });
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new()
    }
}
