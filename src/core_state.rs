//! Shared application state for the HTTP layer.
//!
//! `CoreState` is built once at startup, wrapped in `Arc`, and handed to every
//! request. Each request opens its own SQLite connection through `open_db`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::auth::LoginThrottle;
use crate::config::PortalConfig;
use crate::crypto::PBKDF2_ITERATIONS;
use crate::db::{self, AuditRecord};
use crate::prediction::{HttpPredictor, PredictionError, Predictor};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

pub struct CoreState {
    db_path: PathBuf,
    predictor: Arc<dyn Predictor>,
    /// Lifetime of a bearer session issued at login.
    pub session_ttl: chrono::Duration,
    /// PBKDF2 rounds for newly registered passwords.
    pub password_iterations: u32,
    login_throttle: Mutex<LoginThrottle>,
    audit: AuditLogger,
}

impl CoreState {
    pub fn new(db_path: PathBuf, predictor: Arc<dyn Predictor>) -> Self {
        Self {
            db_path,
            predictor,
            session_ttl: chrono::Duration::hours(24),
            password_iterations: PBKDF2_ITERATIONS,
            login_throttle: Mutex::new(LoginThrottle::new()),
            audit: AuditLogger::new(),
        }
    }

    /// Build from configuration: HTTP predictor, migrated database.
    pub fn from_config(config: &PortalConfig) -> Result<Self, CoreError> {
        let predictor = HttpPredictor::new(&config.prediction_url, config.prediction_timeout)?;

        // Create and migrate up front so the first request does not pay for it.
        db::open_database(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "Database ready");

        let mut state = Self::new(config.db_path.clone(), Arc::new(predictor));
        state.session_ttl = config.session_ttl;
        Ok(state)
    }

    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a fresh connection to the portal database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }

    pub fn login_throttle(&self) -> Result<MutexGuard<'_, LoginThrottle>, CoreError> {
        self.login_throttle.lock().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Audit ───────────────────────────────────────────────

    /// Buffer an access event. Flushes when the buffer is full.
    pub fn log_access(&self, doctor_id: Option<&Uuid>, action: &str, entity: &str) {
        if self.audit.log(doctor_id, action, entity) {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Audit flush failed: {e}");
            }
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditRecord> {
        self.audit.entries()
    }

    /// Write buffered audit entries and drop expired ones.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let mut conn = self.open_db()?;
        self.audit.flush_to_db(&mut conn)?;
        let pruned = db::prune_audit_log(&conn, AUDIT_RETENTION_DAYS)?;
        if pruned > 0 {
            tracing::info!(pruned, "Pruned old audit entries");
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Prediction client error: {0}")]
    Prediction(#[from] PredictionError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit buffer, flushed to `audit_log` in batches.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditRecord>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Returns `true` once the buffer has reached the flush threshold.
    pub fn log(&self, doctor_id: Option<&Uuid>, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditRecord {
                timestamp: db::now_utc(),
                doctor_id: doctor_id.map(|id| id.to_string()),
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn flush_to_db(&self, conn: &mut rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }
        db::insert_audit_entries(conn, &entries)?;
        tracing::debug!(count = entries.len(), "Flushed audit entries to database");
        Ok(entries.len())
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::mock::MockPredictor;

    fn test_state() -> (tempfile::TempDir, CoreState) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.db");
        db::open_database(&path).unwrap();
        let state = CoreState::new(path, Arc::new(MockPredictor::replying("a", "b")));
        (dir, state)
    }

    #[test]
    fn open_db_reaches_migrated_schema() {
        let (_dir, state) = test_state();
        let conn = state.open_db().unwrap();
        assert_eq!(db::get_current_version(&conn), 1);
    }

    #[test]
    fn logger_signals_flush_at_capacity() {
        let logger = AuditLogger::new();
        for i in 0..AUDIT_BUFFER_CAPACITY - 1 {
            assert!(!logger.log(None, "GET", &format!("/api/x/{i}")));
        }
        assert!(logger.log(None, "GET", "/api/last"));
        assert_eq!(logger.buffer_len(), AUDIT_BUFFER_CAPACITY);
        assert_eq!(logger.drain().len(), AUDIT_BUFFER_CAPACITY);
        assert_eq!(logger.buffer_len(), 0);
    }

    #[test]
    fn flush_writes_buffered_entries() {
        let (_dir, state) = test_state();
        let doctor = Uuid::new_v4();
        state.log_access(Some(&doctor), "GET", "/api/patients");
        state.log_access(None, "POST", "/api/auth/login");
        assert_eq!(state.audit_entries().len(), 2);

        state.flush_and_prune_audit().unwrap();
        assert!(state.audit_entries().is_empty());

        let conn = state.open_db().unwrap();
        let rows = db::query_audit_by_doctor(&conn, &doctor.to_string()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "GET");
        assert_eq!(rows[0].2, "/api/patients");
    }

    #[test]
    fn auto_flush_at_capacity() {
        let (_dir, state) = test_state();
        for _ in 0..AUDIT_BUFFER_CAPACITY {
            state.log_access(None, "GET", "/api/health");
        }
        assert!(state.audit_entries().is_empty());
        let conn = state.open_db().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, AUDIT_BUFFER_CAPACITY as i64);
    }

    #[test]
    fn from_config_migrates_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = PortalConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            db_path: dir.path().join("nested").join("portal.db"),
            prediction_url: "http://127.0.0.1:5000".into(),
            prediction_timeout: std::time::Duration::from_secs(1),
            session_ttl: chrono::Duration::hours(2),
            cors_origin: "http://localhost:3000".into(),
        };
        let state = CoreState::from_config(&config).unwrap();
        assert!(config.db_path.exists());
        assert_eq!(state.session_ttl, chrono::Duration::hours(2));
    }
}
