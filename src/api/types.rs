//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::Doctor;

const DEFAULT_PER_MINUTE: u32 = 120;
const DEFAULT_PER_HOUR: u32 = 2000;
const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
/// How often idle clients are dropped from the limiter.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════
// API context: shared state for the portal router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self::with_rate_limiter(core, RateLimiter::new())
    }

    pub fn with_rate_limiter(core: Arc<CoreState>, limiter: RateLimiter) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(limiter)),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Doctor context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated doctor, inserted into request extensions by the auth
/// middleware. `token` is the raw bearer, needed for logout.
#[derive(Debug, Clone)]
pub struct DoctorContext {
    pub doctor: Doctor,
    pub token: String,
}

impl DoctorContext {
    pub fn id(&self) -> &Uuid {
        &self.doctor.id
    }
}

/// Parse a UUID from a path or query segment.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_PER_MINUTE, DEFAULT_PER_HOUR)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            last_sweep: Instant::now(),
        }
    }

    /// `Ok(())` or `Err(retry_after_secs)` if a limit is exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        if now.saturating_duration_since(self.last_sweep) >= SWEEP_INTERVAL {
            self.sweep(now);
        }

        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.saturating_duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < MINUTE)
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Forget clients with no hit in the last hour.
    fn sweep(&mut self, now: Instant) {
        self.windows.retain(|_, hits| {
            hits.retain(|ts| now.saturating_duration_since(*ts) < HOUR);
            !hits.is_empty()
        });
        self.last_sweep = now;
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
