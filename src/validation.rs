//! Input checks shared by the account, patient and therapy services.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_CATEGORY_LENGTH: usize = 100;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// Trim and lowercase an email, rejecting anything that is not `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err("Email is required".into());
    }
    if email.len() > 254 || !EMAIL_PATTERN.is_match(&email) {
        return Err(format!("Invalid email address: {}", raw.trim()));
    }
    Ok(email)
}

/// Trimmed, non-empty, bounded name.
pub fn require_name(field: &str, raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(format!("{field} is required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("{field} too long (max {MAX_NAME_LENGTH} chars)"));
    }
    Ok(name.to_string())
}

pub fn check_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    Ok(())
}

/// Accepts `YYYY-MM-DD`; empty input means "not provided". Dates in the future are rejected.
pub fn parse_date_of_birth(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date of birth (expected YYYY-MM-DD): {raw}"))?;
    if date > chrono::Utc::now().date_naive() {
        return Err("Date of birth cannot be in the future".into());
    }
    Ok(Some(date))
}

/// Chat message body: trimmed, non-empty, bounded.
pub fn message_content(raw: &str) -> Result<String, String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err("Message cannot be empty".into());
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!("Message too long (max {MAX_MESSAGE_LENGTH} chars)"));
    }
    Ok(content.to_string())
}
