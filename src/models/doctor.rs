use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A therapist account. The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: NaiveDateTime,
}

impl Doctor {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Row used at login time, carries the stored credential.
#[derive(Debug, Clone)]
pub struct DoctorCredentials {
    pub doctor: Doctor,
    pub password_hash: String,
}
