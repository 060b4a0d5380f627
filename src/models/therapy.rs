use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SenderType;
use super::patient::PatientBrief;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapySession {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapySessionWithPatient {
    #[serde(flatten)]
    pub session: TherapySession,
    pub patient: PatientBrief,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapyMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_type: SenderType,
    pub content: String,
    pub ai_category: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Classification and advice returned by the prediction service.
///
/// The service names the category field `message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prediction {
    #[serde(rename = "message")]
    pub category: String,
    pub advice: String,
}
