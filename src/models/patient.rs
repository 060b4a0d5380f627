use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

/// Identity fields embedded in session listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientBrief {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Editable patient fields, shared by create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientFields {
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
}
