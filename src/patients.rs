//! Patient records and the doctor dashboard.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{Doctor, Patient, PatientFields};
use crate::validation;

/// Patients shown on the dashboard.
pub const RECENT_PATIENTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("{0}")]
    Validation(String),
    #[error("Patient not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Create/update body as sent by the web client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub name: String,
    pub email: String,
    #[serde(default, alias = "date_of_birth")]
    pub date_of_birth: Option<String>,
}

impl PatientInput {
    pub fn validate(&self) -> Result<PatientFields, PatientError> {
        let name = validation::require_name("Name", &self.name).map_err(PatientError::Validation)?;
        let email = validation::normalize_email(&self.email).map_err(PatientError::Validation)?;
        let date_of_birth = validation::parse_date_of_birth(self.date_of_birth.as_deref())
            .map_err(PatientError::Validation)?;
        Ok(PatientFields {
            name,
            email,
            date_of_birth,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub doctor_name: String,
    pub total_patients: i64,
    pub new_patients_this_month: i64,
    pub recent_patients: Vec<Patient>,
}

pub fn create_patient(
    conn: &Connection,
    doctor_id: &Uuid,
    input: &PatientInput,
) -> Result<Patient, PatientError> {
    let fields = input.validate()?;
    let patient = Patient {
        id: Uuid::new_v4(),
        doctor_id: *doctor_id,
        name: fields.name,
        email: fields.email,
        date_of_birth: fields.date_of_birth,
        created_at: db::now_utc(),
    };
    db::insert_patient(conn, &patient)?;
    tracing::info!(doctor_id = %doctor_id, patient_id = %patient.id, "Patient created");
    Ok(patient)
}

pub fn get_patient(conn: &Connection, doctor_id: &Uuid, id: &Uuid) -> Result<Patient, PatientError> {
    db::get_patient(conn, doctor_id, id)?.ok_or(PatientError::NotFound)
}

pub fn update_patient(
    conn: &Connection,
    doctor_id: &Uuid,
    id: &Uuid,
    input: &PatientInput,
) -> Result<Patient, PatientError> {
    let fields = input.validate()?;
    db::update_patient(conn, doctor_id, id, &fields)?.ok_or(PatientError::NotFound)
}

pub fn delete_patient(conn: &Connection, doctor_id: &Uuid, id: &Uuid) -> Result<(), PatientError> {
    if !db::delete_patient(conn, doctor_id, id)? {
        return Err(PatientError::NotFound);
    }
    tracing::info!(doctor_id = %doctor_id, patient_id = %id, "Patient deleted");
    Ok(())
}

/// Counts and latest patients for the landing page.
pub fn dashboard(
    conn: &Connection,
    doctor: &Doctor,
    now: &NaiveDateTime,
) -> Result<DashboardSummary, PatientError> {
    Ok(DashboardSummary {
        doctor_name: doctor.display_name(),
        total_patients: db::count_patients(conn, &doctor.id)?,
        new_patients_this_month: db::count_patients_since(conn, &doctor.id, &month_start(now))?,
        recent_patients: db::list_patients(conn, &doctor.id, Some(RECENT_PATIENTS))?,
    })
}

fn month_start(now: &NaiveDateTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(*now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn seed_doctor(conn: &Connection) -> Doctor {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            email: "ada@clinic.org".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            created_at: db::now_utc(),
        };
        db::insert_doctor(conn, &doctor, "pbkdf2-sha256$1$c2FsdA$aGFzaA").unwrap();
        doctor
    }

    fn input(name: &str, email: &str, dob: Option<&str>) -> PatientInput {
        PatientInput {
            name: name.into(),
            email: email.into(),
            date_of_birth: dob.map(String::from),
        }
    }

    #[test]
    fn input_accepts_camel_case_and_normalizes() {
        let parsed: PatientInput = serde_json::from_str(
            r#"{"name":" Grace Hopper ","email":"Grace@Navy.mil","dateOfBirth":"1906-12-09"}"#,
        )
        .unwrap();
        let fields = parsed.validate().unwrap();
        assert_eq!(fields.name, "Grace Hopper");
        assert_eq!(fields.email, "grace@navy.mil");
        assert_eq!(fields.date_of_birth, NaiveDate::from_ymd_opt(1906, 12, 9));
    }

    #[test]
    fn invalid_input_rejected() {
        assert!(input("", "a@b.co", None).validate().is_err());
        assert!(input("Grace", "nope", None).validate().is_err());
        assert!(input("Grace", "a@b.co", Some("12/09/1906")).validate().is_err());
    }

    #[test]
    fn crud_is_scoped_to_doctor() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn);
        let stranger = Uuid::new_v4();

        let patient = create_patient(&conn, &doctor.id, &input("Grace", "g@x.io", None)).unwrap();
        assert_eq!(get_patient(&conn, &doctor.id, &patient.id).unwrap().name, "Grace");
        assert!(matches!(
            get_patient(&conn, &stranger, &patient.id),
            Err(PatientError::NotFound)
        ));

        let updated = update_patient(
            &conn,
            &doctor.id,
            &patient.id,
            &input("Grace H.", "g@x.io", Some("1990-01-02")),
        )
        .unwrap();
        assert_eq!(updated.name, "Grace H.");
        assert_eq!(updated.created_at, patient.created_at);
        assert!(matches!(
            update_patient(&conn, &stranger, &patient.id, &input("X", "x@x.io", None)),
            Err(PatientError::NotFound)
        ));

        assert!(matches!(
            delete_patient(&conn, &stranger, &patient.id),
            Err(PatientError::NotFound)
        ));
        delete_patient(&conn, &doctor.id, &patient.id).unwrap();
        assert!(matches!(
            delete_patient(&conn, &doctor.id, &patient.id),
            Err(PatientError::NotFound)
        ));
    }

    #[test]
    fn dashboard_counts_month_and_caps_recent() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_doctor(&conn);
        for i in 0..7 {
            create_patient(&conn, &doctor.id, &input(&format!("P{i}"), "p@x.io", None)).unwrap();
        }
        let old = Patient {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            name: "Old".into(),
            email: "old@x.io".into(),
            date_of_birth: None,
            created_at: db::parse_timestamp("2001-01-01 00:00:00.000000").unwrap(),
        };
        db::insert_patient(&conn, &old).unwrap();

        let summary = dashboard(&conn, &doctor, &db::now_utc()).unwrap();
        assert_eq!(summary.doctor_name, "Ada Lovelace");
        assert_eq!(summary.total_patients, 8);
        assert_eq!(summary.new_patients_this_month, 7);
        assert_eq!(summary.recent_patients.len(), 5);
        assert_eq!(summary.recent_patients[0].name, "P6");
    }

    #[test]
    fn month_start_truncates() {
        let now = db::parse_timestamp("2024-03-17 13:45:10.123456").unwrap();
        assert_eq!(
            month_start(&now),
            db::parse_timestamp("2024-03-01 00:00:00.000000").unwrap()
        );
    }
}
