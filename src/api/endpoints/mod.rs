//! API endpoint handlers, one module per resource.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod messages;
pub mod patients;
pub mod sessions;
pub mod therapy;
