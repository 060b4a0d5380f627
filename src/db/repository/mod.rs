//! Repository layer: entity-scoped database operations.
//!
//! Every query on patient data takes the owning doctor's id; rows that belong
//! to another doctor are indistinguishable from rows that do not exist.

mod audit;
mod auth_session;
mod doctor;
mod patient;
mod therapy_message;
mod therapy_session;

pub use audit::*;
pub use auth_session::*;
pub use doctor::*;
pub use patient::*;
pub use therapy_message::*;
pub use therapy_session::*;
