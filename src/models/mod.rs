//! Domain types shared by the repository, service and API layers.

pub mod doctor;
pub mod enums;
pub mod patient;
pub mod therapy;

pub use doctor::*;
pub use patient::*;
pub use therapy::*;
