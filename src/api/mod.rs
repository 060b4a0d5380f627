//! Portal HTTP API.
//!
//! JSON endpoints under `/api/` for the therapist web client, protected by
//! a middleware stack: Rate Limit → Auth → Audit → Handler.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::portal_router;
pub use server::{start_server_on, PortalServer, ServerSession};
pub use types::ApiContext;
