pub mod password;
pub mod tokens;

pub use password::*;
pub use tokens::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Unsupported password hash scheme: {0}")]
    UnsupportedScheme(String),
}
