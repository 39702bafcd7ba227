pub mod errors;
pub mod id;

pub use errors::{ConfigError, RelayError};
pub use id::ConnectionId;

pub type Result<T> = std::result::Result<T, RelayError>;
