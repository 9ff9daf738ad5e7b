//! Constants, error taxonomy and small shared traits used across the crypto core.

pub mod constants;
pub mod error;
pub mod traits;

pub use constants::*;
pub use error::{CookieError, CryptoError, HandshakeError};
pub use traits::RekeyableSession;
