//! Token authentication
//!
//! Handles:
//! - Signed session tokens issued by the credential service
//! - The `CurrentUser` extractor that provisions the actor's user record

mod middleware;
pub mod session;

pub use middleware::CurrentUser;
pub use session::{Session, create_session_token, verify_session_token};
