//! Authentication for the embedded registry

pub mod middleware;
pub mod users;

pub use middleware::{authenticate, extract_token};
pub use users::UserStore;
