//! Embedded npm registry
//!
//! Serves the subset of the npm registry protocol the bootstrap workflow
//! needs: liveness, user creation, whoami, publish and package/tarball reads.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod server;
pub mod storage;

pub use errors::{HttpError, HttpResult};
pub use server::{RegistryServer, RunningRegistry};
