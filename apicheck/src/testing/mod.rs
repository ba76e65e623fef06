//! A local stand-in for the extraction backend.
//!
//! [`MockBackend`] serves the health, auth, webhook and extraction routes on
//! a random port so scenarios can be exercised without a deployment.

mod backend;
mod multipart;
mod routes;
mod state;

pub use backend::{ErrorFormat, MockBackend, MockBackendConfig};
pub use multipart::{FormPart, boundary as multipart_boundary, parse as parse_multipart};
