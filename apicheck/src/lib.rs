pub mod assertions;
pub mod auth;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod extraction;
pub mod fixtures;
pub mod observability;
pub mod openapi;
pub mod performance;
pub mod rate_limit;
pub mod suite;
pub mod testing;

pub mod prelude {
    pub use crate::assertions::{
        assert_contract_compliance, assert_error_response, assert_ok, assert_response_time,
        assert_response_time_within, assert_status_in, assert_success_response,
    };
    pub use crate::auth::MockToken;
    pub use crate::client::{ApiClient, ApiResponse, Body, FilePart, HttpMethod};
    pub use crate::config::{Environment, TestConfig};
    pub use crate::ensure;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::extraction::ExtractionApi;
    pub use crate::fixtures::Fixtures;
    pub use crate::openapi::{Compliance, ContractValidator, ResponseValidator};
    pub use crate::performance::{PerformanceMonitor, PerformanceStats, Tier};
    pub use crate::suite::{Context, Marker, Report, Runner, Scenario, Selection};

    pub use serde_json::{Value, json};
}
