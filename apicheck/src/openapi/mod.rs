//! Contract validation against an OpenAPI document.
//!
//! The check is advisory: it only asks whether a method/path/status
//! combination is declared, falling back to an allow-list of common status
//! codes. It never inspects body shape, and it never fails a scenario because
//! of its own problems.

mod document;
mod validator;

pub use document::ContractDocument;
pub use validator::{COMMON_STATUS_CODES, Compliance, ContractValidator, ResponseValidator};
