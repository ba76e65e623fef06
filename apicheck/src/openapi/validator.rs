use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::ContractDocument;
use crate::client::Body;

/// Status codes accepted for operations the document does not declare.
pub const COMMON_STATUS_CODES: [u16; 11] = [200, 201, 202, 400, 401, 403, 404, 429, 500, 502, 503];

/// Outcome of a contract check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compliance {
    Compliant,
    NonCompliant,
    /// The validator could not decide. Treated as compliant.
    Indeterminate,
}

impl Compliance {
    /// Whether a scenario should accept the response.
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Compliance::NonCompliant)
    }
}

/// Checks a response against an API contract.
///
/// Implementations are advisory and must not panic on malformed input.
pub trait ResponseValidator: Send + Sync {
    fn validate(&self, method: &str, path: &str, status: u16, body: Option<&Body>) -> Compliance;
}

/// Existence check against an OpenAPI document, loaded on first use.
///
/// A missing document makes the validator permissive: every status in
/// [`COMMON_STATUS_CODES`] passes. The document is read at most once.
#[derive(Debug)]
pub struct ContractValidator {
    path: PathBuf,
    document: OnceLock<ContractDocument>,
}

impl ContractValidator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: OnceLock::new(),
        }
    }

    /// A validator over an already parsed document.
    pub fn from_document(document: ContractDocument) -> Self {
        Self {
            path: PathBuf::new(),
            document: OnceLock::from(document),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once the document has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.document.get().is_some()
    }

    pub fn document(&self) -> &ContractDocument {
        self.document.get_or_init(|| {
            let document = ContractDocument::load(&self.path);
            match &document {
                ContractDocument::Spec(_) => {
                    tracing::debug!(path = %self.path.display(), "loaded contract document")
                }
                ContractDocument::Empty => {
                    tracing::debug!(path = %self.path.display(), "no contract document, using common status codes")
                }
                ContractDocument::Unreadable(reason) => {
                    tracing::warn!(path = %self.path.display(), reason = %reason, "contract document unreadable, checks are indeterminate")
                }
            }
            document
        })
    }
}

impl ResponseValidator for ContractValidator {
    fn validate(&self, method: &str, path: &str, status: u16, _body: Option<&Body>) -> Compliance {
        match self.document().declares(method, path, status) {
            Ok(true) => Compliance::Compliant,
            Ok(false) if COMMON_STATUS_CODES.contains(&status) => Compliance::Compliant,
            Ok(false) => Compliance::NonCompliant,
            Err(_) => Compliance::Indeterminate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(doc: &str) -> ContractValidator {
        ContractValidator::from_document(ContractDocument::parse(doc))
    }

    #[test]
    fn test_declared_is_compliant() {
        let v = validator("paths:\n  /x:\n    get:\n      responses:\n        \"299\": {}\n");
        assert_eq!(v.validate("GET", "/x", 299, None), Compliance::Compliant);
    }

    #[test]
    fn test_allow_list_fallback() {
        let v = validator("paths:\n  /x:\n    get:\n      responses:\n        \"200\": {}\n");
        assert_eq!(v.validate("GET", "/x", 200, None), Compliance::Compliant);
        assert_eq!(v.validate("GET", "/x", 404, None), Compliance::Compliant);
        assert_eq!(v.validate("GET", "/x", 999, None), Compliance::NonCompliant);
        assert_eq!(v.validate("GET", "/x", 418, None), Compliance::NonCompliant);
    }

    #[test]
    fn test_empty_document_permissive() {
        let v = ContractValidator::from_document(ContractDocument::Empty);
        for status in COMMON_STATUS_CODES {
            assert!(v.validate("GET", "/anything", status, None).is_acceptable());
        }
        assert_eq!(v.validate("GET", "/anything", 204, None), Compliance::NonCompliant);
    }

    #[test]
    fn test_unreadable_is_indeterminate() {
        let v = validator("paths: [unclosed");
        let result = v.validate("GET", "/x", 999, None);
        assert_eq!(result, Compliance::Indeterminate);
        assert!(result.is_acceptable());
    }

    #[test]
    fn test_null_paths_is_indeterminate() {
        let v = validator("openapi: 3.0.0\npaths: ~\n");
        let result = v.validate("GET", "/x", 418, None);
        assert_eq!(result, Compliance::Indeterminate);
        assert!(result.is_acceptable());
    }

    #[test]
    fn test_lazy_load_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.yaml");
        std::fs::write(&path, "paths:\n  /x:\n    get:\n      responses:\n        \"299\": {}\n").unwrap();

        let v = ContractValidator::new(&path);
        assert!(!v.is_loaded());
        assert_eq!(v.validate("GET", "/x", 299, None), Compliance::Compliant);
        assert!(v.is_loaded());

        std::fs::remove_file(&path).unwrap();
        assert_eq!(v.validate("GET", "/x", 299, None), Compliance::Compliant);
    }

    #[test]
    fn test_missing_file_permissive() {
        let v = ContractValidator::new("/nonexistent/openapi.yaml");
        assert_eq!(v.validate("POST", "/x", 202, None), Compliance::Compliant);
        assert_eq!(v.document(), &ContractDocument::Empty);
    }
}
