use std::path::Path;

use serde_yaml_ng::{Mapping, Value};

/// A parsed contract document.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractDocument {
    /// The document was found and parsed.
    Spec(Value),
    /// No document exists at the configured path.
    Empty,
    /// The document exists but could not be read or parsed.
    Unreadable(String),
}

impl ContractDocument {
    /// Reads and parses `path`. YAML and JSON are both accepted.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return ContractDocument::Empty;
        }
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => ContractDocument::Unreadable(e.to_string()),
        }
    }

    pub fn parse(text: &str) -> Self {
        match serde_yaml_ng::from_str::<Value>(text) {
            Ok(Value::Null) => ContractDocument::Empty,
            Ok(value) => ContractDocument::Spec(value),
            Err(e) => ContractDocument::Unreadable(e.to_string()),
        }
    }

    /// Whether `paths[path][method].responses[status]` is declared.
    ///
    /// Returns an error when a node on the way has an unexpected type.
    pub fn declares(&self, method: &str, path: &str, status: u16) -> Result<bool, String> {
        let root = match self {
            ContractDocument::Spec(value) => value,
            ContractDocument::Empty => return Ok(false),
            ContractDocument::Unreadable(reason) => return Err(reason.clone()),
        };

        let Some(paths) = child(root, "paths")? else {
            return Ok(false);
        };
        let Some(path_item) = child(paths, path)? else {
            return Ok(false);
        };
        let Some(operation) = child(path_item, &method.to_ascii_lowercase())? else {
            return Ok(false);
        };
        let Some(responses) = child(operation, "responses")? else {
            return Ok(false);
        };
        Ok(child(responses, &status.to_string())?.is_some())
    }
}

/// A null node is an error too: `paths: ~` cannot be searched.
fn as_mapping(value: &Value) -> Result<&Mapping, String> {
    match value {
        Value::Mapping(map) => Ok(map),
        other => Err(format!("expected a mapping, found {:?}", other)),
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Result<Option<&'a Value>, String> {
    Ok(as_mapping(value)?.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
paths:
  /x:
    get:
      responses:
        "200": {}
        "404":
          description: missing
"#;

    #[test]
    fn test_declared_status() {
        let doc = ContractDocument::parse(DOC);
        assert_eq!(doc.declares("GET", "/x", 200), Ok(true));
        assert_eq!(doc.declares("get", "/x", 404), Ok(true));
        assert_eq!(doc.declares("GET", "/x", 500), Ok(false));
        assert_eq!(doc.declares("POST", "/x", 200), Ok(false));
        assert_eq!(doc.declares("GET", "/y", 200), Ok(false));
    }

    #[test]
    fn test_json_document() {
        let doc = ContractDocument::parse(r#"{"paths": {"/x": {"post": {"responses": {"201": {}}}}}}"#);
        assert_eq!(doc.declares("POST", "/x", 201), Ok(true));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(ContractDocument::parse(""), ContractDocument::Empty);
        assert_eq!(ContractDocument::Empty.declares("GET", "/x", 200), Ok(false));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let doc = ContractDocument::load(Path::new("/nonexistent/openapi.yaml"));
        assert_eq!(doc, ContractDocument::Empty);
    }

    #[test]
    fn test_unexpected_shape_is_error() {
        let doc = ContractDocument::parse("paths:\n  - /x\n  - /y\n");
        assert!(doc.declares("GET", "/x", 200).is_err());
    }

    #[test]
    fn test_null_node_is_error() {
        let doc = ContractDocument::parse("openapi: 3.0.0\npaths: ~\n");
        assert!(doc.declares("GET", "/x", 200).is_err());

        let doc = ContractDocument::parse("paths:\n  /x: null\n");
        assert!(doc.declares("GET", "/x", 200).is_err());
        assert_eq!(doc.declares("GET", "/y", 200), Ok(false));
    }

    #[test]
    fn test_unparsable_document() {
        let doc = ContractDocument::parse("paths: [unclosed");
        assert!(matches!(doc, ContractDocument::Unreadable(_)));
        assert!(doc.declares("GET", "/x", 200).is_err());
    }
}
