//! `multipart/form-data` decoding for the mock backend, on top of `multer`.

use std::convert::Infallible;

use bytes::Bytes;
use futures_util::stream;

/// One decoded form part.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Extracts the boundary parameter of a `multipart/form-data` content type.
pub fn boundary(content_type: &str) -> Option<String> {
    multer::parse_boundary(content_type).ok()
}

/// Decodes the parts of a buffered multipart body.
///
/// Decoding stops at the first malformed part; parts read before it are kept.
pub async fn parse(body: Bytes, boundary: &str) -> Vec<FormPart> {
    let stream = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut parts = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed multipart body");
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        match field.bytes().await {
            Ok(data) => parts.push(FormPart {
                name,
                file_name,
                content_type,
                data,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "malformed multipart field");
                break;
            }
        }
    }
    parts
}
