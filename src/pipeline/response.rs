//! Response classification and output naming.
//!
//! The response kind is decided by the tool, never by sniffing the body:
//! the one text tool expects `{ "text", "pages" }` JSON, every other tool an
//! opaque file. File outputs are named by the server when it says so, else
//! from the tool's declared output extension.

use crate::backend::BackendResponse;
use crate::error::{FailureKind, ProcessingFailure};
use crate::pipeline::intake::StagedFile;
use crate::registry::{ResponseKind, ToolSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// Fallback base name when the server gives none and the input name is not reused.
pub const FALLBACK_STEM: &str = "output";

/// The successful output of a job.
#[derive(Clone, PartialEq, Eq)]
pub enum JobResult {
    /// A binary artifact and the name to save it under.
    File { bytes: Vec<u8>, filename: String },
    /// Extracted text and the number of pages it came from.
    Text { text: String, page_count: u32 },
}

impl fmt::Debug for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::File { bytes, filename } => f
                .debug_struct("File")
                .field("filename", filename)
                .field("len", &bytes.len())
                .finish(),
            JobResult::Text { text, page_count } => f
                .debug_struct("Text")
                .field("chars", &text.chars().count())
                .field("page_count", page_count)
                .finish(),
        }
    }
}

#[derive(Deserialize)]
struct TextPayload {
    text: String,
    pages: u32,
}

/// Turn a successful response into a [`JobResult`] according to the tool's declared kind.
pub fn classify(
    spec: &ToolSpec,
    response: BackendResponse,
    staged: &[StagedFile],
) -> Result<JobResult, ProcessingFailure> {
    debug!(
        "'{}' replied with {} bytes ({})",
        spec.id,
        response.body.len(),
        response.content_type.as_deref().unwrap_or("no content type")
    );
    match spec.response {
        ResponseKind::Text => {
            let payload: TextPayload = serde_json::from_slice(&response.body).map_err(|e| {
                debug!("Text response did not parse: {}", e);
                ProcessingFailure::new(
                    FailureKind::MalformedResponse,
                    Some("The server returned an unexpected response.".into()),
                )
            })?;
            Ok(JobResult::Text {
                text: payload.text,
                page_count: payload.pages,
            })
        }
        ResponseKind::Binary => {
            let filename = resolve_filename(spec, response.filename.as_deref(), staged);
            Ok(JobResult::File {
                bytes: response.body,
                filename,
            })
        }
    }
}

/// Output name: server-declared name, else `{input stem}.pdf` for
/// single-document → PDF conversions, else `output.{ext}`.
pub fn resolve_filename(spec: &ToolSpec, server_filename: Option<&str>, staged: &[StagedFile]) -> String {
    if let Some(name) = server_filename.and_then(sanitize_filename) {
        return name;
    }
    let ext = spec.output_extension;
    if spec.reuse_input_name && ext == "pdf" {
        if let [only] = staged {
            return format!("{}.{}", only.stem(), ext);
        }
    }
    format!("{FALLBACK_STEM}.{ext}")
}

/// Keep only the final path component; reject empty and dot names.
fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

static RE_FILENAME_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\*\s*=\s*[^']*'[^']*'([^;\s]+)"#).unwrap());
static RE_FILENAME_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*"([^"]*)""#).unwrap());
static RE_FILENAME_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*([^;"\s]+)"#).unwrap());

/// Extract the file name from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*=` form wins over plain `filename=`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    if let Some(c) = RE_FILENAME_EXT.captures(header) {
        if let Some(decoded) = percent_decode(&c[1]) {
            return Some(decoded);
        }
    }
    RE_FILENAME_QUOTED
        .captures(header)
        .or_else(|| RE_FILENAME_BARE.captures(header))
        .map(|c| c[1].to_string())
        .filter(|s| !s.is_empty())
}

fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::lookup;

    fn binary(body: &[u8], filename: Option<&str>) -> BackendResponse {
        BackendResponse {
            body: body.to_vec(),
            filename: filename.map(str::to_string),
            content_type: None,
        }
    }

    fn staged(name: &str) -> StagedFile {
        StagedFile::new(name, b"x".to_vec())
    }

    #[test]
    fn pdf_to_jpg_without_server_name_is_jpg() {
        let spec = lookup("pdf-to-jpg").unwrap();
        let name = resolve_filename(spec, None, &[staged("slides.pdf")]);
        assert_eq!(name, "output.jpg");
    }

    #[test]
    fn merge_without_server_name_is_output_pdf() {
        let spec = lookup("merge").unwrap();
        let name = resolve_filename(spec, None, &[staged("a.pdf"), staged("b.pdf")]);
        assert_eq!(name, "output.pdf");
    }

    #[test]
    fn single_document_to_pdf_reuses_input_stem() {
        let spec = lookup("word-to-pdf").unwrap();
        assert_eq!(resolve_filename(spec, None, &[staged("Thesis.v2.docx")]), "Thesis.v2.pdf");
        let spec = lookup("compress").unwrap();
        assert_eq!(resolve_filename(spec, None, &[staged("big.pdf")]), "output.pdf");
    }

    #[test]
    fn conversions_to_office_formats() {
        assert_eq!(resolve_filename(lookup("pdf-to-word").unwrap(), None, &[]), "output.docx");
        assert_eq!(resolve_filename(lookup("pdf-to-excel").unwrap(), None, &[]), "output.xlsx");
        assert_eq!(resolve_filename(lookup("pdf-to-png").unwrap(), None, &[]), "output.png");
    }

    #[test]
    fn server_name_takes_precedence() {
        let spec = lookup("word-to-pdf").unwrap();
        assert_eq!(
            resolve_filename(spec, Some("converted.pdf"), &[staged("Thesis.docx")]),
            "converted.pdf"
        );
        assert_eq!(resolve_filename(spec, Some("../../etc/passwd"), &[]), "passwd");
        assert_eq!(resolve_filename(spec, Some(".."), &[staged("a.doc")]), "a.pdf");
    }

    #[test]
    fn content_disposition_forms() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="merged.pdf""#),
            Some("merged.pdf".into())
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename=page_1.jpg"),
            Some("page_1.jpg".into())
        );
        assert_eq!(
            filename_from_content_disposition(
                r#"attachment; filename="fallback.pdf"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"#
            ),
            Some("résumé.pdf".into())
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
        assert_eq!(filename_from_content_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn text_tool_parses_json() {
        let spec = lookup("ocr").unwrap();
        let result = classify(spec, binary(br#"{"text":"Hello","pages":2}"#, None), &[]).unwrap();
        assert_eq!(
            result,
            JobResult::Text {
                text: "Hello".into(),
                page_count: 2
            }
        );
    }

    #[test]
    fn text_tool_rejects_binary_body() {
        let spec = lookup("ocr").unwrap();
        let err = classify(spec, binary(b"%PDF-1.7", None), &[]).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
    }

    #[test]
    fn binary_tool_never_parses_json() {
        let spec = lookup("compress").unwrap();
        let body = br#"{"text":"not really","pages":1}"#;
        let result = classify(spec, binary(body, Some("compressed.pdf")), &[staged("in.pdf")]).unwrap();
        assert_eq!(
            result,
            JobResult::File {
                bytes: body.to_vec(),
                filename: "compressed.pdf".into()
            }
        );
    }
}
