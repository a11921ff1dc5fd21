//! The tool registry: a fixed table from tool id to a declarative [`ToolSpec`].
//!
//! Every behavioural difference between tools is expressed here as data:
//! accepted file types, arity, the parameter descriptors, whether the tool
//! needs a page selection, how its response is classified and how its output
//! file is named. The job engine is written once against these fields and
//! never branches on a tool id.

use crate::error::ToolboxError;
use serde::Serialize;

/// How many files a tool takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    Single,
    Multiple,
}

/// What a successful response body contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// An opaque file payload.
    Binary,
    /// `{ "text": ..., "pages": ... }` JSON.
    Text,
}

/// One entry of an enumerated parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

/// Affine map from a slider level in `[0, 100]` to the unit the server expects.
///
/// Computed as `level * numerator / denominator + offset` so that the common
/// percentages come out exact (`30 * 1 / 100 == 0.3`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scale {
    pub numerator: f64,
    pub denominator: f64,
    pub offset: f64,
}

impl Scale {
    pub const fn new(numerator: f64, denominator: f64, offset: f64) -> Self {
        Self {
            numerator,
            denominator,
            offset,
        }
    }

    /// Map a level to its submitted value.
    pub fn apply(&self, level: u8) -> f64 {
        f64::from(level) * self.numerator / self.denominator + self.offset
    }
}

/// A sibling parameter value that makes another parameter mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub key: &'static str,
    pub equals: &'static str,
}

/// The closed set of parameter shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParamKind {
    /// Free text.
    Text { placeholder: &'static str },
    /// Free text that must not be echoed.
    Password,
    /// One of a fixed list; the first option is the default.
    Choice { options: &'static [Choice] },
    /// Slider level in `[0, 100]`, scaled on submission.
    Scaled { scale: Scale, default_level: u8 },
    /// A file attached as a parameter.
    Asset {
        extensions: &'static [&'static str],
        required_when: Option<Condition>,
    },
    /// Watermark type selector (`text` | `image`) with its conditional companion.
    ///
    /// The selector is submitted under the descriptor key, the text under
    /// `text_key` and the image under `asset_key`.
    Watermark {
        text_key: &'static str,
        asset_key: &'static str,
        asset_extensions: &'static [&'static str],
    },
}

/// Declares one parameter a tool needs and the key it is submitted under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

/// Declarative description of one tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToolSpec {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Lower-case extensions without the dot.
    pub accepted_extensions: &'static [&'static str],
    pub arity: Arity,
    pub parameters: &'static [ParameterDescriptor],
    /// The tool needs a preview round trip and a page selection.
    pub page_selection: bool,
    pub response: ResponseKind,
    /// Extension used when the server does not name the output.
    pub output_extension: &'static str,
    /// Name the output after the uploaded file (single-document → PDF conversions).
    pub reuse_input_name: bool,
}

impl ToolSpec {
    /// Whether `filename` has one of the accepted extensions (case-insensitive).
    pub fn accepts(&self, filename: &str) -> bool {
        has_extension(filename, self.accepted_extensions)
    }

    /// The multipart field the uploaded files go under.
    pub fn file_field(&self) -> &'static str {
        match self.arity {
            Arity::Single => "file",
            Arity::Multiple => "files",
        }
    }

    /// Descriptor declared under `key`.
    pub fn parameter(&self, key: &str) -> Option<&'static ParameterDescriptor> {
        self.parameters.iter().find(|p| p.key == key)
    }

    /// Accepted extensions rendered as `.pdf, .docx`.
    pub fn accepted_display(&self) -> String {
        self.accepted_extensions
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Case-insensitive extension check shared by intake and asset parameters.
pub fn has_extension(filename: &str, extensions: &[&str]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| *e == ext)
        }
        None => false,
    }
}

// ── Shared parameter shapes ──────────────────────────────────────────────

pub const WATERMARK_TEXT: &str = "text";
pub const WATERMARK_IMAGE: &str = "image";

/// Options of the watermark type selector.
pub const WATERMARK_TYPES: &[Choice] = &[
    Choice {
        value: WATERMARK_TEXT,
        label: "Text",
    },
    Choice {
        value: WATERMARK_IMAGE,
        label: "Image",
    },
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
const PDF: &[&str] = &["pdf"];

/// Form field carrying the comma-joined pages to remove.
pub const PAGES_TO_REMOVE_FIELD: &str = "pages_to_remove";

const ROTATE_ANGLES: &[Choice] = &[
    Choice {
        value: "90",
        label: "90°",
    },
    Choice {
        value: "180",
        label: "180°",
    },
    Choice {
        value: "270",
        label: "270°",
    },
];

const SPLIT_PARAMS: &[ParameterDescriptor] = &[ParameterDescriptor {
    key: "pages",
    label: "Page Range (e.g., 1-3,5,7-9)",
    kind: ParamKind::Text {
        placeholder: "1-3,5",
    },
    required: true,
}];

const ROTATE_PARAMS: &[ParameterDescriptor] = &[ParameterDescriptor {
    key: "angle",
    label: "Rotation Angle",
    kind: ParamKind::Choice {
        options: ROTATE_ANGLES,
    },
    required: true,
}];

const WATERMARK_PARAMS: &[ParameterDescriptor] = &[
    ParameterDescriptor {
        key: "watermark_type",
        label: "Watermark",
        kind: ParamKind::Watermark {
            text_key: "text",
            asset_key: "image",
            asset_extensions: IMAGE_EXTENSIONS,
        },
        required: true,
    },
    ParameterDescriptor {
        key: "opacity",
        label: "Opacity",
        kind: ParamKind::Scaled {
            scale: Scale::new(1.0, 100.0, 0.0),
            default_level: 30,
        },
        required: false,
    },
    ParameterDescriptor {
        key: "rotation",
        label: "Rotation",
        kind: ParamKind::Scaled {
            scale: Scale::new(360.0, 100.0, 0.0),
            default_level: 0,
        },
        required: false,
    },
    ParameterDescriptor {
        key: "size",
        label: "Size",
        kind: ParamKind::Scaled {
            scale: Scale::new(80.0, 100.0, 20.0),
            default_level: 50,
        },
        required: false,
    },
];

const PROTECT_PARAMS: &[ParameterDescriptor] = &[ParameterDescriptor {
    key: "password",
    label: "Password",
    kind: ParamKind::Password,
    required: true,
}];

const UNLOCK_PARAMS: &[ParameterDescriptor] = &[ParameterDescriptor {
    key: "password",
    label: "Current Password",
    kind: ParamKind::Password,
    required: true,
}];

const SIGN_PARAMS: &[ParameterDescriptor] = &[ParameterDescriptor {
    key: "signature_text",
    label: "Signature Text",
    kind: ParamKind::Text {
        placeholder: "Your Name",
    },
    required: true,
}];

/// Shorthand for the common shape: one file in, a file out, no parameters.
const fn simple(
    id: &'static str,
    title: &'static str,
    description: &'static str,
    accepted_extensions: &'static [&'static str],
    output_extension: &'static str,
    reuse_input_name: bool,
) -> ToolSpec {
    ToolSpec {
        id,
        title,
        description,
        accepted_extensions,
        arity: Arity::Single,
        parameters: &[],
        page_selection: false,
        response: ResponseKind::Binary,
        output_extension,
        reuse_input_name,
    }
}

const fn with_params(spec: ToolSpec, parameters: &'static [ParameterDescriptor]) -> ToolSpec {
    ToolSpec { parameters, ..spec }
}

static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        arity: Arity::Multiple,
        ..simple("merge", "Merge PDF", "Combine multiple PDFs into one", PDF, "pdf", false)
    },
    with_params(
        simple("split", "Split PDF", "Extract pages from your PDF", PDF, "pdf", false),
        SPLIT_PARAMS,
    ),
    simple("compress", "Compress PDF", "Reduce your PDF file size", PDF, "pdf", false),
    with_params(
        simple("rotate", "Rotate PDF", "Rotate PDF pages", PDF, "pdf", false),
        ROTATE_PARAMS,
    ),
    ToolSpec {
        page_selection: true,
        ..simple("delete-pages", "Delete Pages", "Remove selected pages from your PDF", PDF, "pdf", false)
    },
    simple("pdf-to-jpg", "PDF to JPG", "Convert PDF to JPG images", PDF, "jpg", false),
    simple("pdf-to-png", "PDF to PNG", "Convert PDF to PNG images", PDF, "png", false),
    simple("jpg-to-pdf", "JPG to PDF", "Convert JPG to PDF", &["jpg", "jpeg"], "pdf", true),
    simple("png-to-pdf", "PNG to PDF", "Convert PNG to PDF", &["png"], "pdf", true),
    simple("pdf-to-word", "PDF to Word", "Convert PDF to Word document", PDF, "docx", false),
    simple("word-to-pdf", "Word to PDF", "Convert Word to PDF", &["doc", "docx"], "pdf", true),
    simple("pdf-to-excel", "PDF to Excel", "Convert PDF to Excel", PDF, "xlsx", false),
    simple("excel-to-pdf", "Excel to PDF", "Convert Excel to PDF", &["xls", "xlsx"], "pdf", true),
    simple("java-to-pdf", "Java to PDF", "Render Java source code as a PDF", &["java"], "pdf", true),
    ToolSpec {
        response: ResponseKind::Text,
        ..simple("ocr", "OCR PDF", "Extract text from PDF", PDF, "txt", false)
    },
    with_params(
        simple("watermark", "Watermark", "Add watermark to PDF", PDF, "pdf", false),
        WATERMARK_PARAMS,
    ),
    with_params(
        simple("protect", "Protect PDF", "Add password to PDF", PDF, "pdf", false),
        PROTECT_PARAMS,
    ),
    with_params(
        simple("unlock", "Unlock PDF", "Remove PDF password", PDF, "pdf", false),
        UNLOCK_PARAMS,
    ),
    with_params(
        simple("sign", "Sign PDF", "Add signature to PDF", PDF, "pdf", false),
        SIGN_PARAMS,
    ),
];

/// Every tool, in catalog order.
pub fn all() -> &'static [ToolSpec] {
    TOOLS
}

/// Look up a tool by id. Total: unknown ids yield `None`.
pub fn lookup(id: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.id == id)
}

/// Like [`lookup`], but an unknown id is a [`ToolboxError::UnknownTool`].
pub fn resolve(id: &str) -> Result<&'static ToolSpec, ToolboxError> {
    lookup(id).ok_or_else(|| ToolboxError::UnknownTool { id: id.to_string() })
}

/// Filter the catalog by a case-insensitive substring of title or description.
///
/// A blank query returns the whole catalog.
pub fn search(query: &str) -> Vec<&'static ToolSpec> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return TOOLS.iter().collect();
    }
    TOOLS
        .iter()
        .filter(|t| {
            t.title.to_lowercase().contains(&query)
                || t.description.to_lowercase().contains(&query)
        })
        .collect()
}
