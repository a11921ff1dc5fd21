//! Outbound request construction.
//!
//! A [`JobRequest`] is the transport-neutral shape of one multipart
//! submission: the staged files under the tool's file field, every resolved
//! parameter under its semantic key, and the pages to remove for
//! page-selection tools. The HTTP backend turns it into a real multipart form;
//! tests inspect it directly.

use crate::pipeline::intake::StagedFile;
use crate::pipeline::params::{ParamValue, ParameterBag};
use crate::pipeline::preview::PageSelectionState;
use crate::registry::{ToolSpec, PAGES_TO_REMOVE_FIELD};

/// A file attached to the form under `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file: StagedFile,
}

/// One multipart submission to `/api/{tool_id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub tool_id: &'static str,
    pub files: Vec<FilePart>,
    pub fields: Vec<(String, String)>,
}

impl JobRequest {
    /// First text field named `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Names of the files attached under `field`, in order.
    pub fn file_names(&self, field: &str) -> Vec<&str> {
        self.files
            .iter()
            .filter(|p| p.field == field)
            .map(|p| p.file.name())
            .collect()
    }
}

/// Assemble the request for `spec`.
///
/// Callers validate first; this function only arranges already-checked data.
pub fn build_request(
    spec: &'static ToolSpec,
    staged: &[StagedFile],
    bag: &ParameterBag,
    selection: Option<&PageSelectionState>,
) -> JobRequest {
    let mut files: Vec<FilePart> = staged
        .iter()
        .map(|f| FilePart {
            field: spec.file_field().to_string(),
            file: f.clone(),
        })
        .collect();
    let mut fields = Vec::with_capacity(bag.len() + 1);

    for (key, value) in bag.iter() {
        match value {
            ParamValue::Asset(file) => files.push(FilePart {
                field: key.to_string(),
                file: file.clone(),
            }),
            other => fields.push((key.to_string(), other.to_string())),
        }
    }

    if spec.page_selection {
        if let Some(selection) = selection {
            fields.push((PAGES_TO_REMOVE_FIELD.to_string(), selection.removal_list()));
        }
    }

    JobRequest {
        tool_id: spec.id,
        files,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::params::{collect, ParameterInputs};
    use crate::registry::lookup;

    fn pdf(name: &str) -> StagedFile {
        StagedFile::new(name, b"%PDF".to_vec())
    }

    #[test]
    fn multi_file_tools_repeat_files_field() {
        let merge = lookup("merge").unwrap();
        let req = build_request(merge, &[pdf("a.pdf"), pdf("b.pdf")], &ParameterBag::default(), None);
        assert_eq!(req.file_names("files"), vec!["a.pdf", "b.pdf"]);
        assert!(req.file_names("file").is_empty());
        assert!(req.fields.is_empty());
    }

    #[test]
    fn single_file_tools_use_file_field() {
        let sign = lookup("sign").unwrap();
        let mut inputs = ParameterInputs::default();
        inputs.set_text("signature_text", "Ada Lovelace");
        let bag = collect(sign, &inputs).unwrap();
        let req = build_request(sign, &[pdf("c.pdf")], &bag, None);
        assert_eq!(req.tool_id, "sign");
        assert_eq!(req.file_names("file"), vec!["c.pdf"]);
        assert_eq!(req.field("signature_text"), Some("Ada Lovelace"));
    }

    #[test]
    fn watermark_sends_scaled_values_and_asset() {
        let wm = lookup("watermark").unwrap();
        let mut inputs = ParameterInputs::default();
        inputs.apply_defaults(wm);
        inputs.set_text("watermark_type", "image");
        inputs.attach("image", StagedFile::new("logo.png", vec![7u8]));
        inputs.set_level("rotation", 45);
        let bag = collect(wm, &inputs).unwrap();
        let req = build_request(wm, &[pdf("d.pdf")], &bag, None);

        assert_eq!(req.file_names("image"), vec!["logo.png"]);
        assert_eq!(req.field("watermark_type"), Some("image"));
        assert_eq!(req.field("opacity"), Some("0.3"));
        assert_eq!(req.field("rotation"), Some("162"));
        assert_eq!(req.field("size"), Some("60"));
        assert_eq!(req.field("text"), None);
    }

    #[test]
    fn non_selection_tools_never_send_removals() {
        let compress = lookup("compress").unwrap();
        let req = build_request(compress, &[pdf("e.pdf")], &ParameterBag::default(), None);
        assert_eq!(req.field(PAGES_TO_REMOVE_FIELD), None);
    }
}
