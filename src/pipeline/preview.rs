//! Page previews and page selection.
//!
//! Tools that act on individual pages need one extra round trip before the
//! user can submit: the staged document goes to `/api/preview-pages`, and
//! the thumbnails that come back drive a multi-select. The fetcher is a pure
//! transform over that response. It keeps the server's page order as-is and
//! never reorders or deduplicates.

use crate::backend::{PreviewResponse, ProcessingBackend};
use crate::error::{PreviewFailure, ValidationError};
use crate::pipeline::intake::StagedFile;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Decoded thumbnail image.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    mime_type: String,
    bytes: Vec<u8>,
}

impl Thumbnail {
    /// Decode inline image data: a `data:<mime>;base64,<payload>` URI or bare base64.
    pub fn from_inline(data: &str) -> Result<Self, String> {
        let (mime_type, payload) = match data.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| "data URI has no payload".to_string())?;
                let mime = header.strip_suffix(";base64").ok_or_else(|| {
                    format!("data URI is not base64-encoded ('{header}')")
                })?;
                (mime.to_string(), payload)
            }
            None => ("image/png".to_string(), data),
        };
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("invalid base64 image data: {e}"))?;
        Ok(Self { mime_type, bytes })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// File extension sniffed from the image bytes, falling back to the declared MIME type.
    pub fn extension(&self) -> &'static str {
        match image::guess_format(&self.bytes) {
            Ok(image::ImageFormat::Jpeg) => "jpg",
            Ok(image::ImageFormat::Png) => "png",
            _ => match self.mime_type.as_str() {
                "image/jpeg" | "image/jpg" => "jpg",
                _ => "png",
            },
        }
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One previewed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePreview {
    /// 1-based page number as reported by the server.
    pub page_number: u32,
    pub thumbnail: Thumbnail,
}

/// Turn a preview response into an ordered preview list.
pub fn previews_from_response(response: PreviewResponse) -> Result<Vec<PagePreview>, PreviewFailure> {
    if response.pages.len() != response.total_pages as usize {
        warn!(
            "Preview lists {} pages but reports totalPages={}",
            response.pages.len(),
            response.total_pages
        );
    }
    response
        .pages
        .into_iter()
        .map(|page| {
            if page.page_number == 0 {
                return Err(PreviewFailure {
                    message: "server returned page number 0".into(),
                });
            }
            let thumbnail = Thumbnail::from_inline(&page.image_data).map_err(|e| PreviewFailure {
                message: format!("page {}: {}", page.page_number, e),
            })?;
            Ok(PagePreview {
                page_number: page.page_number,
                thumbnail,
            })
        })
        .collect()
}

/// Fetch thumbnails for `file`, bounded by `timeout`.
pub async fn fetch_previews(
    backend: &dyn ProcessingBackend,
    file: &StagedFile,
    timeout: Duration,
) -> Result<Vec<PagePreview>, PreviewFailure> {
    debug!("Fetching page previews for '{}'", file.name());
    let response = match tokio::time::timeout(timeout, backend.preview_pages(file)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            return Err(PreviewFailure {
                message: e.user_message(),
            })
        }
        Err(_) => {
            return Err(PreviewFailure {
                message: format!("timed out after {}s", timeout.as_secs()),
            })
        }
    };
    let previews = previews_from_response(response)?;
    debug!("Loaded {} page previews", previews.len());
    Ok(previews)
}

/// Thumbnails plus the set of pages the user picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelectionState {
    previews: Vec<PagePreview>,
    selected: BTreeSet<u32>,
}

impl PageSelectionState {
    pub fn previews(&self) -> &[PagePreview] {
        &self.previews
    }

    pub fn is_loaded(&self) -> bool {
        !self.previews.is_empty()
    }

    /// Replace the previews; any previous selection is cleared.
    pub fn set_previews(&mut self, previews: Vec<PagePreview>) {
        self.previews = previews;
        self.selected.clear();
    }

    /// Selected page numbers, ascending.
    pub fn selected(&self) -> impl Iterator<Item = u32> + '_ {
        self.selected.iter().copied()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_selected(&self, page: u32) -> bool {
        self.selected.contains(&page)
    }

    /// Flip one page. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, page: u32) -> Result<bool, ValidationError> {
        self.ensure_known(page)?;
        if self.selected.remove(&page) {
            Ok(false)
        } else {
            self.selected.insert(page);
            Ok(true)
        }
    }

    pub fn select(&mut self, page: u32) -> Result<(), ValidationError> {
        self.ensure_known(page)?;
        self.selected.insert(page);
        Ok(())
    }

    pub fn deselect(&mut self, page: u32) {
        self.selected.remove(&page);
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Submission check: previews loaded, at least one page picked, and at
    /// least one page left over.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.is_loaded() {
            return Err(ValidationError::PreviewsNotLoaded);
        }
        if self.selected.is_empty() {
            return Err(ValidationError::NoPagesSelected);
        }
        let total = self.distinct_pages();
        if self.selected.len() >= total {
            return Err(ValidationError::AllPagesSelected { total });
        }
        Ok(())
    }

    /// Number of distinct page numbers among the previews.
    fn distinct_pages(&self) -> usize {
        self.previews
            .iter()
            .map(|p| p.page_number)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Selected pages as an ascending comma-joined list, e.g. `2,5,7`.
    pub fn removal_list(&self) -> String {
        self.selected
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn ensure_known(&self, page: u32) -> Result<(), ValidationError> {
        if self.previews.iter().any(|p| p.page_number == page) {
            Ok(())
        } else {
            Err(ValidationError::PageOutOfRange {
                page,
                total: self.distinct_pages(),
            })
        }
    }
}
