//! Pipeline stages between a file drop and a finished job.
//!
//! Each submodule implements exactly one step and is pure apart from the
//! preview fetch, so every stage is testable without a server. The
//! orchestrator in [`crate::job`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ (preview, params) ──▶ request ──▶ backend ──▶ response
//! (type/size)  (pages, values)     (multipart)   (HTTP)     (file/text)
//! ```
//!
//! 1. [`intake`]   validate candidate files and stage the accepted ones
//! 2. [`preview`]  fetch page thumbnails and track the page selection;
//!    only for tools that act on individual pages
//! 3. [`params`]   turn raw widget values into the normalized parameter bag,
//!    applying the slider transforms the server expects
//! 4. [`request`]  lay out files, parameters and page removals as one
//!    multipart request
//! 5. [`response`] classify the reply by tool and name the output file

pub mod intake;
pub mod params;
pub mod preview;
pub mod request;
pub mod response;
