//! Pipeline stages for stamping a code table onto a document.
//!
//! Each submodule implements exactly one step. None of them opens, saves or
//! closes a document; that lifecycle belongs to [`crate::annotate`].
//!
//! ## Data Flow
//!
//! ```text
//! table ──▶ columns ──▶ (group) ──▶ pages ──▶ place
//! (text)    (indices)   (per page)  (handle)  (region)
//! ```
//!
//! 1. [`table`]  : split raw text into records, inferring the delimiter
//! 2. [`columns`]: locate the page and code columns by header label
//! 3. [`group`]  : optionally collapse rows to one per page
//! 4. [`pages`]  : map a printed page number to a page of the document
//! 5. [`place`]  : add the annotation and apply best-effort styling

pub mod columns;
pub mod group;
pub mod pages;
pub mod place;
pub mod table;
