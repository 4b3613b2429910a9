//! Page resolution: printed page number → page of the open document.
//!
//! ## Two tiers
//!
//! The number printed on a page and its position in the file rarely agree:
//! front matter numbered i, ii, iii pushes "1" to the fourth physical page,
//! and some documents restart numbering per section. When the document
//! declares page names, the name is the authority. When it doesn't (or the
//! name is absent), the number is taken as a 1-based position instead.

use crate::engine::{AnnotatableDocument, PageHandle};
use crate::error::RowError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a page reference was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    ByName,
    ByOrdinal,
}

/// A page located for one row. Not cached between rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    pub handle: PageHandle,
    /// The page number from the table.
    pub number: u32,
    /// The page's declared name.
    pub name: String,
    pub method: ResolutionMethod,
}

/// Parse the page column of a row.
///
/// Reads the leading decimal digits after optional whitespace and `+`, so
/// spreadsheet exports such as `"3.0"` or `"3a"` give page 3. No digits, a
/// zero or an overflowing value is an invalid reference.
pub fn parse_page_reference(field: &str, line: usize) -> Result<u32, RowError> {
    let trimmed = field.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());

    match unsigned[..end].parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RowError::InvalidPageReference {
            line,
            value: field.to_string(),
        }),
    }
}

/// Find the page printed as `number`.
///
/// Tier 1 asks the document for a page named `number`; tier 2 takes the
/// page at position `number` (1-based) when it is within the document.
/// Returns `None` when neither matches. Never mutates the document.
pub fn resolve_page<D: AnnotatableDocument + ?Sized>(doc: &D, number: u32) -> Option<ResolvedPage> {
    let name = number.to_string();

    match doc.page_by_name(&name) {
        Ok(Some(handle)) => {
            return Some(ResolvedPage {
                handle,
                number,
                name,
                method: ResolutionMethod::ByName,
            });
        }
        Ok(None) => debug!("No page named {:?}, trying position", name),
        Err(e) => debug!("Name lookup for {:?} failed ({}), trying position", name, e),
    }

    let total = doc.page_count();
    let ordinal = number as usize;
    if ordinal < 1 || ordinal > total {
        debug!("Page {} out of range (document has {})", number, total);
        return None;
    }

    let handle = match doc.page_at(ordinal - 1) {
        Ok(handle) => handle,
        Err(e) => {
            debug!("Position lookup for page {} failed: {}", number, e);
            return None;
        }
    };
    let name = doc
        .page_name(handle)
        .unwrap_or_else(|_| ordinal.to_string());

    Some(ResolvedPage {
        handle,
        number,
        name,
        method: ResolutionMethod::ByOrdinal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{Faults, MemoryDocument};

    #[test]
    fn parse_page_reference_reads_leading_digits() {
        assert_eq!(parse_page_reference("3", 2), Ok(3));
        assert_eq!(parse_page_reference("  12 ", 2), Ok(12));
        assert_eq!(parse_page_reference("3.0", 2), Ok(3));
        assert_eq!(parse_page_reference("3a", 2), Ok(3));
        assert_eq!(parse_page_reference("+7", 2), Ok(7));
        for bad in ["", "  ", "abc", "0", "0.9", "-4", ".5", "99999999999"] {
            assert!(
                matches!(
                    parse_page_reference(bad, 9),
                    Err(RowError::InvalidPageReference { line: 9, .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn name_match_wins_over_position() {
        let doc = MemoryDocument::with_page_names(["i", "ii", "1", "2", "3"]);
        let page = resolve_page(&doc, 1).unwrap();
        assert_eq!(page.handle.index(), 2);
        assert_eq!(page.method, ResolutionMethod::ByName);
        assert_eq!(page.name, "1");
    }

    #[test]
    fn falls_back_to_position_when_names_differ() {
        let names: Vec<String> = (0..10).map(|i| format!("A-{i}")).collect();
        let doc = MemoryDocument::with_page_names(names);
        let page = resolve_page(&doc, 5).unwrap();
        assert_eq!(page.handle.index(), 4);
        assert_eq!(page.method, ResolutionMethod::ByOrdinal);
        assert_eq!(page.name, "A-4");
    }

    #[test]
    fn falls_back_when_name_lookup_errors() {
        let doc = MemoryDocument::with_pages(4).with_faults(Faults {
            name_lookup: true,
            ..Faults::default()
        });
        let page = resolve_page(&doc, 2).unwrap();
        assert_eq!(page.method, ResolutionMethod::ByOrdinal);
        assert_eq!(page.handle.index(), 1);
    }

    #[test]
    fn out_of_range_is_not_found() {
        let doc = MemoryDocument::with_pages(10);
        assert!(resolve_page(&doc, 11).is_none());
        assert!(resolve_page(&doc, 99).is_none());
        assert!(resolve_page(&doc, 0).is_none());
    }

    #[test]
    fn resolution_does_not_touch_the_document() {
        let doc = MemoryDocument::with_pages(3);
        let _ = resolve_page(&doc, 2);
        let _ = resolve_page(&doc, 7);
        assert!(doc.regions().is_empty());
        assert_eq!(doc.layer_names(), vec!["Layer 1"]);
    }
}
