//! Delimited-table parsing: raw text → header record + data records.
//!
//! Code tables arrive from spreadsheets exported on different machines, so
//! neither the delimiter nor the line endings are known in advance. Both are
//! normalised here so every later stage sees plain `Vec<String>` records.
//!
//! ## Known limitation
//!
//! A `"` simply toggles quoted mode and is never emitted. A doubled quote
//! inside a quoted field (`"say ""hi"""`) therefore closes and immediately
//! reopens the field instead of producing a literal quote character.

use crate::error::StampError;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// One table row as text fields.
pub type Record = Vec<String>;

/// A data row and the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub line: usize,
    pub fields: Record,
}

/// The result of [`parse_table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTable {
    pub delimiter: char,
    pub header: Record,
    pub rows: Vec<TableRow>,
}

/// Read a table file byte-for-byte and parse it.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; there is no
/// transcoding step.
pub fn read_table(path: &Path) -> Result<ParsedTable, StampError> {
    let bytes = std::fs::read(path).map_err(|source| StampError::TableReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&String::from_utf8_lossy(&bytes))
}

/// Parse delimited text whose first non-blank line is the header.
///
/// # Errors
/// [`StampError::EmptyTable`] when there are no lines at all, or a header
/// and no data rows.
pub fn parse_table(raw: &str) -> Result<ParsedTable, StampError> {
    let text = normalise_line_endings(raw.strip_prefix('\u{FEFF}').unwrap_or(raw));

    let mut lines = text
        .split('\n')
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        return Err(StampError::EmptyTable {
            reason: "no lines".into(),
        });
    };

    let delimiter = infer_delimiter(header_line);
    let header = split_fields(header_line.trim_end(), delimiter);

    let rows: Vec<TableRow> = lines
        .map(|(idx, line)| TableRow {
            line: idx + 1,
            fields: split_fields(line.trim_end(), delimiter),
        })
        .collect();

    if rows.is_empty() {
        return Err(StampError::EmptyTable {
            reason: "header line only, no data rows".into(),
        });
    }

    debug!(
        "Parsed table: delimiter={:?}, {} columns, {} rows",
        delimiter,
        header.len(),
        rows.len()
    );

    Ok(ParsedTable {
        delimiter,
        header,
        rows,
    })
}

/// CRLF and lone CR → LF.
pub fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Pick the delimiter from the header line alone.
///
/// Comma wins whenever present; otherwise semicolon, then tab; a header with
/// none of them is a single comma-delimited column.
pub fn infer_delimiter(header_line: &str) -> char {
    if header_line.contains(',') {
        ','
    } else if header_line.contains(';') {
        ';'
    } else if header_line.contains('\t') {
        '\t'
    } else {
        ','
    }
}

/// Split one line on `delimiter`, treating delimiters inside `"…"` as text.
pub fn split_fields(line: &str, delimiter: char) -> Record {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in line.chars() {
        if ch == '"' {
            quoted = !quoted;
        } else if ch == delimiter && !quoted {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}
