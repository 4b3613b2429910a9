//! Optional pre-aggregation: one row per page instead of one row per code.
//!
//! Mapping tables often list every code on its own line. Grouping collapses
//! all rows that name the same page into a single `Page,Standard Code` row
//! whose code field is the sorted, de-duplicated list joined with `", "`,
//! so each page gets exactly one annotation.

use crate::error::StampError;
use crate::pipeline::columns::{ColumnLabels, ColumnMap};
use crate::pipeline::table::{ParsedTable, TableRow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Standards codes such as `L.8.6`, `RL.8.10`, `CCSS.W.8.1A`.
static RE_STANDARD_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:CCSS\.)?([A-Z]{1,3}\.\d{1,2}\.\d+[A-Z]?)").unwrap());

/// Find every standards code in free text, uppercased and `CCSS.`-prefixed,
/// in order of appearance.
pub fn extract_codes(text: &str) -> Vec<String> {
    RE_STANDARD_CODE
        .captures_iter(text)
        .map(|caps| format!("CCSS.{}", caps[1].to_uppercase()))
        .collect()
}

/// Sort key: numeric pages first in numeric order, then everything else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PageKey {
    Number(u32),
    Text(String),
}

impl PageKey {
    fn of(field: &str) -> Self {
        let field = field.trim();
        match field.parse::<u32>() {
            Ok(n) => PageKey::Number(n),
            Err(_) => PageKey::Text(field.to_string()),
        }
    }

    fn as_field(&self) -> String {
        match self {
            PageKey::Number(n) => n.to_string(),
            PageKey::Text(s) => s.clone(),
        }
    }
}

/// Collapse `table` to one row per page.
///
/// The code field of each source row is split on commas; with `extract`
/// set, codes are instead pulled out of the field text by pattern and rows
/// without any recognisable code contribute nothing. The result has the
/// header `labels.page, labels.code` in columns 0 and 1, and each grouped
/// row keeps the line number of the first source row for its page.
pub fn group_by_page(
    table: &ParsedTable,
    columns: ColumnMap,
    labels: &ColumnLabels,
    extract: bool,
) -> ParsedTable {
    let mut groups: BTreeMap<PageKey, (usize, BTreeSet<String>)> = BTreeMap::new();

    for row in &table.rows {
        let page = row.fields.get(columns.page).map(String::as_str).unwrap_or("");
        let raw = row.fields.get(columns.code).map(String::as_str).unwrap_or("");

        let codes: Vec<String> = if extract {
            extract_codes(raw)
        } else {
            raw.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        };
        if extract && codes.is_empty() {
            continue;
        }

        let entry = groups
            .entry(PageKey::of(page))
            .or_insert_with(|| (row.line, BTreeSet::new()));
        entry.1.extend(codes);
    }

    let rows: Vec<TableRow> = groups
        .into_iter()
        .map(|(key, (line, codes))| TableRow {
            line,
            fields: vec![
                key.as_field(),
                codes.into_iter().collect::<Vec<_>>().join(", "),
            ],
        })
        .collect();

    debug!("Grouped {} rows into {} pages", table.rows.len(), rows.len());

    ParsedTable {
        delimiter: ',',
        header: vec![labels.page.clone(), labels.code.clone()],
        rows,
    }
}

/// Write a table as comma-delimited text, quoting fields that need it.
pub fn write_table(path: &Path, table: &ParsedTable) -> Result<(), StampError> {
    let write_failed = |source| StampError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut out = std::fs::File::create(path).map_err(write_failed)?;
    writeln!(out, "{}", join_record(&table.header)).map_err(write_failed)?;
    for row in &table.rows {
        writeln!(out, "{}", join_record(&row.fields)).map_err(write_failed)?;
    }
    Ok(())
}

fn join_record(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| {
            if f.contains(',') || f.contains('"') {
                // Embedded quotes are dropped; the reader cannot escape them.
                format!("\"{}\"", f.replace('"', ""))
            } else {
                f.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
