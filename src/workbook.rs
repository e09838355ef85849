//! Tabular sources and sinks: named sheets of loosely typed rows.
//!
//! A workbook on disk is either a directory holding one `<Sheet Name>.csv`
//! per sheet, or a single `.json` file of the form
//! `{"sheets":[{"name":"Sprints","rows":[{..}]}]}`. Cells are kept as JSON
//! values so numbers survive JSON workbooks; CSV cells are always strings and
//! are parsed on demand.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{PlannerError, Result};
use crate::fields::normalise_sheet_name;

/// One spreadsheet row keyed by column header.
pub type Row = Map<String, Value>;

/// A named sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    /// Column order for writers. Derived from the rows when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Sheet {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Columns in write order: declared columns, else first-seen row keys.
    pub fn column_order(&self) -> Vec<String> {
        if !self.columns.is_empty() {
            return self.columns.clone();
        }
        let mut cols: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !cols.contains(key) {
                    cols.push(key.clone());
                }
            }
        }
        cols
    }
}

/// An ordered set of sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Find a sheet by name, trimmed and case-insensitive.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        let wanted = normalise_sheet_name(name);
        self.sheets.iter().find(|s| normalise_sheet_name(&s.name) == wanted)
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    /// Append a sheet unless it has no rows.
    pub fn push_non_empty(&mut self, sheet: Sheet) {
        if !sheet.rows.is_empty() {
            self.sheets.push(sheet);
        }
    }

    /// Read a workbook from a CSV directory or a `.json` file.
    pub fn load(path: &Path) -> Result<Workbook> {
        if path.is_dir() {
            read_csv_dir(path)
        } else if is_json_path(path) {
            let text = fs::read_to_string(path)
                .map_err(|e| PlannerError::workbook(path, e.to_string()))?;
            serde_json::from_str(&text).map_err(|e| PlannerError::workbook(path, e.to_string()))
        } else if !path.exists() {
            Err(PlannerError::workbook(path, "no such file or directory"))
        } else {
            Err(PlannerError::UnsupportedFormat { path: path.to_path_buf() })
        }
    }

    /// Write a workbook: `.json` paths get one JSON file, anything else a CSV directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if is_json_path(path) {
            let data = serde_json::to_string_pretty(self)?;
            fs::write(path, data)?;
        } else {
            fs::create_dir_all(path)?;
            for sheet in &self.sheets {
                let file = path.join(format!("{}.csv", sheet.name));
                fs::write(&file, write_csv(sheet))?;
                debug!(sheet = %sheet.name, rows = sheet.rows.len(), "sheet written");
            }
        }
        Ok(())
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn read_csv_dir(dir: &Path) -> Result<Workbook> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PlannerError::workbook(dir, e.to_string()))? {
        let path = entry.map_err(|e| PlannerError::workbook(dir, e.to_string()))?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(PlannerError::workbook(dir, "no .csv sheets found"));
    }
    files.sort();

    let mut book = Workbook::default();
    for file in files {
        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let text = fs::read_to_string(&file)
            .map_err(|e| PlannerError::workbook(&file, e.to_string()))?;
        let sheet = parse_csv(&name, &text).map_err(|msg| PlannerError::workbook(&file, msg))?;
        book.sheets.push(sheet);
    }
    Ok(book)
}

/// Parse CSV text into records. Handles quoted fields, doubled quotes,
/// CRLF line endings and newlines inside quotes.
fn parse_records(text: &str) -> std::result::Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Escaped quote
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut current_field));
                records.push(std::mem::take(&mut fields));
            }
            _ => current_field.push(ch),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if !current_field.is_empty() || !fields.is_empty() {
        fields.push(current_field);
        records.push(fields);
    }
    Ok(records)
}

/// Parse one CSV sheet. The first record is the header row.
pub fn parse_csv(name: &str, text: &str) -> std::result::Result<Sheet, String> {
    let mut records = parse_records(text)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(Sheet::new(name, &[]));
    };
    let columns: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

    let mut sheet = Sheet { name: name.to_string(), columns: columns.clone(), rows: Vec::new() };
    for (line, record) in records.enumerate() {
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() > columns.len() {
            warn!(sheet = name, record = line + 2, "extra fields beyond header ignored");
        }
        let row: Row = columns
            .iter()
            .zip(record)
            .filter(|(col, _)| !col.is_empty())
            .map(|(col, val)| (col.clone(), Value::String(val)))
            .collect();
        sheet.rows.push(row);
    }
    Ok(sheet)
}

/// Render a sheet as CSV text with a header row.
pub fn write_csv(sheet: &Sheet) -> String {
    let columns = sheet.column_order();
    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| escape_csv(c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in &sheet.rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| escape_csv(&row.get(c).map(plain_text).unwrap_or_default()))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Escape CSV fields that contain commas, quotes or line breaks.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn plain_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Text of a cell, trimmed. Empty and null cells read as `None`.
pub fn cell_text(v: &Value) -> Option<String> {
    let text = match v {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Numeric value of a cell, parsing strings.
pub fn cell_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// The first column, in priority order, whose cell is non-empty.
///
/// Later aliases are only consulted when every earlier one is absent or empty,
/// so a field never mixes values from two columns.
pub fn first_of<'a>(row: &'a Row, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| row.get(*n))
        .find(|v| cell_text(v).is_some())
}

pub fn text_of(row: &Row, names: &[&str]) -> Option<String> {
    first_of(row, names).and_then(cell_text)
}

/// Number from the first non-empty alias. An unparsable winning cell yields
/// `None` rather than falling through to an older alias.
pub fn number_of(row: &Row, names: &[&str]) -> Option<f64> {
    first_of(row, names).and_then(cell_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_parse_csv_quotes_and_newlines() {
        let text = "Template ID,Template Name,Items (JSON)\r\n\
                    t1,\"Std, big\",\"[{\"\"taskName\"\":\"\"A\"\"}]\"\n\
                    t2,\"Two\nLines\",\n\n";
        let sheet = parse_csv("Feature Templates", text).unwrap();
        assert_eq!(sheet.columns, vec!["Template ID", "Template Name", "Items (JSON)"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0]["Template Name"], "Std, big");
        assert_eq!(sheet.rows[0]["Items (JSON)"], "[{\"taskName\":\"A\"}]");
        assert_eq!(sheet.rows[1]["Template Name"], "Two\nLines");
    }

    #[test]
    fn test_parse_csv_unterminated_quote() {
        assert!(parse_csv("x", "a,b\n\"oops,1\n").is_err());
    }

    #[test]
    fn test_write_then_parse_csv() {
        let mut sheet = Sheet::new("Tasks", &["id", "Name", "StoryPoints"]);
        sheet.rows.push(row(json!({"id": "t1", "Name": "Say \"hi\", twice", "StoryPoints": 5})));
        let text = write_csv(&sheet);
        let back = parse_csv("Tasks", &text).unwrap();
        assert_eq!(back.rows[0]["Name"], "Say \"hi\", twice");
        assert_eq!(back.rows[0]["StoryPoints"], "5");
    }

    #[test]
    fn test_first_of_prefers_current_name() {
        let r = row(json!({"Sprint": "", "SprintAssignment": "S1"}));
        assert_eq!(text_of(&r, &["Sprint", "SprintAssignment"]), Some("S1".into()));
        let r = row(json!({"Sprint": "S2", "SprintAssignment": "S1"}));
        assert_eq!(text_of(&r, &["Sprint", "SprintAssignment"]), Some("S2".into()));
    }

    #[test]
    fn test_number_of_does_not_mix_aliases() {
        let r = row(json!({"Story Points": "lots", "Custom field (Story Points)": "3"}));
        assert_eq!(number_of(&r, &["Story Points", "Custom field (Story Points)"]), None);
        let r = row(json!({"Story Points": 5}));
        assert_eq!(number_of(&r, &["Story Points"]), Some(5.0));
    }

    #[test]
    fn test_cell_text_numbers() {
        assert_eq!(cell_text(&json!(20)), Some("20".into()));
        assert_eq!(cell_text(&json!(2.5)), Some("2.5".into()));
        assert_eq!(cell_text(&json!("  ")), None);
        assert_eq!(cell_text(&Value::Null), None);
    }

    #[test]
    fn test_sheet_lookup_is_case_insensitive() {
        let book = Workbook { sheets: vec![Sheet::new("  JIRA Tasks ", &[])] };
        assert!(book.has_sheet("jira tasks"));
        assert!(!book.has_sheet("sprints"));
    }

    #[test]
    fn test_load_save_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = Sheet::new("Sprints", &["id", "Name"]);
        sheet.rows.push(row(json!({"id": "S1", "Name": "Sprint 1"})));
        let book = Workbook { sheets: vec![sheet] };

        let json_path = dir.path().join("book.json");
        book.save(&json_path).unwrap();
        assert_eq!(Workbook::load(&json_path).unwrap(), book);

        let csv_dir = dir.path().join("book");
        book.save(&csv_dir).unwrap();
        let loaded = Workbook::load(&csv_dir).unwrap();
        assert_eq!(loaded.sheets[0].name, "Sprints");
        assert_eq!(loaded.sheets[0].rows[0]["Name"], "Sprint 1");
    }

    #[test]
    fn test_load_errors_are_file_level() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{nope").unwrap();
        assert!(matches!(Workbook::load(&bad), Err(PlannerError::Workbook { .. })));
        assert!(matches!(Workbook::load(dir.path()), Err(PlannerError::Workbook { .. })));
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "x").unwrap();
        assert!(matches!(Workbook::load(&txt), Err(PlannerError::UnsupportedFormat { .. })));
    }
}
