//! In-memory values the store knows how to serialize.
//!
//! Format handlers are monomorphic over [`Payload`] so that the registry can
//! hold them as trait objects; the variants cover the domains of the built-in
//! tags (raw text, raw bytes, JSON documents, and tabular data).

use serde::{Deserialize, Serialize};

/// A value passed to `save` or produced by `load`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// UTF-8 text (also used by the html tag).
    Text(String),
    /// Raw bytes, written and read back verbatim.
    Bytes(Vec<u8>),
    /// A JSON document.
    Json(serde_json::Value),
    /// Tabular data for the csv/parquet handlers.
    Table(Table),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Payload::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Table> for Payload {
    fn from(value: Table) -> Self {
        Payload::Table(value)
    }
}

/// A named-column table. Rows are positional against `columns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A single table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    /// Render the cell the way the csv handler writes it. `Null` becomes an
    /// empty field.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Str(s) => s.clone(),
        }
    }

    /// Parse a textual field back into the narrowest matching cell type.
    /// Empty fields are `Null`; integers win over floats; `true`/`false`
    /// parse as booleans; everything else stays a string.
    pub fn infer(field: &str) -> Cell {
        if field.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = field.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = field.parse::<f64>() {
            return Cell::Float(f);
        }
        match field {
            "true" => Cell::Bool(true),
            "false" => Cell::Bool(false),
            _ => Cell::Str(field.to_string()),
        }
    }
}
