//! Parameterized insert statements
//!
//! Rows are never rendered into SQL text. Identifiers are quoted, values are
//! bound as `$1..$n`.

use serde_json::Value;

use crate::{FeatureInsert, MisfitRecord};

/// SQL text plus bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<Value>,
}

const KEY_COLUMNS: [&str; 4] = ["node_id", "datetime", "meta_id", "sensor"];

/// Quote an identifier, doubling embedded double quotes
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn insert(table: &str, columns: &[&str], params: Vec<Value>) -> Statement {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    Statement {
        text: format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote_ident(table)
        ),
        params,
    }
}

impl Statement {
    /// Insert of one feature row
    pub fn feature_insert(row: &FeatureInsert) -> Self {
        let mut columns: Vec<&str> = KEY_COLUMNS.to_vec();
        let mut params = vec![
            Value::from(row.node_id.as_str()),
            Value::from(row.datetime.as_str()),
            Value::from(row.meta_id),
            Value::from(row.sensor.as_str()),
        ];
        for (property, value) in &row.values {
            columns.push(property);
            params.push(value.clone());
        }
        insert(&row.table(), &columns, params)
    }

    /// Insert of one misfit row, data stored as a JSON blob
    pub fn misfit_insert(record: &MisfitRecord) -> Self {
        let mut columns: Vec<&str> = KEY_COLUMNS.to_vec();
        columns.push("data");
        let params = vec![
            Value::from(record.node_id.as_str()),
            Value::from(record.datetime.as_str()),
            Value::from(record.meta_id),
            Value::from(record.sensor.as_str()),
            Value::from(record.data_blob()),
        ];
        insert(&record.table(), &columns, params)
    }
}
