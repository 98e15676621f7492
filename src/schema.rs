// src/schema.rs
//! Table definitions declared to the host.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyze::LinguisticScores;
use crate::config::Configuration;
use crate::ingest::types::ARTICLE_TABLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    String,
    UtcDatetime,
    Float,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub table: &'static str,
    pub primary_key: Vec<&'static str>,
    pub columns: BTreeMap<&'static str, ColumnType>,
}

/// One table, `article`, keyed by (`source`, `published_at`).
pub fn schema(_configuration: &Configuration) -> Vec<TableDefinition> {
    vec![article_table()]
}

pub fn article_table() -> TableDefinition {
    let mut columns = BTreeMap::from([
        ("source", ColumnType::String),
        ("published_at", ColumnType::UtcDatetime),
        ("author", ColumnType::String),
        ("title", ColumnType::String),
        ("description", ColumnType::String),
        ("content", ColumnType::String),
        ("url", ColumnType::String),
        ("topic", ColumnType::String),
    ]);
    // Tabula Lingua scores
    for name in LinguisticScores::column_names() {
        columns.insert(name, ColumnType::Float);
    }
    TableDefinition {
        table: ARTICLE_TABLE,
        primary_key: vec!["source", "published_at"],
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_table_declares_key_and_score_columns() {
        let t = article_table();
        assert_eq!(t.table, "article");
        assert_eq!(t.primary_key, vec!["source", "published_at"]);
        assert_eq!(t.columns.len(), 18);
        assert_eq!(t.columns["published_at"], ColumnType::UtcDatetime);
        assert_eq!(t.columns["p7"], ColumnType::Float);

        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["columns"]["published_at"], "UTC_DATETIME");
        assert_eq!(v["columns"]["blue"], "FLOAT");
        assert_eq!(v["columns"]["url"], "STRING");
    }
}
