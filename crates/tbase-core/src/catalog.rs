use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Column metadata read from `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub ordinal_position: i32,
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
}

/// A base table and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTable {
    pub schema: String,
    pub name: String,
    pub columns: Vec<CatalogColumn>,
}

impl CatalogTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }
}

/// Snapshot of the tables a plan may reference.
///
/// Serializes as a list of tables ordered by schema and name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CatalogTable>", into = "Vec<CatalogTable>")]
pub struct Catalog {
    tables: BTreeMap<(String, String), CatalogTable>,
}

impl Catalog {
    pub fn new(tables: impl IntoIterator<Item = CatalogTable>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|table| ((table.schema.clone(), table.name.clone()), table))
                .collect(),
        }
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&CatalogTable> {
        self.tables.get(&(schema.to_string(), name.to_string()))
    }

    pub fn tables(&self) -> impl Iterator<Item = &CatalogTable> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl From<Vec<CatalogTable>> for Catalog {
    fn from(tables: Vec<CatalogTable>) -> Self {
        Catalog::new(tables)
    }
}

impl From<Catalog> for Vec<CatalogTable> {
    fn from(catalog: Catalog) -> Self {
        catalog.tables.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(schema: &str, name: &str) -> CatalogTable {
        CatalogTable {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: vec![CatalogColumn {
                ordinal_position: 1,
                name: "PatientID".to_string(),
                data_type: "integer".to_string(),
                is_nullable: false,
                default: None,
            }],
        }
    }

    #[test]
    fn serializes_as_table_list() {
        let catalog = Catalog::new([table("lab", "Befund"), table("dbo", "Patient")]);
        let value = serde_json::to_value(&catalog).expect("serialize catalog");
        let names: Vec<&str> = value
            .as_array()
            .expect("table list")
            .iter()
            .filter_map(|table| table["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Patient", "Befund"]);

        let restored: Catalog = serde_json::from_value(value).expect("deserialize catalog");
        assert!(restored.table("dbo", "Patient").is_some_and(|t| t.has_column("PatientID")));
        assert_eq!(restored.len(), 2);
    }
}
