//! Table definitions contributed by model packages, and the shared metadata they populate.

use crate::error::MetadataError;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// PostgreSQL type as written in DDL, e.g. `TEXT`, `VARCHAR(50)`, `TIMESTAMPTZ`.
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// SQL expression used as the column default.
    pub default: Option<String>,
    /// `(table, column)` this column is a foreign key to.
    pub references: Option<(String, String)>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some((table.into(), column.into()));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Empty table; prefer [`TableDef::base`] for models.
    pub fn new(name: impl Into<String>) -> Self {
        TableDef {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Table named after the model with an integer `id` primary key.
    pub fn base(model_name: impl Into<String>) -> Self {
        TableDef::new(model_name).column(ColumnDef::new("id", "SERIAL").primary_key())
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// `created_at`, set when the row is inserted.
    pub fn with_created_timestamp(self) -> Self {
        self.column(ColumnDef::new("created_at", "TIMESTAMPTZ").default_expr("NOW()"))
    }

    /// `updated_at`, empty until the row is first updated. See [`touch_updated_at`].
    pub fn with_update_timestamp(self) -> Self {
        self.column(ColumnDef::new("updated_at", "TIMESTAMPTZ"))
    }

    pub fn with_timestamps(self) -> Self {
        self.with_created_timestamp().with_update_timestamp()
    }

    pub fn column_named(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// `UPDATE` statement stamping `updated_at` on the row with the given `id` (bound as `$1`).
pub fn touch_updated_at(table: &TableDef) -> Option<String> {
    table.column_named("updated_at")?;
    Some(format!(
        "UPDATE {} SET \"updated_at\" = NOW() WHERE \"id\" = $1",
        crate::engine::quote_ident(&table.name)
    ))
}

/// Schema registry shared by every model package, in registration order.
#[derive(Clone, Debug, Default)]
pub struct MetaData {
    tables: Vec<TableDef>,
    index: HashMap<String, usize>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableDef) -> Result<(), MetadataError> {
        if self.index.contains_key(&table.name) {
            return Err(MetadataError::DuplicateTable(table.name));
        }
        self.index.insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Every foreign key must point at a table in this metadata.
    pub fn check_references(&self) -> Result<(), MetadataError> {
        for t in &self.tables {
            for c in &t.columns {
                if let Some((target, _)) = &c.references {
                    if !self.index.contains_key(target) {
                        return Err(MetadataError::UnknownReference {
                            table: t.name.clone(),
                            column: c.name.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_table_has_id_primary_key() {
        let t = TableDef::base("Part");
        assert_eq!(t.name, "Part");
        assert_eq!(t.primary_key(), vec!["id"]);
        assert!(!t.column_named("id").unwrap().nullable);
    }

    #[test]
    fn timestamp_mixins_add_columns() {
        let t = TableDef::base("Lot").with_timestamps();
        let created = t.column_named("created_at").unwrap();
        assert_eq!(created.default.as_deref(), Some("NOW()"));
        let updated = t.column_named("updated_at").unwrap();
        assert!(updated.default.is_none());
        assert!(updated.nullable);
        assert_eq!(
            touch_updated_at(&t).unwrap(),
            "UPDATE \"Lot\" SET \"updated_at\" = NOW() WHERE \"id\" = $1"
        );
        assert!(touch_updated_at(&TableDef::base("Plain")).is_none());
    }

    #[test]
    fn duplicate_table_is_rejected() {
        let mut md = MetaData::new();
        md.add_table(TableDef::base("Part")).unwrap();
        let err = md.add_table(TableDef::base("Part")).unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateTable(n) if n == "Part"));
        assert_eq!(md.len(), 1);
    }

    #[test]
    fn dangling_reference_is_reported() {
        let mut md = MetaData::new();
        md.add_table(
            TableDef::base("Lot").column(ColumnDef::new("part_id", "INTEGER").references("Part", "id")),
        )
        .unwrap();
        assert!(matches!(
            md.check_references(),
            Err(MetadataError::UnknownReference { target, .. }) if target == "Part"
        ));
        md.add_table(TableDef::base("Part")).unwrap();
        assert!(md.check_references().is_ok());
    }
}
