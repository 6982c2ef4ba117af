//! Create the tables of aggregated metadata in the database.
//! Referenced tables are created before the tables whose foreign keys point at them.

use crate::engine::quote_ident as quote;
use crate::error::{DbError, MetadataError};
use crate::metadata::model::{MetaData, TableDef};
use crate::session::{get_session, SessionFactory};
use futures::future::BoxFuture;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

/// `CREATE TABLE IF NOT EXISTS` for one table.
pub fn create_table_sql(table: &TableDef) -> String {
    render_create(table, |_| true)
}

/// Render a table, keeping inline only the foreign keys whose target passes `inline`.
fn render_create(table: &TableDef, inline: impl Fn(&str) -> bool) -> String {
    let mut defs: Vec<String> = Vec::new();
    for c in &table.columns {
        let mut def = format!("{} {}", quote(&c.name), c.sql_type);
        if !c.nullable && !c.primary_key {
            def.push_str(" NOT NULL");
        }
        if c.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(ref d) = c.default {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        if let Some((ref t, ref col)) = c.references {
            if inline(t) {
                def.push_str(&format!(" REFERENCES {} ({})", quote(t), quote(col)));
            }
        }
        defs.push(def);
    }
    let pk = table.primary_key();
    if !pk.is_empty() {
        let cols: Vec<String> = pk.iter().map(|s| quote(s)).collect();
        defs.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quote(&table.name),
        defs.join(",\n  ")
    )
}

/// Foreign key added after both tables exist. Dropped first so reruns stay idempotent.
fn add_foreign_key_sql(table: &str, column: &str, target: &str, target_column: &str) -> [String; 2] {
    let constraint = quote(&format!("fk_{}_{}", table, column));
    [
        format!("ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}", quote(table), constraint),
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote(table),
            constraint,
            quote(column),
            quote(target),
            quote(target_column)
        ),
    ]
}

/// Tables ordered so that every referenced table precedes the tables referencing it.
/// Tables caught in a reference cycle keep declaration order and are created last.
pub fn creation_order(metadata: &MetaData) -> Vec<&TableDef> {
    let tables = metadata.tables();
    let mut deps: HashMap<&str, HashSet<&str>> = HashMap::new();
    for t in tables {
        let refs = t
            .columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|(target, _)| target.as_str()))
            .filter(|target| *target != t.name && metadata.table(target).is_some())
            .collect();
        deps.insert(t.name.as_str(), refs);
    }

    let mut ordered: Vec<&TableDef> = Vec::with_capacity(tables.len());
    let mut done: HashSet<&str> = HashSet::new();
    loop {
        let ready: Vec<&TableDef> = tables
            .iter()
            .filter(|t| !done.contains(t.name.as_str()))
            .filter(|t| deps[t.name.as_str()].iter().all(|d| done.contains(d)))
            .collect();
        if ready.is_empty() {
            break;
        }
        for t in ready {
            done.insert(t.name.as_str());
            ordered.push(t);
        }
    }
    if ordered.len() < tables.len() {
        let cyclic: Vec<&str> = tables
            .iter()
            .filter(|t| !done.contains(t.name.as_str()))
            .map(|t| t.name.as_str())
            .collect();
        tracing::warn!(tables = ?cyclic, "foreign key cycle; creating in declaration order");
        ordered.extend(tables.iter().filter(|t| !done.contains(t.name.as_str())));
    }
    ordered
}

/// All DDL statements for `metadata`, in creation order.
/// A foreign key pointing at a table not created yet (a reference cycle) is added by
/// `ALTER TABLE` once every table exists.
pub fn schema_statements(metadata: &MetaData) -> Result<Vec<String>, MetadataError> {
    metadata.check_references()?;
    let mut statements = Vec::with_capacity(metadata.len());
    let mut deferred = Vec::new();
    let mut created: HashSet<&str> = HashSet::new();
    for table in creation_order(metadata) {
        created.insert(table.name.as_str());
        statements.push(render_create(table, |target| created.contains(target)));
        for c in &table.columns {
            if let Some((ref target, ref col)) = c.references {
                if !created.contains(target.as_str()) {
                    deferred.extend(add_foreign_key_sql(&table.name, &c.name, target, col));
                }
            }
        }
    }
    statements.extend(deferred);
    Ok(statements)
}

/// Create every table in `metadata` that does not exist yet, in a single session.
/// Run this only after every model package has been loaded.
pub async fn commit_metadata(pool: &PgPool, metadata: &MetaData) -> Result<(), DbError> {
    commit_metadata_with(pool, metadata, |tx, sql| {
        Box::pin(async move {
            tracing::debug!(sql = %sql, "ddl");
            sqlx::query(&sql).execute(&mut **tx).await?;
            Ok::<_, DbError>(())
        })
    })
    .await
}

/// [`commit_metadata`] for any session factory, given a way to run one statement in a session.
pub async fn commit_metadata_with<F, X>(factory: &F, metadata: &MetaData, execute: X) -> Result<(), DbError>
where
    F: SessionFactory + ?Sized,
    X: for<'s> Fn(&'s mut F::Session, String) -> BoxFuture<'s, Result<(), DbError>>
        + Send
        + Sync
        + 'static,
{
    let statements = schema_statements(metadata)?;
    let count = statements.len();
    get_session(factory, move |session| {
        Box::pin(async move {
            for sql in statements {
                execute(&mut *session, sql).await?;
            }
            Ok::<_, DbError>(())
        })
    })
    .await?;
    tracing::info!(tables = count, "committed metadata");
    Ok(())
}
