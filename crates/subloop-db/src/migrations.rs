//! Forward-only schema migrations keyed on `PRAGMA user_version`.
//!
//! Version 1 is the full schema in [`schema::SCHEMA_V1`]. Later versions are
//! appended to [`STEPS`]. Each step runs in its own transaction together with
//! the version bump, so a failing step leaves the database at the previous
//! version.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Incremental steps after version 1. Entry `i` upgrades to version `i + 2`.
const STEPS: &[&str] = &[];

fn user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn sql_for(version: u32) -> Result<&'static str> {
    if version == 1 {
        return Ok(schema::SCHEMA_V1);
    }
    (version as usize)
        .checked_sub(2)
        .and_then(|i| STEPS.get(i))
        .copied()
        .ok_or_else(|| DbError::Migration(format!("no migration to schema v{version}")))
}

/// Bring the database up to [`SCHEMA_VERSION`].
pub fn run(conn: &Connection) -> Result<()> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        )));
    }

    for version in (current + 1)..=SCHEMA_VERSION {
        let sql = sql_for(version)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| DbError::Migration(format!("schema v{version}: {e}")))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!(from = current, to = version, "database schema migrated");
    }

    Ok(())
}
