//! Database query functions organized by domain.

pub mod achievements;
pub mod campaigns;
pub mod fraud;
pub mod ledger;
pub mod moderation;
pub mod profiles;
pub mod referrals;
pub mod roles;
pub mod tasks;
pub mod videos;

use rusqlite::types::Type;
use rusqlite::Row;

/// Read a TEXT column holding one of the wire enums from `subloop-types`.
pub(crate) fn text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read an optional INTEGER timestamp column.
pub(crate) fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(|v| v as u64))
}

/// Read a non-null INTEGER timestamp column.
pub(crate) fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)? as u64)
}
