//! JSON-RPC command handlers.
//!
//! Each submodule implements the commands for one area. Handlers take the
//! authenticated [`Caller`](crate::rpc::Caller) and never trust a user id
//! sent in the params for the caller's own data.

pub mod admin;
pub mod campaigns;
pub mod credits;
pub mod fraud;
pub mod gamification;
pub mod moderation;
pub mod profile;
pub mod referrals;
pub mod tasks;
pub mod videos;

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::rpc::RpcError;

/// Handler result.
pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Serialize a handler's output.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result {
    Ok(serde_json::to_value(value)?)
}

/// A required, non-blank string parameter.
pub(crate) fn required_str<'a>(
    params: &'a Value,
    key: &str,
) -> std::result::Result<&'a str, RpcError> {
    optional_str(params, key)?
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// An optional string parameter. `null` counts as absent.
pub(crate) fn optional_str<'a>(
    params: &'a Value,
    key: &str,
) -> std::result::Result<Option<&'a str>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(RpcError::invalid_params(&format!("{key} must be a string"))),
    }
}

/// An optional non-negative integer parameter.
pub(crate) fn optional_u64(
    params: &Value,
    key: &str,
) -> std::result::Result<Option<u64>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            RpcError::invalid_params(&format!("{key} must be a non-negative integer"))
        }),
    }
}

pub(crate) fn optional_u32(
    params: &Value,
    key: &str,
) -> std::result::Result<Option<u32>, RpcError> {
    optional_u64(params, key)?
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| RpcError::invalid_params(&format!("{key} is out of range")))
        })
        .transpose()
}

pub(crate) fn required_u32(params: &Value, key: &str) -> std::result::Result<u32, RpcError> {
    optional_u32(params, key)?.ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// A required signed integer parameter.
pub(crate) fn required_i64(params: &Value, key: &str) -> std::result::Result<i64, RpcError> {
    params
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

/// An optional enum parameter in its wire form.
pub(crate) fn optional_enum<T>(
    params: &Value,
    key: &str,
) -> std::result::Result<Option<T>, RpcError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_str(params, key)?
        .map(|s| s.parse::<T>().map_err(|e| RpcError::invalid_params(&e.to_string())))
        .transpose()
}

pub(crate) fn required_enum<T>(params: &Value, key: &str) -> std::result::Result<T, RpcError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_enum(params, key)?.ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}
