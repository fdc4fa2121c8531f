//! Account administration.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_db::queries::{profiles, roles};
use subloop_types::Role;
use tracing::info;

use super::{required_enum, required_str, Result};
use crate::rpc::{Caller, RpcError};
use crate::{unix_now, DaemonState};

/// Grant a role to an existing account. Admin only.
///
/// Admins cannot change their own role, so the last admin cannot lock
/// everyone out.
pub async fn set_user_role(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let user_id = required_str(params, "user_id")?;
    let role: Role = required_enum(params, "role")?;
    if user_id == caller.user_id {
        return Err(RpcError::forbidden("cannot change your own role"));
    }

    let db = state.db.lock().await;
    if !profiles::exists(&db, user_id)? {
        return Err(RpcError::not_found(&format!("profile {user_id}")));
    }
    let previous = roles::get(&db, user_id)?;
    roles::set(&db, user_id, role, unix_now())?;

    info!(admin = %caller.user_id, user_id, from = %previous, to = %role, "role changed");
    Ok(json!({
        "user_id": user_id,
        "previous_role": previous,
        "role": role,
    }))
}
