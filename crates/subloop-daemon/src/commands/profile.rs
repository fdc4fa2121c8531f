//! Profile command handlers and first-login bootstrap.

use std::sync::Arc;

use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use subloop_db::queries::profiles::{self, ProfileRow, ProfileUpdate};
use subloop_db::queries::roles;
use subloop_types::events::{Event, EventType};
use subloop_types::{Role, TransactionType};
use tracing::info;

use super::{optional_str, to_json, Result};
use crate::rpc::{Caller, RpcError};
use crate::{unix_now, DaemonState};

const MAX_USERNAME_CHARS: usize = 30;
const MIN_USERNAME_CHARS: usize = 3;
const MAX_FULL_NAME_CHARS: usize = 100;
const MAX_BIO_CHARS: usize = 500;
const MAX_URL_CHARS: usize = 500;
const USERNAME_ATTEMPTS: u32 = 10;

/// Create the caller's profile on their first authenticated request.
///
/// The new profile gets the configured signup bonus and a referral code, all
/// in one transaction. Returns whether a profile was created.
pub(crate) fn ensure_profile(
    conn: &mut Connection,
    user_id: &str,
    signup_bonus: i64,
    now: u64,
) -> std::result::Result<bool, RpcError> {
    if profiles::exists(conn, user_id)? {
        return Ok(false);
    }

    let tx = conn.transaction()?;
    let username = generate_username(&tx, user_id)?;
    profiles::insert(&tx, user_id, &username, None, now)?;
    if signup_bonus > 0 {
        subloop_ledger::add_credits(
            &tx,
            user_id,
            signup_bonus,
            TransactionType::SignupBonus,
            Some("Welcome bonus"),
            None,
            now,
        )?;
    }
    subloop_referral::assign_code(&tx, user_id, &mut rand::thread_rng(), now)?;
    tx.commit()?;

    info!(user_id, username = %username, signup_bonus, "profile created");
    Ok(true)
}

/// `user_<first 8 alphanumerics of the id>`, with a numeric suffix on collision.
fn generate_username(conn: &Connection, user_id: &str) -> std::result::Result<String, RpcError> {
    let stem: String = user_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8)
        .collect::<String>()
        .to_lowercase();
    let base = format!("user_{stem}");
    if !profiles::username_taken(conn, &base)? {
        return Ok(base);
    }

    let mut rng = rand::thread_rng();
    for _ in 0..USERNAME_ATTEMPTS {
        let candidate = format!("{base}_{}", rng.gen_range(1000..10_000));
        if !profiles::username_taken(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(RpcError::internal_error("could not generate a unique username"))
}

#[derive(Debug, Serialize)]
struct ProfileView {
    #[serde(flatten)]
    profile: ProfileRow,
    role: Role,
}

/// The caller's profile.
pub async fn get_profile(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    let profile = profiles::get(&db, &caller.user_id)?;
    let role = roles::get(&db, &caller.user_id)?;
    to_json(&ProfileView { profile, role })
}

/// Trimmed optional text field; blank counts as absent.
fn text_field(
    params: &Value,
    key: &str,
    max: usize,
) -> std::result::Result<Option<String>, RpcError> {
    let Some(value) = optional_str(params, key)?.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(RpcError::invalid_params(&format!(
            "{key} must be at most {max} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

fn validate_username(username: &str) -> std::result::Result<(), RpcError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&len)
        || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(RpcError::invalid_params(&format!(
            "username must be {MIN_USERNAME_CHARS}-{MAX_USERNAME_CHARS} characters of [A-Za-z0-9_]"
        )));
    }
    Ok(())
}

/// Update the caller's editable profile fields.
pub async fn update_profile(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let update = ProfileUpdate {
        username: text_field(params, "username", MAX_USERNAME_CHARS)?,
        full_name: text_field(params, "full_name", MAX_FULL_NAME_CHARS)?,
        avatar_url: text_field(params, "avatar_url", MAX_URL_CHARS)?,
        bio: text_field(params, "bio", MAX_BIO_CHARS)?,
        youtube_channel: text_field(params, "youtube_channel", MAX_URL_CHARS)?,
    };

    let db = state.db.lock().await;
    if let Some(username) = &update.username {
        validate_username(username)?;
        let current = profiles::get(&db, &caller.user_id)?;
        if current.username != *username && profiles::username_taken(&db, username)? {
            return Err(RpcError::invalid_params("username already taken"));
        }
    }

    profiles::update_details(&db, &caller.user_id, &update, unix_now())?;
    let profile = profiles::get(&db, &caller.user_id)?;
    info!(user_id = %caller.user_id, "profile updated");
    to_json(&profile)
}

/// The caller's role.
pub async fn get_user_role(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    let role = roles::get(&db, &caller.user_id)?;
    Ok(json!({
        "role": role,
        "is_admin": role.is_admin(),
    }))
}

/// Emit a balance change for `user_id`.
pub(crate) fn emit_credits_changed(
    state: &DaemonState,
    user_id: &str,
    balance: i64,
    reason: TransactionType,
) {
    state.event_bus.emit(Event::for_user(
        EventType::CreditsChanged,
        user_id,
        unix_now(),
        json!({ "balance": balance, "reason": reason }),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{caller, state};

    #[test]
    fn test_ensure_profile_bootstraps_once() {
        let mut conn = subloop_db::open_memory().expect("open");
        assert!(ensure_profile(&mut conn, "8f1c2d3e-aaaa", 100, 10).expect("create"));
        assert!(!ensure_profile(&mut conn, "8f1c2d3e-aaaa", 100, 20).expect("existing"));

        let profile = profiles::get(&conn, "8f1c2d3e-aaaa").expect("profile");
        assert_eq!(profile.username, "user_8f1c2d3e");
        assert_eq!(profile.credits, 100);
        assert_eq!(profile.referral_code.as_deref().map(str::len), Some(8));
        assert!(subloop_ledger::audit_all(&conn).expect("audit").is_empty());
    }

    #[test]
    fn test_ensure_profile_username_collision() {
        let mut conn = subloop_db::open_memory().expect("open");
        ensure_profile(&mut conn, "abcdefgh-1", 0, 10).expect("first");
        ensure_profile(&mut conn, "abcdefgh-2", 0, 10).expect("second");
        let second = profiles::get(&conn, "abcdefgh-2").expect("profile");
        assert!(second.username.starts_with("user_abcdefgh_"));
        assert_eq!(second.credits, 0);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let state = state();
        let alice = caller("u1", Role::User);

        let updated = update_profile(
            &state,
            &alice,
            &json!({"username": "alice_yt", "bio": "  hello  ", "full_name": ""}),
        )
        .await
        .expect("update");
        assert_eq!(updated["username"], "alice_yt");
        assert_eq!(updated["bio"], "hello");

        let bob = caller("u2", Role::User);
        let err = update_profile(&state, &bob, &json!({"username": "alice_yt"}))
            .await
            .expect_err("taken");
        assert_eq!(err.code, -32602);

        let err = update_profile(&state, &alice, &json!({"username": "a b"}))
            .await
            .expect_err("invalid");
        assert_eq!(err.code, -32602);

        let view = get_profile(&state, &alice).await.expect("profile");
        assert_eq!(view["username"], "alice_yt");
        assert_eq!(view["role"], "user");
    }
}
