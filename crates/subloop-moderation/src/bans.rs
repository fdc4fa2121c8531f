//! Bans and ban appeals.
//!
//! A ban is active while it is permanent, or temporary with an expiry in
//! the future, and its appeal has not been approved. Approving an appeal
//! deletes the ban outright.

use rusqlite::Connection;
use subloop_db::queries::moderation::{self, BanRow};
use subloop_types::{AppealStatus, BanType};

use crate::{clean_text, ModerationError, Result};

const MAX_REASON_CHARS: usize = 1_000;
const MAX_APPEAL_CHARS: usize = 2_000;
pub const MAX_BAN_LIMIT: u32 = 200;

#[derive(Debug, Clone)]
pub struct BanRequest<'a> {
    pub user_id: &'a str,
    pub banned_by: &'a str,
    pub reason: &'a str,
    pub ban_type: BanType,
    pub expires_at: Option<u64>,
}

/// Ban a user.
pub fn ban_user(conn: &Connection, req: &BanRequest<'_>, now: u64) -> Result<BanRow> {
    if req.user_id == req.banned_by {
        return Err(ModerationError::SelfBan);
    }
    let reason = clean_text("reason", Some(req.reason), MAX_REASON_CHARS, true)?
        .unwrap_or_default();
    if let Some(expires_at) = req.expires_at {
        if expires_at <= now {
            return Err(ModerationError::InvalidExpiry);
        }
    }
    let expires_at = match req.ban_type {
        BanType::Temporary => Some(req.expires_at.ok_or(ModerationError::InvalidExpiry)?),
        BanType::Permanent => None,
    };

    let id = uuid::Uuid::new_v4().to_string();
    moderation::insert_ban(
        conn,
        &id,
        req.user_id,
        req.banned_by,
        &reason,
        req.ban_type,
        expires_at,
        now,
    )?;
    tracing::warn!(
        user_id = req.user_id,
        banned_by = req.banned_by,
        ban_type = %req.ban_type,
        "user banned"
    );
    Ok(moderation::get_ban(conn, &id)?)
}

/// Lift a ban.
pub fn unban(conn: &Connection, ban_id: &str) -> Result<()> {
    moderation::delete_ban(conn, ban_id)?;
    tracing::info!(ban_id, "ban lifted");
    Ok(())
}

/// The user's first active ban, if any.
pub fn active_ban(conn: &Connection, user_id: &str, now: u64) -> Result<Option<BanRow>> {
    Ok(moderation::bans_for_user(conn, user_id)?
        .into_iter()
        .find(|ban| ban.is_active(now)))
}

pub fn is_banned(conn: &Connection, user_id: &str, now: u64) -> Result<bool> {
    Ok(active_ban(conn, user_id, now)?.is_some())
}

/// Appeal a ban. Only the banned user may appeal, and only while no appeal
/// is pending.
pub fn submit_appeal(
    conn: &Connection,
    ban_id: &str,
    user_id: &str,
    text: &str,
    now: u64,
) -> Result<BanRow> {
    let ban = moderation::get_ban(conn, ban_id)?;
    if ban.user_id != user_id {
        return Err(ModerationError::NotBanHolder);
    }
    if let Some(status @ (AppealStatus::Pending | AppealStatus::Approved)) = ban.appeal_status {
        return Err(ModerationError::AppealExists(status));
    }
    let text = clean_text("appeal", Some(text), MAX_APPEAL_CHARS, true)?.unwrap_or_default();
    moderation::set_appeal(conn, ban_id, &text, now)?;
    tracing::info!(ban_id, user_id, "ban appeal submitted");
    Ok(moderation::get_ban(conn, ban_id)?)
}

/// Decide a pending appeal. Returns the ban as it stood after the decision;
/// an approved ban no longer exists afterwards.
pub fn process_appeal(
    conn: &Connection,
    ban_id: &str,
    decision: AppealStatus,
    reviewer: &str,
    now: u64,
) -> Result<BanRow> {
    if decision == AppealStatus::Pending {
        return Err(ModerationError::InvalidDecision(decision.to_string()));
    }
    let ban = moderation::get_ban(conn, ban_id)?;
    if ban.appeal_status != Some(AppealStatus::Pending) {
        return Err(ModerationError::NoPendingAppeal);
    }

    moderation::review_appeal(conn, ban_id, decision, reviewer, now)?;
    let ban = moderation::get_ban(conn, ban_id)?;
    if decision == AppealStatus::Approved {
        moderation::delete_ban(conn, ban_id)?;
    }
    tracing::info!(ban_id, reviewer, %decision, "ban appeal processed");
    Ok(ban)
}

/// Bans placed on a user, newest first.
pub fn user_bans(conn: &Connection, user_id: &str) -> Result<Vec<BanRow>> {
    Ok(moderation::bans_for_user(conn, user_id)?)
}

/// All bans, newest first.
pub fn all_bans(conn: &Connection, limit: u32) -> Result<Vec<BanRow>> {
    Ok(moderation::all_bans(conn, limit.clamp(1, MAX_BAN_LIMIT))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use subloop_db::DbError;

    fn temp(user: &str, expires_at: Option<u64>) -> BanRequest<'_> {
        BanRequest {
            user_id: user,
            banned_by: "admin",
            reason: "bot activity",
            ban_type: BanType::Temporary,
            expires_at,
        }
    }

    #[test]
    fn test_temporary_ban_expires() {
        let conn = setup();
        let ban = ban_user(&conn, &temp("u1", Some(100)), 10).expect("ban");
        assert_eq!(ban.expires_at, Some(100));
        assert!(is_banned(&conn, "u1", 50).expect("check"));
        assert!(!is_banned(&conn, "u1", 100).expect("check"));
        assert!(!is_banned(&conn, "u2", 50).expect("check"));
    }

    #[test]
    fn test_ban_validation() {
        let conn = setup();
        assert!(matches!(
            ban_user(&conn, &temp("u1", None), 10).expect_err("no expiry"),
            ModerationError::InvalidExpiry
        ));
        assert!(matches!(
            ban_user(&conn, &temp("u1", Some(10)), 10).expect_err("past expiry"),
            ModerationError::InvalidExpiry
        ));
        assert!(matches!(
            ban_user(&conn, &temp("admin", Some(100)), 10).expect_err("self"),
            ModerationError::SelfBan
        ));
    }

    #[test]
    fn test_permanent_ban_and_unban() {
        let conn = setup();
        let ban = ban_user(
            &conn,
            &BanRequest {
                ban_type: BanType::Permanent,
                ..temp("u1", None)
            },
            10,
        )
        .expect("ban");
        assert_eq!(ban.expires_at, None);
        assert!(is_banned(&conn, "u1", u64::MAX).expect("check"));

        unban(&conn, &ban.id).expect("unban");
        assert!(!is_banned(&conn, "u1", 20).expect("check"));
        assert!(matches!(
            unban(&conn, &ban.id).expect_err("gone"),
            ModerationError::Db(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_appeal_flow_approved() {
        let conn = setup();
        let ban = ban_user(&conn, &temp("u1", Some(1_000)), 10).expect("ban");

        assert!(matches!(
            submit_appeal(&conn, &ban.id, "u2", "not me", 20).expect_err("other user"),
            ModerationError::NotBanHolder
        ));
        let appealed = submit_appeal(&conn, &ban.id, "u1", "  it was a mistake ", 20)
            .expect("appeal");
        assert_eq!(appealed.appeal_status, Some(AppealStatus::Pending));
        assert_eq!(appealed.appeal_text.as_deref(), Some("it was a mistake"));
        assert!(matches!(
            submit_appeal(&conn, &ban.id, "u1", "again", 21).expect_err("duplicate"),
            ModerationError::AppealExists(AppealStatus::Pending)
        ));

        let decided = process_appeal(&conn, &ban.id, AppealStatus::Approved, "admin", 30)
            .expect("approve");
        assert_eq!(decided.appeal_status, Some(AppealStatus::Approved));
        assert!(user_bans(&conn, "u1").expect("bans").is_empty());
        assert!(!is_banned(&conn, "u1", 40).expect("check"));
    }

    #[test]
    fn test_appeal_denied_keeps_ban() {
        let conn = setup();
        let ban = ban_user(&conn, &temp("u1", Some(1_000)), 10).expect("ban");
        assert!(matches!(
            process_appeal(&conn, &ban.id, AppealStatus::Denied, "admin", 15)
                .expect_err("no appeal"),
            ModerationError::NoPendingAppeal
        ));

        submit_appeal(&conn, &ban.id, "u1", "please", 20).expect("appeal");
        process_appeal(&conn, &ban.id, AppealStatus::Denied, "admin", 30).expect("deny");
        assert!(is_banned(&conn, "u1", 40).expect("check"));
        assert_eq!(all_bans(&conn, 10).expect("all").len(), 1);

        // A denied appeal may be followed by a new one.
        submit_appeal(&conn, &ban.id, "u1", "second try", 50).expect("reappeal");
    }
}
