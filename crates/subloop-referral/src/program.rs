//! Referral processing and statistics.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::referrals::{self, ReferralEventRow};
use subloop_db::queries::{ledger, profiles};
use subloop_db::DbError;
use subloop_ledger::add_credits;
use subloop_types::{TransactionType, SECONDS_PER_DAY};

use crate::codes::{display_name, normalize_code};
use crate::{ReferralError, Result, REFEREE_BONUS, REFERRER_BONUS};

/// Window for "recent" referrals in [`stats`].
pub const RECENT_REFERRAL_DAYS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralParty {
    pub id: String,
    pub name: String,
    pub bonus_awarded: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralOutcome {
    pub referrer: ReferralParty,
    pub referee: ReferralParty,
    pub total_bonus_awarded: i64,
    pub referee_balance: i64,
}

/// Link `new_user_id` to the owner of `code` and pay both bonuses.
pub fn process_referral(
    conn: &mut Connection,
    code: &str,
    new_user_id: &str,
    now: u64,
) -> Result<ReferralOutcome> {
    let code = normalize_code(code);
    let tx = conn.transaction()?;

    let referrer = match profiles::get_by_referral_code(&tx, &code) {
        Ok(p) => p,
        Err(DbError::NotFound(_)) => return Err(ReferralError::InvalidCode),
        Err(e) => return Err(e.into()),
    };
    if referrer.id == new_user_id {
        return Err(ReferralError::SelfReferral);
    }
    let referee = profiles::get(&tx, new_user_id)?;
    if referee.referred_by.is_some() || referrals::for_referee(&tx, new_user_id)?.is_some() {
        return Err(ReferralError::AlreadyReferred);
    }

    profiles::set_referred_by(&tx, new_user_id, &referrer.id, now)?;
    add_credits(
        &tx,
        &referrer.id,
        REFERRER_BONUS,
        TransactionType::ReferralBonus,
        Some("Referral bonus for inviting new user"),
        Some(new_user_id),
        now,
    )?;
    let referee_balance = add_credits(
        &tx,
        new_user_id,
        REFEREE_BONUS,
        TransactionType::ReferralBonus,
        Some("Welcome bonus from referral"),
        Some(&referrer.id),
        now,
    )?;
    referrals::insert(
        &tx,
        &ReferralEventRow {
            id: uuid::Uuid::new_v4().to_string(),
            referrer_id: referrer.id.clone(),
            referee_id: new_user_id.to_string(),
            referral_code: code,
            bonus_awarded: REFERRER_BONUS + REFEREE_BONUS,
            created_at: now,
        },
    )?;
    tx.commit()?;

    tracing::info!(referrer = %referrer.id, referee = new_user_id, "referral processed");

    Ok(ReferralOutcome {
        referrer: ReferralParty {
            name: display_name(&referrer),
            id: referrer.id,
            bonus_awarded: REFERRER_BONUS,
        },
        referee: ReferralParty {
            name: display_name(&referee),
            id: referee.id,
            bonus_awarded: REFEREE_BONUS,
        },
        total_bonus_awarded: REFERRER_BONUS + REFEREE_BONUS,
        referee_balance,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferredUser {
    pub id: String,
    pub name: String,
    pub joined_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralStats {
    pub referral_code: Option<String>,
    pub total_referrals: u64,
    pub recent_referrals: u64,
    pub total_earnings: i64,
    pub referred_users: Vec<ReferredUser>,
}

pub fn stats(conn: &Connection, user_id: &str, now: u64) -> Result<ReferralStats> {
    let profile = profiles::get(conn, user_id)?;
    let referred = profiles::referred_by(conn, user_id)?;
    let since = now.saturating_sub(RECENT_REFERRAL_DAYS * SECONDS_PER_DAY);
    let recent_referrals = referrals::count_for_referrer(conn, user_id, since)?;
    let total_earnings = ledger::sum_by_type(conn, user_id, TransactionType::ReferralBonus)?;

    Ok(ReferralStats {
        referral_code: profile.referral_code,
        total_referrals: referred.len() as u64,
        recent_referrals,
        total_earnings,
        referred_users: referred
            .iter()
            .map(|p| ReferredUser {
                id: p.id.clone(),
                name: display_name(p),
                joined_at: p.created_at,
            })
            .collect(),
    })
}

/// Referral events the user took part in, newest first.
pub fn events(conn: &Connection, user_id: &str) -> Result<Vec<ReferralEventRow>> {
    Ok(referrals::for_user(conn, user_id)?)
}
