//! Balance mutation and conservation audit.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::{ledger, profiles};
use subloop_types::TransactionType;

use crate::{LedgerError, Result};

/// Move `amount` credits into (positive) or out of (negative) a user's
/// balance and record it. Returns the new balance.
///
/// Runs as several statements; callers that need atomicity pass a
/// `rusqlite::Transaction` (which derefs to `Connection`), or use
/// [`add_credits_atomic`].
pub fn add_credits(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    tx_type: TransactionType,
    description: Option<&str>,
    reference_id: Option<&str>,
    now: u64,
) -> Result<i64> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }

    let available = profiles::credits(conn, user_id)?;
    let new_balance = available.checked_add(amount).ok_or(LedgerError::Overflow)?;
    if new_balance < 0 {
        return Err(LedgerError::InsufficientCredits {
            required: amount.checked_neg().ok_or(LedgerError::Overflow)?,
            available,
        });
    }

    profiles::set_credits(conn, user_id, new_balance, now)?;
    let tx_id = uuid::Uuid::new_v4().to_string();
    ledger::insert(
        conn,
        &tx_id,
        user_id,
        amount,
        tx_type,
        description,
        reference_id,
        now,
    )?;

    tracing::debug!(
        user_id,
        amount,
        tx_type = tx_type.as_str(),
        new_balance,
        "credits moved"
    );
    Ok(new_balance)
}

/// Debit `amount` credits. Shorthand for a negative [`add_credits`].
pub fn spend_credits(
    conn: &Connection,
    user_id: &str,
    amount: u64,
    tx_type: TransactionType,
    description: Option<&str>,
    reference_id: Option<&str>,
    now: u64,
) -> Result<i64> {
    let amount = i64::try_from(amount).map_err(|_| LedgerError::Overflow)?;
    add_credits(
        conn,
        user_id,
        -amount,
        tx_type,
        description,
        reference_id,
        now,
    )
}

/// [`add_credits`] in its own transaction.
pub fn add_credits_atomic(
    conn: &mut Connection,
    user_id: &str,
    amount: i64,
    tx_type: TransactionType,
    description: Option<&str>,
    reference_id: Option<&str>,
    now: u64,
) -> Result<i64> {
    let tx = conn.transaction()?;
    let balance = add_credits(
        &tx,
        user_id,
        amount,
        tx_type,
        description,
        reference_id,
        now,
    )?;
    tx.commit()?;
    Ok(balance)
}

/// Result of comparing a stored balance with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Audit {
    pub user_id: String,
    pub profile_credits: i64,
    pub ledger_sum: i64,
    pub consistent: bool,
}

/// Compare one user's stored balance with the sum of their ledger rows.
pub fn audit_user(conn: &Connection, user_id: &str) -> Result<Audit> {
    let profile_credits = profiles::credits(conn, user_id)?;
    let ledger_sum = ledger::sum_for_user(conn, user_id)?;
    Ok(Audit {
        user_id: user_id.to_string(),
        profile_credits,
        ledger_sum,
        consistent: profile_credits == ledger_sum,
    })
}

/// Every user whose stored balance disagrees with their ledger.
pub fn audit_all(conn: &Connection) -> Result<Vec<Audit>> {
    let audits: Vec<Audit> = ledger::mismatched_balances(conn)?
        .into_iter()
        .map(|(user_id, profile_credits, ledger_sum)| Audit {
            user_id,
            profile_credits,
            ledger_sum,
            consistent: false,
        })
        .collect();
    if !audits.is_empty() {
        tracing::warn!(count = audits.len(), "ledger audit found inconsistent balances");
    }
    Ok(audits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = subloop_db::open_memory().expect("open");
        profiles::insert(&conn, "u1", "alice", None, 0).expect("profile");
        conn
    }

    #[test]
    fn test_add_and_spend() {
        let conn = setup();
        let bal = add_credits(&conn, "u1", 100, TransactionType::SignupBonus, None, None, 1)
            .expect("add");
        assert_eq!(bal, 100);
        let bal = spend_credits(
            &conn,
            "u1",
            40,
            TransactionType::CampaignBudget,
            Some("budget"),
            Some("c1"),
            2,
        )
        .expect("spend");
        assert_eq!(bal, 60);
        assert!(audit_user(&conn, "u1").expect("audit").consistent);

        let history = ledger::history(&conn, "u1", 10, 0).expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, -40);
        assert_eq!(history[0].reference_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_zero_rejected() {
        let conn = setup();
        assert!(matches!(
            add_credits(&conn, "u1", 0, TransactionType::AdminAdjustment, None, None, 1),
            Err(LedgerError::ZeroAmount)
        ));
    }

    #[test]
    fn test_minimum_amount_is_overflow() {
        let conn = setup();
        add_credits(&conn, "u1", 5, TransactionType::SignupBonus, None, None, 1).expect("add");
        let err = add_credits(
            &conn,
            "u1",
            i64::MIN,
            TransactionType::AdminAdjustment,
            None,
            None,
            2,
        )
        .expect_err("i64::MIN debit");
        assert!(matches!(err, LedgerError::Overflow));
        assert_eq!(profiles::credits(&conn, "u1").expect("credits"), 5);
        assert_eq!(ledger::history(&conn, "u1", 10, 0).expect("history").len(), 1);
    }

    #[test]
    fn test_overdraft_rejected_without_side_effects() {
        let conn = setup();
        add_credits(&conn, "u1", 10, TransactionType::SignupBonus, None, None, 1).expect("add");
        let err = spend_credits(&conn, "u1", 11, TransactionType::CampaignBudget, None, None, 2)
            .expect_err("overdraft");
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                required: 11,
                available: 10
            }
        ));
        assert_eq!(profiles::credits(&conn, "u1").expect("credits"), 10);
        assert_eq!(ledger::sum_for_user(&conn, "u1").expect("sum"), 10);
    }

    #[test]
    fn test_unknown_user() {
        let conn = setup();
        assert!(matches!(
            add_credits(&conn, "ghost", 5, TransactionType::AdminAdjustment, None, None, 1),
            Err(LedgerError::Db(subloop_db::DbError::NotFound(_)))
        ));
    }

    #[test]
    fn test_atomic_variant() {
        let mut conn = setup();
        let bal = add_credits_atomic(
            &mut conn,
            "u1",
            25,
            TransactionType::AdminAdjustment,
            Some("goodwill"),
            None,
            1,
        )
        .expect("add");
        assert_eq!(bal, 25);
        assert!(audit_all(&conn).expect("audit").is_empty());
    }

    #[test]
    fn test_audit_detects_drift() {
        let conn = setup();
        add_credits(&conn, "u1", 10, TransactionType::SignupBonus, None, None, 1).expect("add");
        profiles::set_credits(&conn, "u1", 99, 2).expect("tamper");
        let audit = audit_user(&conn, "u1").expect("audit");
        assert!(!audit.consistent);
        assert_eq!(audit.ledger_sum, 10);
        let all = audit_all(&conn).expect("audit all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].profile_credits, 99);
    }
}
