//! Credit ledger query functions.
//!
//! Rows are append-only. Positive amounts credit the user, negative debit.

use rusqlite::Connection;
use serde::Serialize;
use subloop_types::{TransactionType, SECONDS_PER_DAY};

use super::{text_enum, ts};
use crate::Result;

/// A ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRow {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: u64,
}

/// Earned and spent totals for one UTC day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyTotals {
    pub day: u64,
    pub earned: i64,
    pub spent: i64,
}

/// Append a ledger row.
#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    id: &str,
    user_id: &str,
    amount: i64,
    tx_type: TransactionType,
    description: Option<&str>,
    reference_id: Option<&str>,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO credit_transactions
            (id, user_id, amount, transaction_type, description, reference_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id,
            user_id,
            amount,
            tx_type.as_str(),
            description,
            reference_id,
            now as i64,
        ],
    )?;
    Ok(())
}

/// Signed sum of all ledger rows for a user.
pub fn sum_for_user(conn: &Connection, user_id: &str) -> Result<i64> {
    let sum: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM credit_transactions WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(sum)
}

/// Earned and spent totals since `since`, both non-negative in the usual case.
/// Campaign refunds are not income: they reduce spending instead, so
/// `earned - spent` still equals the ledger sum.
pub fn totals_since(conn: &Connection, user_id: &str, since: u64) -> Result<(i64, i64)> {
    let totals = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN amount > 0 AND transaction_type <> 'campaign_refund'
                                  THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount < 0 OR transaction_type = 'campaign_refund'
                                  THEN -amount ELSE 0 END), 0)
         FROM credit_transactions WHERE user_id = ?1 AND created_at >= ?2",
        rusqlite::params![user_id, since as i64],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(totals)
}

/// Sum of one transaction type for a user.
pub fn sum_by_type(conn: &Connection, user_id: &str, tx_type: TransactionType) -> Result<i64> {
    let sum: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM credit_transactions
         WHERE user_id = ?1 AND transaction_type = ?2",
        rusqlite::params![user_id, tx_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(sum)
}

/// Ledger rows for a user, newest first.
pub fn history(
    conn: &Connection,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<TransactionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, amount, transaction_type, description, reference_id, created_at
         FROM credit_transactions WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, limit, offset], |row| {
            Ok(TransactionRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                amount: row.get(2)?,
                transaction_type: text_enum(row, 3)?,
                description: row.get(4)?,
                reference_id: row.get(5)?,
                created_at: ts(row, 6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Per-UTC-day earned/spent totals since `since`, ascending. Days without
/// activity are omitted. Refunds count the same way as in [`totals_since`],
/// so a day with only a refund shows negative spending.
pub fn daily_totals(conn: &Connection, user_id: &str, since: u64) -> Result<Vec<DailyTotals>> {
    let mut stmt = conn.prepare(
        "SELECT created_at / ?3 AS day,
                COALESCE(SUM(CASE WHEN amount > 0 AND transaction_type <> 'campaign_refund'
                                  THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount < 0 OR transaction_type = 'campaign_refund'
                                  THEN -amount ELSE 0 END), 0)
         FROM credit_transactions
         WHERE user_id = ?1 AND created_at >= ?2
         GROUP BY day ORDER BY day",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![user_id, since as i64, SECONDS_PER_DAY as i64],
            |row| {
                Ok(DailyTotals {
                    day: row.get::<_, i64>(0)? as u64,
                    earned: row.get(1)?,
                    spent: row.get(2)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Profiles whose stored balance differs from their ledger sum, as
/// `(user_id, credits, ledger_sum)`.
pub fn mismatched_balances(conn: &Connection) -> Result<Vec<(String, i64, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.credits, COALESCE(SUM(ct.amount), 0) AS ledger_sum
         FROM profiles p LEFT JOIN credit_transactions ct ON ct.user_id = p.id
         GROUP BY p.id
         HAVING p.credits != ledger_sum
         ORDER BY p.id",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::profiles;

    fn setup() -> Connection {
        let conn = crate::open_memory().expect("open");
        profiles::insert(&conn, "u1", "alice", None, 0).expect("profile");
        conn
    }

    #[test]
    fn test_sum_and_totals() {
        let conn = setup();
        insert(&conn, "a", "u1", 100, TransactionType::SignupBonus, None, None, 10).expect("a");
        insert(&conn, "b", "u1", -30, TransactionType::CampaignBudget, None, Some("c1"), 20)
            .expect("b");
        insert(&conn, "c", "u1", 5, TransactionType::TaskReward, None, Some("t1"), 30).expect("c");

        assert_eq!(sum_for_user(&conn, "u1").expect("sum"), 75);
        assert_eq!(totals_since(&conn, "u1", 0).expect("totals"), (105, 30));
        assert_eq!(totals_since(&conn, "u1", 25).expect("totals"), (5, 0));
        assert_eq!(
            sum_by_type(&conn, "u1", TransactionType::TaskReward).expect("by type"),
            5
        );
    }

    #[test]
    fn test_refund_nets_against_spending() {
        let conn = setup();
        insert(&conn, "a", "u1", 100, TransactionType::SignupBonus, None, None, 10).expect("a");
        insert(&conn, "b", "u1", -40, TransactionType::CampaignBudget, None, Some("c1"), 20)
            .expect("b");
        insert(&conn, "c", "u1", 15, TransactionType::CampaignRefund, None, Some("c1"), 30)
            .expect("c");

        let (earned, spent) = totals_since(&conn, "u1", 0).expect("totals");
        assert_eq!((earned, spent), (100, 25));
        assert_eq!(earned - spent, sum_for_user(&conn, "u1").expect("sum"));

        let chart = daily_totals(&conn, "u1", 0).expect("chart");
        assert_eq!((chart[0].earned, chart[0].spent), (100, 25));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let conn = setup();
        let err = insert(&conn, "a", "u1", 0, TransactionType::AdminAdjustment, None, None, 10)
            .expect_err("zero");
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_history_newest_first_with_paging() {
        let conn = setup();
        for i in 0..5i64 {
            insert(
                &conn,
                &format!("tx{i}"),
                "u1",
                i + 1,
                TransactionType::TaskReward,
                None,
                None,
                100 + i as u64,
            )
            .expect("insert");
        }
        let page = history(&conn, "u1", 2, 0).expect("page");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "tx4");
        let page = history(&conn, "u1", 2, 4).expect("page");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "tx0");
    }

    #[test]
    fn test_daily_totals() {
        let conn = setup();
        let day = SECONDS_PER_DAY;
        insert(&conn, "a", "u1", 10, TransactionType::DailyReward, None, None, day + 5).expect("a");
        insert(&conn, "b", "u1", -4, TransactionType::CampaignBudget, None, None, day + 50)
            .expect("b");
        insert(&conn, "c", "u1", 7, TransactionType::TaskReward, None, None, 3 * day).expect("c");

        let chart = daily_totals(&conn, "u1", 0).expect("chart");
        assert_eq!(chart.len(), 2);
        assert_eq!((chart[0].day, chart[0].earned, chart[0].spent), (1, 10, 4));
        assert_eq!((chart[1].day, chart[1].earned, chart[1].spent), (3, 7, 0));
    }

    #[test]
    fn test_mismatch_detection() {
        let conn = setup();
        profiles::insert(&conn, "u2", "bob", None, 0).expect("profile");
        insert(&conn, "a", "u1", 10, TransactionType::SignupBonus, None, None, 1).expect("a");
        profiles::set_credits(&conn, "u1", 10, 1).expect("credits");
        assert!(mismatched_balances(&conn).expect("audit").is_empty());

        profiles::set_credits(&conn, "u2", 3, 1).expect("credits");
        let bad = mismatched_balances(&conn).expect("audit");
        assert_eq!(bad, vec![("u2".to_string(), 3, 0)]);
    }
}
