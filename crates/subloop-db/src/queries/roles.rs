//! Role query functions.

use rusqlite::{Connection, OptionalExtension};
use subloop_types::Role;

use crate::Result;

/// Role of a user. Users without a row are plain users.
pub fn get(conn: &Connection, user_id: &str) -> Result<Role> {
    let role: Option<Role> = conn
        .query_row(
            "SELECT role FROM user_roles WHERE user_id = ?1",
            [user_id],
            |row| super::text_enum(row, 0),
        )
        .optional()?;
    Ok(role.unwrap_or_default())
}

/// Grant a role, replacing any previous one.
pub fn set(conn: &Connection, user_id: &str, role: Role, now: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO user_roles (user_id, role, granted_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET role = excluded.role, granted_at = excluded.granted_at",
        rusqlite::params![user_id, role.as_str(), now as i64],
    )?;
    Ok(())
}

/// Whether the user holds the admin role.
pub fn is_admin(conn: &Connection, user_id: &str) -> Result<bool> {
    Ok(get(conn, user_id)?.is_admin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_role() {
        let conn = crate::open_memory().expect("open");
        assert_eq!(get(&conn, "u1").expect("role"), Role::User);
        assert!(!is_admin(&conn, "u1").expect("is_admin"));
    }

    #[test]
    fn test_set_and_replace() {
        let conn = crate::open_memory().expect("open");
        set(&conn, "u1", Role::Admin, 10).expect("grant");
        assert!(is_admin(&conn, "u1").expect("is_admin"));
        set(&conn, "u1", Role::Moderator, 20).expect("replace");
        assert_eq!(get(&conn, "u1").expect("role"), Role::Moderator);
    }
}
