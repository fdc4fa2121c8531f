//! Account roles.

use serde::{Deserialize, Serialize};

/// Platform role. Users without a `user_roles` row are [`Role::User`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    ts_rs::TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

wire_enum!(Role, "role", {
    User => "user",
    Moderator => "moderator",
    Admin => "admin",
});

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}
