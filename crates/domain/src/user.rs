use serde::{Deserialize, Serialize};

use crate::MemberId;

/// Who is allowed to occupy a terminal, and how they are billed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserGroup {
    /// Only the empty/default user carries this group.
    #[default]
    Unknown,
    Administrator,
    Member,
    Guest,
}

impl UserGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Guest => "guest",
        }
    }

    /// Billed groups run the per-minute tick.
    pub fn is_billed(&self) -> bool {
        matches!(self, Self::Member | Self::Guest)
    }
}

impl std::fmt::Display for UserGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The occupant of a session.
///
/// `id` is `0` for identities that are not persisted (guests, the
/// maintenance administrator).  `duration_minutes` is signed: a tick may
/// push it below zero for the instant before the timeout fires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: MemberId,
    pub username: String,
    pub group: UserGroup,
    pub duration_minutes: i64,
}

impl User {
    pub const GUEST_USERNAME: &'static str = "Guest";
    pub const ADMINISTRATOR_USERNAME: &'static str = "Administrator";

    pub fn guest(duration_minutes: i64) -> Self {
        Self {
            id: 0,
            username: Self::GUEST_USERNAME.into(),
            group: UserGroup::Guest,
            duration_minutes,
        }
    }

    pub fn administrator() -> Self {
        Self {
            id: 0,
            username: Self::ADMINISTRATOR_USERNAME.into(),
            group: UserGroup::Administrator,
            duration_minutes: 0,
        }
    }

    pub fn member(id: MemberId, username: impl Into<String>, duration_minutes: i64) -> Self {
        Self {
            id,
            username: username.into(),
            group: UserGroup::Member,
            duration_minutes,
        }
    }

    pub fn add_duration(&mut self, minutes: i64) {
        self.duration_minutes += minutes;
    }

    pub fn is_unknown(&self) -> bool {
        self.group == UserGroup::Unknown
    }

    pub fn is_administrator(&self) -> bool {
        self.group == UserGroup::Administrator
    }

    pub fn is_member(&self) -> bool {
        self.group == UserGroup::Member
    }

    pub fn is_guest(&self) -> bool {
        self.group == UserGroup::Guest
    }
}
