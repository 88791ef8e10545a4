use serde::{Deserialize, Serialize};

// Backend ids are plain integers; the newtypes keep a post id from being
// passed where a user id is expected.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

id_type!(UserId);
id_type!(PostId);
id_type!(ReelId);
id_type!(CommentId);
id_type!(
    /// A chat room between two participants.
    ConversationId
);
id_type!(
    /// Server-assigned, increasing within a conversation.
    MessageId
);

/// The toggleable social actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Like,
    Save,
    Follow,
}

impl ActionKind {
    /// Path segment of the toggle endpoint.
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Save => "save",
            Self::Follow => "follow",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.segment())
    }
}

/// Anything a toggle can target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    Post(PostId),
    Reel(ReelId),
    User(UserId),
}

impl EntityKey {
    /// Whether `action` makes sense for this entity.
    pub fn supports(&self, action: ActionKind) -> bool {
        match self {
            Self::Post(_) | Self::Reel(_) => matches!(action, ActionKind::Like | ActionKind::Save),
            Self::User(_) => action == ActionKind::Follow,
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Post(id) => write!(f, "post:{id}"),
            Self::Reel(id) => write!(f, "reel:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&MessageId(42)).unwrap();
        assert_eq!(json, "42");
        let id: ConversationId = serde_json::from_str("7").unwrap();
        assert_eq!(id, ConversationId(7));
    }

    #[test]
    fn test_entity_supports_action() {
        assert!(EntityKey::Post(PostId(1)).supports(ActionKind::Like));
        assert!(EntityKey::Reel(ReelId(1)).supports(ActionKind::Save));
        assert!(!EntityKey::Post(PostId(1)).supports(ActionKind::Follow));
        assert!(EntityKey::User(UserId(3)).supports(ActionKind::Follow));
        assert!(!EntityKey::User(UserId(3)).supports(ActionKind::Like));
    }

    #[test]
    fn test_id_from_str() {
        assert_eq!(" 12 ".parse::<PostId>().unwrap(), PostId(12));
        assert!("abc".parse::<PostId>().is_err());
    }
}
