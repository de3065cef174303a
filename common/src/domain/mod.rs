use std::sync::LazyLock;

use nutype::nutype;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Implements `as_str`, `Display` and `FromStr` for enums persisted as text columns.
macro_rules! column_enum {
    ($name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

pub mod article;
pub mod assignment;
pub mod publication;
pub mod schedule;
pub mod snapshot;

// A regex for actor ids coming from the identity service.
// Example: "jane.doe@magazine" or "editor_42" are valid; "jane doe" or "a/b" are not.
pub const ACTOR_ID_REGEX: &str = r"^[A-Za-z0-9_.@-]+$";

static ACTOR_ID_REGEX_COMPILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ACTOR_ID_REGEX).expect("ACTOR_ID_REGEX must be a valid regex")
});

pub fn is_eligible_actor_id(id: &str) -> bool {
    ACTOR_ID_REGEX_COMPILED.is_match(id)
}

/// Identifier of a user as known by the identity service.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64, predicate = is_eligible_actor_id),
    derive(
        Clone,
        Debug,
        Display,
        FromStr,
        AsRef,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize
    )
)]
pub struct ActorId(String);

impl ActorId {
    /// Actor used for transitions the platform performs on its own, e.g. scheduled publication.
    pub fn system() -> Self {
        Self::try_new("system").expect("\"system\" is a valid actor id")
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value).map(Self)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Wrapper to prevent ID confusion
    ArticleId
);

uuid_id!(
    /// Wrapper to prevent ID confusion
    AssignmentId
);
