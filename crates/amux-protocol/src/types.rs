use serde::{Deserialize, Serialize};

/// Generate a newtype wrapper around `String` with standard trait impls.
///
/// Each generated type gets: `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`,
/// `Serialize`/`Deserialize` (transparent), `Display`, `Deref<Target=str>`,
/// `AsRef<str>`, `From<String>`, `From<&str>`.
macro_rules! newtype_string {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn into_inner(self) -> String {
                self.0
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

newtype_string! {
    /// Stable long identifier for a workspace (a slug, e.g. `"feat-auth"`).
    WorkspaceId
}

newtype_string! {
    /// Stable identifier for a session (e.g. `"session-7"`).
    SessionId
}

newtype_string! {
    /// Working or base branch name.
    BranchName
}

newtype_string! {
    /// Identifier of a holder occupying a workspace semaphore slot.
    ///
    /// For workspace-bound sessions this equals the session's `SessionId`.
    HolderId
}

/// Entity kind distinguished by the index allocator (C1). Extensible:
/// unrecognized kinds round-trip through `Other` rather than failing to parse.
///
/// Serializes as a bare string (not an internally-tagged enum) so it can be
/// used directly as a map key in the index state file (`counters: {workspace:
/// ..., session: ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Workspace,
    Session,
    Other(String),
}

impl EntityKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Workspace => "workspace",
            EntityKind::Session => "session",
            EntityKind::Other(s) => s,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        match s {
            "workspace" => EntityKind::Workspace,
            "session" => EntityKind::Session,
            other => EntityKind::Other(other.to_string()),
        }
    }
}

impl Serialize for EntityKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EntityKind::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_id_roundtrips_json() {
        let id = WorkspaceId::new("feat-auth");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"feat-auth\"");
        let back: WorkspaceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn entity_kind_display() {
        assert_eq!(EntityKind::Workspace.as_str(), "workspace");
        assert_eq!(EntityKind::Session.as_str(), "session");
        assert_eq!(EntityKind::Other("widget".into()).as_str(), "widget");
    }
}
