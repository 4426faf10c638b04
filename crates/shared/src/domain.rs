use std::fmt;

use serde::{Deserialize, Serialize};

pub const SESSION_TOPIC_PREFIX: &str = "session:";

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_newtype!(SessionId);
string_newtype!(MessageRef);

impl SessionId {
    /// Channel topic this session is synchronised over.
    pub fn topic(&self) -> String {
        format!("{SESSION_TOPIC_PREFIX}{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unjoined,
    Joining,
    Joined,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unjoined => "unjoined",
            ConnectionState::Joining => "joining",
            ConnectionState::Joined => "joined",
        };
        f.write_str(name)
    }
}
