use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declares a vocabulary that normalizes known tags and passes anything else
/// through verbatim instead of rejecting it.
macro_rules! permissive_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $tag:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A value outside the known vocabulary, kept as submitted.
            Unrecognized(String),
        }

        impl $name {
            pub const KNOWN: &'static [&'static str] = &[$($tag),+];

            /// Looks `input` up in the known table.
            pub fn known(input: &str) -> Option<Self> {
                match input {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Maps known tags to their canonical variant and keeps unknown input unchanged.
            pub fn normalize(input: &str) -> Self {
                Self::known(input).unwrap_or_else(|| Self::Unrecognized(input.to_string()))
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $tag,)+
                    Self::Unrecognized(raw) => raw,
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Unrecognized(_))
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::known(&raw).unwrap_or(Self::Unrecognized(raw))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Unrecognized(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

permissive_enum! {
    /// How soon the requester needs help.
    pub enum Urgency {
        Critical => "critical",
        Urgent => "urgent",
        Standard => "standard",
        Recovery => "recovery",
    }
}

permissive_enum! {
    /// Kind of help being asked for.
    pub enum Category {
        Food => "food",
        Shelter => "shelter",
        Reconstruction => "reconstruction",
        Cleanup => "cleanup",
        Tools => "tools",
        Volunteers => "volunteers",
    }
}

permissive_enum! {
    /// Why a reporter flagged a request.
    pub enum ReportReason {
        FakeSpam => "fake_spam",
        MoneyRequest => "money_request",
        InadequateInfo => "inadequate_info",
        Duplicate => "duplicate",
        Resolved => "resolved",
        Other => "other",
    }
}

/// Lifecycle state of a help request.
///
/// `Pending` may move to `Helped` or `Resolved` and back; every state may
/// move to `Deleted`, and nothing leaves `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Helped,
    Resolved,
    Deleted,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Helped => "helped",
            Status::Resolved => "resolved",
            Status::Deleted => "deleted",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Status::Deleted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "helped" => Ok(Status::Helped),
            "resolved" => Ok(Status::Resolved),
            "deleted" => Ok(Status::Deleted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
