//! Identifier Types
//!
//! String-backed identifiers for events, players, cities, movements and
//! production queue items. Each kind gets its own type so a city id can never
//! be passed where a movement id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier of a persisted event
    EventId
);
string_id!(
    /// Identifier of the player issuing commands
    PlayerId
);
string_id!(
    /// Unique identifier for a city
    CityId
);
string_id!(
    /// Identifier shared by both legs of an expedition
    MovementId
);
string_id!(
    /// Identifier of a unit or building production queue item
    QueueItemId
);
