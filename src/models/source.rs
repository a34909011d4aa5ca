//! Source model for tracking where a document came from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Email,
    File,
    Chat,
    /// Anything that is not one of the known channels.
    Other,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Email, Source::File, Source::Chat, Source::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Email => "email",
            Source::File => "file",
            Source::Chat => "chat",
            Source::Other => "other",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Source::Email),
            "file" => Ok(Source::File),
            "chat" => Ok(Source::Chat),
            "other" => Ok(Source::Other),
            _ => Err(format!(
                "unknown source '{}', expected one of: email, file, chat, other",
                s
            )),
        }
    }
}
