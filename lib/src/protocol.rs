use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Kind};

/// An output markup target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// HTML served over http(s).
    Http,
    /// Gemtext served over gemini.
    Gemini,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Http, Protocol::Gemini];

    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Gemini => "gemini",
        }
    }

    /// The file suffix of native documents, templates, and output files.
    pub fn suffix(&self) -> &'static str {
        match self {
            Protocol::Http => "html",
            Protocol::Gemini => "gmi",
        }
    }

    pub fn scheme(&self, ssl: bool) -> &'static str {
        match (self, ssl) {
            (Protocol::Http, true) => "https",
            (Protocol::Http, false) => "http",
            (Protocol::Gemini, _) => "gemini",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" | "html" => Ok(Protocol::Http),
            "gemini" | "gmi" => Ok(Protocol::Gemini),
            _ => err!([Kind::Config] "unknown protocol",
                "protocol" => s,
                "expected one of" => "http, gemini",
            ),
        }
    }
}
