use crate::domain::HomeArea;
use serde::Serialize;
use std::fmt;

/// Prefixes the operator UI puts in front of a region name. Whatever follows
/// uses `_` where the region name has spaces.
const REGION_PREFIXES: [&str; 2] = ["MUNICIPALITY_", "REGION_"];

/// A logical notification target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Region {
        /// Region name with underscores read back as spaces.
        name: String,
        /// The scope exactly as submitted, e.g. `REGION_HERMOSA`.
        token: String,
    },
    Area(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    All,
    Region,
    Area,
    Subscriber,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::All => "all",
            ScopeKind::Region => "region",
            ScopeKind::Area => "area",
            ScopeKind::Subscriber => "subscriber",
        }
    }
}

impl Scope {
    pub fn parse(raw: &str) -> Scope {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") || raw.eq_ignore_ascii_case("all locations") {
            return Scope::All;
        }
        for prefix in REGION_PREFIXES {
            if let Some(rest) = raw.strip_prefix(prefix) {
                let name = rest.replace('_', " ").trim().to_string();
                if name.is_empty() {
                    break;
                }
                return Scope::Region {
                    name,
                    token: raw.to_string(),
                };
            }
        }
        Scope::Area(raw.to_string())
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::All => ScopeKind::All,
            Scope::Region { .. } => ScopeKind::Region,
            Scope::Area(_) => ScopeKind::Area,
        }
    }

    /// The value written to the delivery ledger.
    pub fn value(&self) -> &str {
        match self {
            Scope::All => "all",
            Scope::Region { token, .. } => token,
            Scope::Area(name) => name,
        }
    }

    /// Human readable place name used in notification bodies.
    pub fn place(&self) -> &str {
        match self {
            Scope::All => "All Locations",
            Scope::Region { name, .. } => name,
            Scope::Area(name) => name,
        }
    }

    /// Whether a subscriber living in `area` falls inside this scope.
    ///
    /// Regions match on the recorded region, on a locality equal to the raw
    /// scope token, or on a locality starting with the region name, since
    /// older profiles store free text like "Hermosa, Bataan" as the locality.
    /// Comparisons ignore ASCII case and surrounding whitespace.
    pub fn matches(&self, area: &HomeArea) -> bool {
        if !area.is_recorded() {
            return false;
        }
        match self {
            Scope::All => true,
            Scope::Region { name, token } => {
                same_place(&area.region, name)
                    || same_place(&area.locality, token)
                    || starts_with_place(&area.locality, name)
            }
            Scope::Area(name) => same_place(&area.locality, name),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.value())
    }
}

fn same_place(recorded: &str, wanted: &str) -> bool {
    recorded.trim().eq_ignore_ascii_case(wanted.trim())
}

fn starts_with_place(recorded: &str, prefix: &str) -> bool {
    let recorded = recorded.trim().to_ascii_lowercase();
    let prefix = prefix.trim().to_ascii_lowercase();
    !prefix.is_empty() && recorded.starts_with(&prefix)
}
