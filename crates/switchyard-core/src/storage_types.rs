use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage provider kinds
///
/// One variant per backend the switcher knows how to talk to. The declaration order is
/// the registration order used to break priority ties.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted object-storage API (bucket + object path, bearer key)
    Hosted,
    /// Self-hosted file-record API (collections of records with file fields)
    Record,
}

impl ProviderKind {
    /// Every known provider kind, in registration order.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Hosted, ProviderKind::Record];

    /// Human-readable name used in diagnostics and logs
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Hosted => "Hosted object storage",
            ProviderKind::Record => "Self-hosted record storage",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hosted" => Ok(ProviderKind::Hosted),
            "record" | "records" => Ok(ProviderKind::Record),
            _ => Err(anyhow::anyhow!("Invalid storage provider: {}", s)),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProviderKind::Hosted => write!(f, "hosted"),
            ProviderKind::Record => write!(f, "record"),
        }
    }
}

/// Join provider names for messages, e.g. `hosted, record`.
pub fn join_providers(providers: &[ProviderKind]) -> String {
    providers
        .iter()
        .map(ProviderKind::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!("hosted".parse::<ProviderKind>().unwrap(), ProviderKind::Hosted);
        assert_eq!(" Records ".parse::<ProviderKind>().unwrap(), ProviderKind::Record);
        assert!("nfs".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        for kind in ProviderKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_join_providers() {
        assert_eq!(
            join_providers(&[ProviderKind::Hosted, ProviderKind::Record]),
            "hosted, record"
        );
        assert_eq!(join_providers(&[]), "");
    }
}
