//! CDN consent policy.
//!
//! Process-wide state persisted by the host's configuration store. Read
//! before every network resolution; mutated only by explicit user consent
//! during resolution; never reset automatically.

use serde::{Deserialize, Serialize};

/// The persisted user decision governing whether code may be fetched from a
/// remote source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CdnPolicy {
    /// No decision yet; the user is prompted on the first network import.
    #[default]
    AwaitingDecision,

    /// Never fetch remote modules.
    Never,

    /// Fetch any remote module without further checks.
    AlwaysInsecure,

    /// Fetch only modules with a previously recorded integrity string.
    OnlyTrustedPackages,
}

impl CdnPolicy {
    /// Parse a policy from its persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting-decision" => Some(CdnPolicy::AwaitingDecision),
            "never" => Some(CdnPolicy::Never),
            "always-insecure" => Some(CdnPolicy::AlwaysInsecure),
            "only-trusted-packages" => Some(CdnPolicy::OnlyTrustedPackages),
            _ => None,
        }
    }

    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            CdnPolicy::AwaitingDecision => "awaiting-decision",
            CdnPolicy::Never => "never",
            CdnPolicy::AlwaysInsecure => "always-insecure",
            CdnPolicy::OnlyTrustedPackages => "only-trusted-packages",
        }
    }
}

/// Outcome of the consent dialog shown while the policy is still
/// awaiting a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Never,
    AlwaysInsecure,
    OnlyTrustedPackages,
    /// Abort the resolution without persisting anything.
    Abort,
}

impl PolicyDecision {
    /// The policy to persist, if the user made a choice.
    pub fn policy(self) -> Option<CdnPolicy> {
        match self {
            PolicyDecision::Never => Some(CdnPolicy::Never),
            PolicyDecision::AlwaysInsecure => Some(CdnPolicy::AlwaysInsecure),
            PolicyDecision::OnlyTrustedPackages => Some(CdnPolicy::OnlyTrustedPackages),
            PolicyDecision::Abort => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&CdnPolicy::AwaitingDecision).unwrap();
        assert_eq!(json, "\"awaiting-decision\"");
        let back: CdnPolicy = serde_json::from_str("\"only-trusted-packages\"").unwrap();
        assert_eq!(back, CdnPolicy::OnlyTrustedPackages);
    }

    #[test]
    fn test_parse_round_trips_all_policies() {
        for policy in [
            CdnPolicy::AwaitingDecision,
            CdnPolicy::Never,
            CdnPolicy::AlwaysInsecure,
            CdnPolicy::OnlyTrustedPackages,
        ] {
            assert_eq!(CdnPolicy::parse(policy.as_str()), Some(policy));
        }
        assert_eq!(CdnPolicy::parse("sometimes"), None);
    }

    #[test]
    fn test_abort_persists_nothing() {
        assert_eq!(PolicyDecision::Abort.policy(), None);
        assert_eq!(PolicyDecision::Never.policy(), Some(CdnPolicy::Never));
    }
}
