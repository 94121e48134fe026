use anyhow::Result;
use portal_misc::config::{CommonConfig, PathSet};
use serde::{Deserialize, Serialize};

/// Authorization related configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthzConfig {
    /// Global enforcement switch, intended only for local development.
    /// When disabled every authenticated request is allowed. Defaults to
    /// enforcing; never disable this in a non-dev environment.
    #[serde(default = "AuthzConfig::default_enforce")]
    pub enforce: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            enforce: Self::default_enforce(),
        }
    }
}

impl CommonConfig for AuthzConfig {
    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        Ok(())
    }
}

impl AuthzConfig {
    pub fn default_enforce() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enforcing() {
        // The switch must default to enforcing.
        assert!(AuthzConfig::default().enforce);

        let cfg: AuthzConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.enforce);
    }
}
