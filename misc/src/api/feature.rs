use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::{is_valid_code, MAX_CODE_LENGTH, MAX_NAME_LENGTH};

/// A protected resource category. The code is the immutable identity key
/// referenced by policy tuples; renaming a feature changes only its display
/// name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    pub id: String,
    pub code: String,
    pub name: String,

    pub create_time: u64,
    pub update_time: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PutFeatureRequest {
    pub code: String,
    pub name: String,
}

impl PutFeatureRequest {
    pub fn validate(&self) -> Result<()> {
        if self.code.is_empty() || self.name.is_empty() {
            bail!("code and name are required");
        }
        if self.code.len() > MAX_CODE_LENGTH {
            bail!("code is too long");
        }
        if !is_valid_code(&self.code) {
            bail!("code must be uppercase letters, digits and underscores");
        }
        if self.name.len() > MAX_NAME_LENGTH {
            bail!("name is too long");
        }
        Ok(())
    }
}

/// Feature codes are immutable, so only the display name can be patched.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PatchFeatureRequest {
    pub name: Option<String>,
}

impl PatchFeatureRequest {
    pub fn validate(&self) -> Result<()> {
        match self.name {
            Some(ref name) if name.is_empty() => bail!("name cannot be empty"),
            Some(ref name) if name.len() > MAX_NAME_LENGTH => bail!("name is too long"),
            _ => Ok(()),
        }
    }
}

/// An operation discovered from the declared route table. The feature_id is
/// empty while no Feature row with a matching code exists; such orphaned
/// operations cannot be granted until the feature is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureOperation {
    pub id: String,
    pub feature_id: String,
    pub feature_code: String,
    pub operation: String,

    pub create_time: u64,
    pub update_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_feature_validate() {
        let req = PutFeatureRequest {
            code: "PROJECT".to_string(),
            name: "Project management".to_string(),
        };
        assert!(req.validate().is_ok());

        let req = PutFeatureRequest {
            code: "project".to_string(),
            name: "Project management".to_string(),
        };
        assert!(req.validate().is_err());

        let req = PutFeatureRequest {
            code: String::new(),
            name: "Project management".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
