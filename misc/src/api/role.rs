use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::{is_valid_code, MAX_CODE_LENGTH, MAX_NAME_LENGTH};

/// Code of the protected administrator role. The role carrying this code is a
/// singleton that can never be deleted or deactivated, and subjects holding
/// it bypass policy checks entirely.
pub const ADMIN_ROLE_CODE: &str = "ADMIN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub code: String,
    pub is_active: bool,

    pub create_time: u64,
    pub update_time: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PutRoleRequest {
    pub name: String,
    pub code: String,

    /// Defaults to active when omitted.
    pub is_active: Option<bool>,
}

impl PutRoleRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.code.is_empty() {
            bail!("name and code are required");
        }
        if self.name.len() > MAX_NAME_LENGTH {
            bail!("name is too long");
        }
        if self.code.len() > MAX_CODE_LENGTH {
            bail!("code is too long");
        }
        if !is_valid_code(&self.code) {
            bail!("code must be uppercase letters, digits and underscores");
        }
        Ok(())
    }
}

/// Role codes are identity keys like feature codes; only name and active
/// state can be patched.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PatchRoleRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

impl PatchRoleRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            if name.is_empty() {
                bail!("name cannot be empty");
            }
            if name.len() > MAX_NAME_LENGTH {
                bail!("name is too long");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_role_validate() {
        let req = PutRoleRequest {
            name: "QA engineers".to_string(),
            code: "QA".to_string(),
            is_active: None,
        };
        assert!(req.validate().is_ok());

        let req = PutRoleRequest {
            name: String::new(),
            code: "QA".to_string(),
            is_active: None,
        };
        assert!(req.validate().is_err());

        let req = PutRoleRequest {
            name: "QA engineers".to_string(),
            code: "qa".to_string(),
            is_active: None,
        };
        assert!(req.validate().is_err());
    }
}
