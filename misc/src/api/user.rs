use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::{is_valid_name, MAX_NAME_LENGTH};

/// Name of the bootstrap administrator account. It always holds the ADMIN
/// role and cannot be modified or deleted through the API.
pub const ADMIN_USER: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub is_active: bool,

    /// Codes of the roles assigned to this user.
    pub roles: Vec<String>,

    pub create_time: u64,
    pub update_time: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PutUserRequest {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Required when creating; replaces the stored password otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Role codes to assign. Replaces the full role set.
    pub roles: Vec<String>,
}

impl PutUserRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("name is required");
        }
        if self.name == ADMIN_USER {
            bail!("name cannot be '{ADMIN_USER}'");
        }
        if self.name.len() > MAX_NAME_LENGTH {
            bail!("name is too long");
        }
        if !is_valid_name(&self.name) {
            bail!("invalid name");
        }
        if let Some(ref password) = self.password {
            if password.is_empty() {
                bail!("password cannot be empty");
            }
        }
        for role in self.roles.iter() {
            if role.is_empty() {
                bail!("role code cannot be empty");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PatchUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,

    /// When present, replaces the full role set and triggers grouping sync.
    pub roles: Option<Vec<String>>,
}

impl PatchUserRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref password) = self.password {
            if password.is_empty() {
                bail!("password cannot be empty");
            }
        }
        if let Some(ref roles) = self.roles {
            for role in roles.iter() {
                if role.is_empty() {
                    bail!("role code cannot be empty");
                }
            }
        }
        Ok(())
    }
}

/// Identity of the calling subject, as established by the token layer.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WhoamiResponse {
    pub name: String,
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_user_validate() {
        let req = PutUserRequest {
            name: "user123".to_string(),
            email: None,
            password: Some("secret".to_string()),
            roles: vec!["QA".to_string()],
        };
        assert!(req.validate().is_ok());

        let req = PutUserRequest {
            name: ADMIN_USER.to_string(),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = PutUserRequest {
            name: "bad name".to_string(),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = PutUserRequest {
            name: "user123".to_string(),
            password: Some(String::new()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
