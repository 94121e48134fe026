use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.password.is_empty() {
            bail!("name and password are required");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Bearer credentials issued on login. The access token carries the subject
/// and its resolved role codes; the refresh token only the subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub access_expire: u64,

    pub refresh_token: String,
    pub refresh_expire: u64,
}
