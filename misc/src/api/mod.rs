pub mod feature;
pub mod permission;
pub mod role;
pub mod session;
pub mod token;
pub mod user;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const MIME_JSON: &str = "application/json";

pub const STATUS_OK: u32 = 200;
pub const STATUS_BAD_REQUEST: u32 = 400;
pub const STATUS_UNAUTHORIZED: u32 = 401;
pub const STATUS_FORBIDDEN: u32 = 403;
pub const STATUS_NOT_FOUND: u32 = 404;
pub const STATUS_CONFLICT: u32 = 409;
pub const STATUS_INTERNAL_SERVER_ERROR: u32 = 500;

/// Response envelope without a data payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommonResponse {
    pub code: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response envelope carrying a resource payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + DeserializeOwned")]
pub struct ResourceResponse<T: Serialize + DeserializeOwned> {
    pub code: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Paginated list payload. The page fields echo the request so clients can
/// render pagers without tracking state themselves.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + DeserializeOwned")]
pub struct ListResponse<T: Serialize + DeserializeOwned> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub version: String,
    pub timestamp: u64,
}

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

pub const MAX_CODE_LENGTH: usize = 128;
pub const MAX_NAME_LENGTH: usize = 256;

/// Common list query, parsed from the request query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub page: u64,
    pub page_size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// Filter permissions listing by role code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_code: Option<String>,

    /// Filter operations listing by feature id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            role_code: None,
            feature_id: None,
        }
    }
}

impl Query {
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            bail!("page must be greater than 0");
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            bail!("page_size must be in range [1, {MAX_PAGE_SIZE}]");
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

static NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

static CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap());

/// Validates a user or role name: alphanumeric and underscores only.
pub fn is_valid_name(name: &str) -> bool {
    NAME_REGEX.is_match(name)
}

/// Validates an identity code used in policy tuples: uppercase, starting
/// with a letter.
pub fn is_valid_code(code: &str) -> bool {
    CODE_REGEX.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validate() {
        assert!(Query::default().validate().is_ok());

        let query = Query {
            page: 0,
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = Query {
            page_size: MAX_PAGE_SIZE + 1,
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = Query {
            page: 3,
            page_size: 20,
            ..Default::default()
        };
        assert_eq!(query.offset(), 40);
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_name("user_01"));
        assert!(!is_valid_name("user-01"));
        assert!(!is_valid_name(""));

        assert!(is_valid_code("PROJECT"));
        assert!(is_valid_code("TEST_PORTAL2"));
        assert!(!is_valid_code("project"));
        assert!(!is_valid_code("2PROJECT"));
        assert!(!is_valid_code(""));
    }
}
