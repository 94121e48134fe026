use serde::{Deserialize, Serialize};

pub const SESSION_ACTIVE: u32 = 1;
pub const SESSION_EXPIRED: u32 = 0;

/// A login session tying a subject to its issued credentials. Created on
/// login, touched on every token refresh, flipped to expired on logout or
/// forced expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub ip_address: String,

    pub started: u64,
    pub last_access: u64,

    #[serde(skip_serializing, default)]
    pub refresh_token: String,

    pub status: u32,

    pub create_time: u64,
    pub update_time: u64,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SESSION_ACTIVE
    }
}
