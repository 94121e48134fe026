use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A materialized grant: role R may perform operation O on feature F.
/// The (role_code, feature_code, operation) tuple of every row is mirrored
/// as a permission rule in the policy store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Permission {
    pub id: String,
    pub role_id: String,
    pub role_code: String,
    pub feature_id: String,
    pub feature_code: String,
    pub operation: String,

    pub create_time: u64,
    pub update_time: u64,
}

/// One operation to grant, referenced by the feature id and operation name
/// registered in the operation registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub feature_id: String,
    pub operation: String,
}

/// Bulk grant request: assign a set of operations to a single role. Every
/// referenced role and operation must exist; the request is rejected as a
/// whole otherwise.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PutPermissionRequest {
    pub role_id: String,
    pub grants: Vec<PermissionGrant>,
}

impl PutPermissionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.role_id.is_empty() {
            bail!("role_id is required");
        }
        if self.grants.is_empty() {
            bail!("at least one grant is required");
        }
        for grant in self.grants.iter() {
            if grant.feature_id.is_empty() || grant.operation.is_empty() {
                bail!("feature_id and operation are required for every grant");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PatchPermissionRequest {
    pub role_id: Option<String>,
    pub feature_id: Option<String>,
    pub operation: Option<String>,
}

impl PatchPermissionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.role_id.is_none() && self.feature_id.is_none() && self.operation.is_none() {
            bail!("at least one field must be provided");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DeletePermissionsRequest {
    pub ids: Vec<String>,
}

/// One registry operation in the permissions listing, annotated with whether
/// the queried role owns a grant on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationGrant {
    pub id: String,
    pub feature_id: String,
    pub feature_code: String,
    pub operation: String,

    pub permission_id: String,
    pub own: bool,

    pub create_time: u64,
    pub update_time: u64,
}

/// Registry operations grouped by feature for the permissions dashboard.
/// Groups owned by the queried role sort first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePermissions {
    pub feature_code: String,
    pub own: bool,
    pub permissions: Vec<OperationGrant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_permission_validate() {
        let req = PutPermissionRequest {
            role_id: "role-1".to_string(),
            grants: vec![PermissionGrant {
                feature_id: "feature-1".to_string(),
                operation: "list_projects".to_string(),
            }],
        };
        assert!(req.validate().is_ok());

        let req = PutPermissionRequest {
            role_id: "role-1".to_string(),
            grants: vec![],
        };
        assert!(req.validate().is_err());

        let req = PutPermissionRequest {
            role_id: String::new(),
            grants: vec![PermissionGrant {
                feature_id: "feature-1".to_string(),
                operation: "list_projects".to_string(),
            }],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_patch_permission_validate() {
        assert!(PatchPermissionRequest::default().validate().is_err());

        let req = PatchPermissionRequest {
            operation: Some("view_projects".to_string()),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }
}
