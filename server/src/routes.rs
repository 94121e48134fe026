use std::collections::HashMap;

pub const VERB_LIST: &str = "list";
pub const VERB_GET: &str = "get";
pub const VERB_PUT: &str = "put";
pub const VERB_PATCH: &str = "patch";
pub const VERB_DELETE: &str = "delete";

/// Authorization metadata of one protected route: the feature category tag
/// and the stable operation name the policy tuples reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteMeta {
    pub feature_code: &'static str,
    pub operation: &'static str,
}

/// The declared route table: every protected (resource, verb) pair and its
/// authorization metadata. This is the single place new admin routes are
/// registered; the operation registry is synchronized from here at startup,
/// and the middleware denies any request that matches no entry.
///
/// Renaming an operation orphans existing permission rows pointing at the
/// old name, so names here are append-only in practice.
const DECLARED_ROUTES: &[(&str, &str, RouteMeta)] = &[
    (
        "features",
        VERB_LIST,
        RouteMeta {
            feature_code: "FEATURE",
            operation: "list_features",
        },
    ),
    (
        "features",
        VERB_GET,
        RouteMeta {
            feature_code: "FEATURE",
            operation: "get_feature",
        },
    ),
    (
        "features",
        VERB_PUT,
        RouteMeta {
            feature_code: "FEATURE",
            operation: "put_feature",
        },
    ),
    (
        "features",
        VERB_PATCH,
        RouteMeta {
            feature_code: "FEATURE",
            operation: "patch_feature",
        },
    ),
    (
        "features",
        VERB_DELETE,
        RouteMeta {
            feature_code: "FEATURE",
            operation: "delete_feature",
        },
    ),
    (
        "roles",
        VERB_LIST,
        RouteMeta {
            feature_code: "ROLE",
            operation: "list_roles",
        },
    ),
    (
        "roles",
        VERB_GET,
        RouteMeta {
            feature_code: "ROLE",
            operation: "get_role",
        },
    ),
    (
        "roles",
        VERB_PUT,
        RouteMeta {
            feature_code: "ROLE",
            operation: "put_role",
        },
    ),
    (
        "roles",
        VERB_PATCH,
        RouteMeta {
            feature_code: "ROLE",
            operation: "patch_role",
        },
    ),
    (
        "roles",
        VERB_DELETE,
        RouteMeta {
            feature_code: "ROLE",
            operation: "delete_role",
        },
    ),
    (
        "permissions",
        VERB_LIST,
        RouteMeta {
            feature_code: "PERMISSION",
            operation: "list_permissions",
        },
    ),
    (
        "permissions",
        VERB_GET,
        RouteMeta {
            feature_code: "PERMISSION",
            operation: "get_permission",
        },
    ),
    (
        "permissions",
        VERB_PUT,
        RouteMeta {
            feature_code: "PERMISSION",
            operation: "put_permission",
        },
    ),
    (
        "permissions",
        VERB_PATCH,
        RouteMeta {
            feature_code: "PERMISSION",
            operation: "patch_permission",
        },
    ),
    (
        "permissions",
        VERB_DELETE,
        RouteMeta {
            feature_code: "PERMISSION",
            operation: "delete_permission",
        },
    ),
    (
        "operations",
        VERB_LIST,
        RouteMeta {
            feature_code: "PERMISSION",
            operation: "list_operations",
        },
    ),
    (
        "users",
        VERB_LIST,
        RouteMeta {
            feature_code: "USER",
            operation: "list_users",
        },
    ),
    (
        "users",
        VERB_GET,
        RouteMeta {
            feature_code: "USER",
            operation: "get_user",
        },
    ),
    (
        "users",
        VERB_PUT,
        RouteMeta {
            feature_code: "USER",
            operation: "put_user",
        },
    ),
    (
        "users",
        VERB_PATCH,
        RouteMeta {
            feature_code: "USER",
            operation: "patch_user",
        },
    ),
    (
        "users",
        VERB_DELETE,
        RouteMeta {
            feature_code: "USER",
            operation: "delete_user",
        },
    ),
    (
        "sessions",
        VERB_LIST,
        RouteMeta {
            feature_code: "SESSION",
            operation: "list_sessions",
        },
    ),
    (
        "sessions",
        VERB_GET,
        RouteMeta {
            feature_code: "SESSION",
            operation: "get_session",
        },
    ),
    (
        "sessions",
        VERB_DELETE,
        RouteMeta {
            feature_code: "SESSION",
            operation: "delete_session",
        },
    ),
];

/// Static mapping from (resource, verb) to authorization metadata, resolved
/// once at startup and looked up by key per request.
pub struct RouteTable {
    entries: HashMap<(String, String), RouteMeta>,
}

impl RouteTable {
    pub fn new() -> Self {
        let mut entries = HashMap::with_capacity(DECLARED_ROUTES.len());
        for (resource, verb, meta) in DECLARED_ROUTES {
            entries.insert((resource.to_string(), verb.to_string()), *meta);
        }
        Self { entries }
    }

    /// Metadata of the matched route, or None when the route carries none
    /// (which callers must treat as deny).
    pub fn lookup(&self, resource: &str, verb: &str) -> Option<RouteMeta> {
        self.entries
            .get(&(resource.to_string(), verb.to_string()))
            .copied()
    }

    pub fn metas(&self) -> impl Iterator<Item = &RouteMeta> {
        self.entries.values()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_lookup() {
        let table = RouteTable::new();

        let meta = table.lookup("roles", VERB_PUT).unwrap();
        assert_eq!(meta.feature_code, "ROLE");
        assert_eq!(meta.operation, "put_role");

        assert!(table.lookup("roles", "post").is_none());
        assert!(table.lookup("projects", VERB_LIST).is_none());
    }

    #[test]
    fn test_operations_globally_unique() {
        let mut seen = HashSet::new();
        for (_, _, meta) in DECLARED_ROUTES {
            assert!(
                seen.insert(meta.operation),
                "duplicate operation name: {}",
                meta.operation
            );
        }
    }

    #[test]
    fn test_feature_codes_are_uppercase() {
        for (_, _, meta) in DECLARED_ROUTES {
            assert!(portal_misc::api::is_valid_code(meta.feature_code));
        }
    }
}
