use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use log::{info, warn};
use portal_misc::api::feature::FeatureOperation;
use portal_misc::time;
use uuid::Uuid;

use crate::db::Database;
use crate::routes::RouteTable;

use super::store::PolicyStore;
use super::PolicyRule;

/// Synchronizes the operation registry from the declared route table.
///
/// Every (feature_code, operation) pair is upserted; an existing entry keeps
/// its id and create time, only the feature linkage and update time are
/// refreshed. Pairs whose feature code has no Feature row yet are registered
/// with an empty feature_id: such orphaned operations cannot be granted
/// until the feature is created, which is reported as a product gap rather
/// than patched silently.
///
/// Runs at every process start, before the server accepts requests.
pub fn sync_operations(db: &Database, routes: &RouteTable) -> Result<usize> {
    let now = time::current_timestamp();

    let (count, orphaned) = db
        .with_transaction(|tx| {
            let mut seen = HashSet::new();
            let mut orphaned = 0;
            let mut count = 0;

            for meta in routes.metas() {
                if !seen.insert((meta.feature_code, meta.operation)) {
                    continue;
                }

                let feature_id = match tx.get_feature_by_code(meta.feature_code)? {
                    Some(feature) => feature.id,
                    None => {
                        orphaned += 1;
                        String::new()
                    }
                };

                tx.upsert_operation(&FeatureOperation {
                    id: Uuid::new_v4().to_string(),
                    feature_id,
                    feature_code: meta.feature_code.to_string(),
                    operation: meta.operation.to_string(),
                    create_time: now,
                    update_time: now,
                })?;
                count += 1;
            }

            Ok((count, orphaned))
        })
        .context("sync operation registry")?;

    if orphaned > 0 {
        warn!(
            "Operation registry has {orphaned} operations without a matching feature; \
             permissions on them cannot be assigned until the feature is created"
        );
    }
    info!("Synchronized {count} operations into the registry");

    Ok(count)
}

/// Grouping sync: replaces all grouping rules of a subject with its current
/// role set, then persists once.
///
/// The replace is a single index swap, so a crash between the replace and
/// the persist can at worst lose the whole batch, never leave the subject
/// with a partial role set. Runs on login and whenever role assignment
/// changes.
pub fn sync_subject_roles(store: &PolicyStore, subject: &str, roles: &[String]) -> Result<()> {
    store.replace_subject_roles(subject, roles);
    store.persist().context("persist grouping rules")
}

/// Full resync: derives the policy index from the permission table and the
/// relational grouping assignments, replacing whatever the store holds.
///
/// This is the reconciliation path for policy inconsistencies (every
/// divergence is logged before the swap) and also runs at startup so that
/// the store is a pure projection of the relational tables. Only active
/// users and active roles contribute grouping rules; deactivating a role
/// therefore suspends its grants without deleting any permission row.
pub fn rebuild_policies(db: &Database, store: &PolicyStore) -> Result<()> {
    let (perms, pairs) = db
        .with_transaction(|tx| {
            let perms = tx.list_permissions(None)?;
            let pairs = tx.list_subject_groupings()?;
            Ok((perms, pairs))
        })
        .context("read relational policy sources")?;

    let permissions: HashSet<PolicyRule> = perms
        .into_iter()
        .map(|p| PolicyRule::new(p.role_code, p.feature_code, p.operation))
        .collect();

    let mut groupings: HashMap<String, HashSet<String>> = HashMap::new();
    for (subject, role) in pairs {
        groupings.entry(subject).or_default().insert(role);
    }

    info!(
        "Rebuilding policy store: {} permission rules, {} grouped subjects",
        permissions.len(),
        groupings.len()
    );
    store.rebuild(permissions, groupings)
}
