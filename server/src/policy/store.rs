use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::db::types::{PolicyRuleRow, POLICY_KIND_GROUPING, POLICY_KIND_PERMISSION};
use crate::db::Database;

use super::{PolicyRule, StaleSide};

/// In-memory index of the two policy relations. Cloned wholesale on persist,
/// so it stays a plain value type.
#[derive(Debug, Default, Clone)]
pub(super) struct PolicyIndex {
    /// (role, feature, operation) permission rules.
    pub permissions: HashSet<PolicyRule>,
    /// subject -> role codes grouping rules, one hop only.
    pub groupings: HashMap<String, HashSet<String>>,
}

/// The single source of truth for authorization decisions: a durable set of
/// permission and grouping rules with an in-memory index.
///
/// The store is an explicit service object: constructed once at startup,
/// loaded, then shared via `Arc` with the enforcer, the synchronizer and the
/// admin handlers. Enforcement reads go through the `RwLock` only; mutation
/// batches additionally serialize through a store-wide mutex so that no two
/// writers can interleave between an index change and its persist.
pub struct PolicyStore {
    db: Arc<Database>,

    index: RwLock<PolicyIndex>,
    mutation: Mutex<()>,

    /// Set when a persist fails after the relational side already committed.
    /// While set, the enforcer fails closed.
    degraded: AtomicBool,
}

impl PolicyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            index: RwLock::new(PolicyIndex::default()),
            mutation: Mutex::new(()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Rebuilds the in-memory index from durable storage. Called once at
    /// process start, before the server accepts requests.
    pub fn load(&self) -> Result<()> {
        let _guard = self.lock_mutation();

        let rows = self
            .db
            .with_transaction(|tx| tx.load_policy_rules())
            .context("load policy rules")?;

        let mut index = PolicyIndex::default();
        for row in rows {
            match row.kind.as_str() {
                POLICY_KIND_PERMISSION => {
                    index
                        .permissions
                        .insert(PolicyRule::new(row.v0, row.v1, row.v2));
                }
                POLICY_KIND_GROUPING => {
                    index.groupings.entry(row.v0).or_default().insert(row.v1);
                }
                kind => warn!("Skipping unknown policy rule kind '{kind}' in storage"),
            }
        }

        info!(
            "Loaded policy store: {} permission rules, {} grouped subjects",
            index.permissions.len(),
            index.groupings.len()
        );
        *self.write_index() = index;
        self.degraded.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Flushes the in-memory index to durable storage, rewriting the rule
    /// table in one transaction. Must be called after each mutating batch.
    /// On failure the store is flagged degraded and enforcement fails closed
    /// until a successful resync.
    pub fn persist(&self) -> Result<()> {
        let _guard = self.lock_mutation();
        self.persist_index()
    }

    /// Idempotent insert; adding an existing rule is a no-op.
    pub fn add_permission_rule(&self, rule: PolicyRule) {
        let _guard = self.lock_mutation();
        self.write_index().permissions.insert(rule);
    }

    /// Idempotent delete; removing a missing rule is a no-op.
    pub fn remove_permission_rule(&self, rule: &PolicyRule) {
        let _guard = self.lock_mutation();
        self.write_index().permissions.remove(rule);
    }

    pub fn add_grouping_rule(&self, subject: &str, role: &str) {
        let _guard = self.lock_mutation();
        self.write_index()
            .groupings
            .entry(subject.to_string())
            .or_default()
            .insert(role.to_string());
    }

    pub fn remove_grouping_rule(&self, subject: &str, role: &str) {
        let _guard = self.lock_mutation();
        let mut index = self.write_index();
        if let Some(roles) = index.groupings.get_mut(subject) {
            roles.remove(role);
            if roles.is_empty() {
                index.groupings.remove(subject);
            }
        }
    }

    /// Drops every grouping rule of a subject. Used before a full role
    /// replace to avoid stale grants.
    pub fn delete_all_groupings_for_subject(&self, subject: &str) {
        let _guard = self.lock_mutation();
        self.write_index().groupings.remove(subject);
    }

    /// Replaces a subject's grouping rules in one index transaction: the
    /// delete-all and add-all are visible to readers as a single swap, so a
    /// concurrent enforcement check never observes a partial role set.
    pub fn replace_subject_roles(&self, subject: &str, roles: &[String]) {
        let _guard = self.lock_mutation();
        let mut index = self.write_index();
        index.groupings.remove(subject);
        if !roles.is_empty() {
            index
                .groupings
                .entry(subject.to_string())
                .or_default()
                .extend(roles.iter().cloned());
        }
    }

    /// Adds a batch of permission rules and persists once, holding the
    /// mutation lock across the whole batch.
    pub fn grant(&self, rules: Vec<PolicyRule>) -> Result<()> {
        let _guard = self.lock_mutation();
        self.write_index().permissions.extend(rules);
        self.persist_index()
    }

    /// Removes a batch of permission rules and persists once.
    pub fn revoke(&self, rules: &[PolicyRule]) -> Result<()> {
        let _guard = self.lock_mutation();
        {
            let mut index = self.write_index();
            for rule in rules {
                index.permissions.remove(rule);
            }
        }
        self.persist_index()
    }

    /// Swaps one permission rule for another. The old tuple is removed
    /// before the new one is added, so an update can never leave an
    /// orphaned rule behind.
    pub fn replace_rule(&self, old: &PolicyRule, new: PolicyRule) -> Result<()> {
        let _guard = self.lock_mutation();
        {
            let mut index = self.write_index();
            index.permissions.remove(old);
            index.permissions.insert(new);
        }
        self.persist_index()
    }

    /// Swaps in a freshly derived index, logging every divergence from the
    /// current one as a policy inconsistency, then persists. A successful
    /// rebuild clears the degraded flag: this is the reconciliation path.
    pub(super) fn rebuild(
        &self,
        permissions: HashSet<PolicyRule>,
        groupings: HashMap<String, HashSet<String>>,
    ) -> Result<()> {
        let _guard = self.lock_mutation();

        let target = PolicyIndex {
            permissions,
            groupings,
        };

        {
            let index = self.index.read().expect("policy index lock poisoned");
            for rule in target.permissions.difference(&index.permissions) {
                error!(
                    "Policy inconsistency: {}",
                    super::PolicyError::Inconsistency {
                        rule: rule.clone(),
                        side: StaleSide::PolicyStore,
                    }
                );
            }
            for rule in index.permissions.difference(&target.permissions) {
                error!(
                    "Policy inconsistency: {}",
                    super::PolicyError::Inconsistency {
                        rule: rule.clone(),
                        side: StaleSide::PermissionTable,
                    }
                );
            }
        }

        *self.write_index() = target;
        self.persist_index()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::SeqCst);
    }

    /// Resolves the subject's role set. Returns an empty set for unknown
    /// subjects.
    pub fn subject_roles(&self, subject: &str) -> HashSet<String> {
        let index = self.index.read().expect("policy index lock poisoned");
        index.groupings.get(subject).cloned().unwrap_or_default()
    }

    /// Whether a permission rule exists for the exact tuple.
    pub fn has_permission_rule(&self, rule: &PolicyRule) -> bool {
        let index = self.index.read().expect("policy index lock poisoned");
        index.permissions.contains(rule)
    }

    fn persist_index(&self) -> Result<()> {
        let snapshot = self.index.read().expect("policy index lock poisoned").clone();

        let mut rows =
            Vec::with_capacity(snapshot.permissions.len() + snapshot.groupings.len());
        for rule in snapshot.permissions {
            rows.push(PolicyRuleRow {
                kind: POLICY_KIND_PERMISSION.to_string(),
                v0: rule.role,
                v1: rule.feature,
                v2: rule.operation,
            });
        }
        for (subject, roles) in snapshot.groupings {
            for role in roles {
                rows.push(PolicyRuleRow {
                    kind: POLICY_KIND_GROUPING.to_string(),
                    v0: subject.clone(),
                    v1: role,
                    v2: String::new(),
                });
            }
        }

        match self
            .db
            .with_transaction(|tx| tx.replace_policy_rules(&rows))
        {
            Ok(()) => {
                self.degraded.store(false, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.degraded.store(true, Ordering::SeqCst);
                error!("Persisting policy store failed, enforcement degraded: {e:#}");
                Err(e).context("persist policy rules")
            }
        }
    }

    fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().expect("policy mutation lock poisoned")
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, PolicyIndex> {
        self.index.write().expect("policy index lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> PolicyStore {
        let db = Arc::new(Database::new_test());
        let store = PolicyStore::new(db);
        store.load().unwrap();
        store
    }

    #[test]
    fn test_permission_rules_idempotent() {
        let store = test_store();
        let rule = PolicyRule::new("QA", "PROJECT", "list_projects");

        store.add_permission_rule(rule.clone());
        store.add_permission_rule(rule.clone());
        assert!(store.has_permission_rule(&rule));

        // Removing twice is a no-op, not an error.
        store.remove_permission_rule(&rule);
        store.remove_permission_rule(&rule);
        assert!(!store.has_permission_rule(&rule));
    }

    #[test]
    fn test_grouping_rules() {
        let store = test_store();

        store.add_grouping_rule("user123", "QA");
        store.add_grouping_rule("user123", "DEV");
        assert_eq!(store.subject_roles("user123").len(), 2);
        assert!(store.subject_roles("unknown").is_empty());

        store.remove_grouping_rule("user123", "DEV");
        assert_eq!(store.subject_roles("user123").len(), 1);

        store.delete_all_groupings_for_subject("user123");
        assert!(store.subject_roles("user123").is_empty());
    }

    #[test]
    fn test_replace_subject_roles() {
        let store = test_store();

        store.replace_subject_roles("user123", &["QA".to_string()]);
        assert!(store.subject_roles("user123").contains("QA"));

        store.replace_subject_roles("user123", &["DEV".to_string()]);
        let roles = store.subject_roles("user123");
        assert!(roles.contains("DEV"));
        assert!(!roles.contains("QA"));

        store.replace_subject_roles("user123", &[]);
        assert!(store.subject_roles("user123").is_empty());
    }

    #[test]
    fn test_persist_and_load() {
        let db = Arc::new(Database::new_test());
        let store = PolicyStore::new(db.clone());
        store.load().unwrap();

        let rule = PolicyRule::new("QA", "PROJECT", "list_projects");
        store.add_permission_rule(rule.clone());
        store.add_grouping_rule("user123", "QA");
        store.persist().unwrap();

        // A second store over the same database sees the persisted state.
        let reloaded = PolicyStore::new(db);
        reloaded.load().unwrap();
        assert!(reloaded.has_permission_rule(&rule));
        assert!(reloaded.subject_roles("user123").contains("QA"));
    }

    #[test]
    fn test_replace_rule_is_exclusive() {
        let store = test_store();

        let old = PolicyRule::new("QA", "PROJECT", "list_projects");
        let new = PolicyRule::new("QA", "PROJECT", "view_projects");

        store.grant(vec![old.clone()]).unwrap();
        store.replace_rule(&old, new.clone()).unwrap();

        assert!(!store.has_permission_rule(&old));
        assert!(store.has_permission_rule(&new));
    }
}
