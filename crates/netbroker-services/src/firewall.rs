//! Policy firewall: per-UID network policy and background restriction.
//!
//! Access evaluation is ordered; the first matching rule wins:
//!
//!  1. system UID                         → allow
//!  2. REJECT_ALL                         → deny
//!  3. ALLOW_ALL                          → allow
//!  4. unmetered network                  → allow
//!  5. REJECT_METERED                     → deny
//!  6. ALLOW_METERED / TEMPORARY_ALLOW_METERED → allow
//!  7. foreground traffic                 → allow
//!  8. REJECT_METERED_BACKGROUND          → deny
//!  9. background unrestricted globally   → allow
//! 10. ALLOW_METERED_BACKGROUND           → allow
//! 11. otherwise                          → deny

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use netbroker_core::{BackgroundPolicy, PolicyBits, Uid, UidPolicy};

/// UID policy table plus the global background flag.
///
/// When constructed with a `persist_path`, the UID table is written to disk
/// on every mutation and reloaded by [`PolicyFirewall::load_from_disk`].
#[derive(Clone)]
pub struct PolicyFirewall {
    policies: Arc<DashMap<Uid, PolicyBits>>,
    background_restricted: Arc<AtomicBool>,
    background_uids: Arc<DashSet<Uid>>,
    system_uids: Arc<HashSet<Uid>>,
    persist_path: Arc<Option<PathBuf>>,
}

impl Default for PolicyFirewall {
    fn default() -> Self {
        Self::new(true, [0])
    }
}

impl PolicyFirewall {
    pub fn new(background_restricted: bool, system_uids: impl IntoIterator<Item = Uid>) -> Self {
        Self {
            policies: Arc::new(DashMap::new()),
            background_restricted: Arc::new(AtomicBool::new(background_restricted)),
            background_uids: Arc::new(DashSet::new()),
            system_uids: Arc::new(system_uids.into_iter().collect()),
            persist_path: Arc::new(None),
        }
    }

    /// Persist the UID table to `path`. Call [`Self::load_from_disk`] to
    /// pick up a previous table.
    pub fn with_persistence(mut self, path: PathBuf) -> Self {
        self.persist_path = Arc::new(Some(path));
        self
    }

    pub fn is_system_uid(&self, uid: Uid) -> bool {
        self.system_uids.contains(&uid)
    }

    /// Set the policy for a UID. Zero removes the entry.
    /// Returns true if the stored policy changed.
    pub fn set_uid_policy(&self, uid: Uid, policy: PolicyBits) -> bool {
        let previous = if policy == UidPolicy::NONE {
            self.policies.remove(&uid).map(|(_, p)| p)
        } else {
            self.policies.insert(uid, policy)
        };
        let changed = previous.unwrap_or(UidPolicy::NONE) != policy;
        if changed {
            self.save_to_disk();
            tracing::info!(uid, policy, "uid policy set");
        }
        changed
    }

    /// Policy for a UID; [`UidPolicy::NONE`] when absent.
    pub fn uid_policy(&self, uid: Uid) -> PolicyBits {
        self.policies
            .get(&uid)
            .map(|p| *p.value())
            .unwrap_or(UidPolicy::NONE)
    }

    /// UIDs whose policy has every bit of `policy` set, ascending.
    /// `NONE` lists every UID with an explicit entry.
    pub fn uids_with_policy(&self, policy: PolicyBits) -> Vec<Uid> {
        let mut uids: Vec<Uid> = self
            .policies
            .iter()
            .filter(|e| *e.value() & policy == policy)
            .map(|e| *e.key())
            .collect();
        uids.sort_unstable();
        uids
    }

    /// Set the global background policy. true = restricted.
    /// Returns true if it changed.
    pub fn set_background_policy(&self, restricted: bool) -> bool {
        let previous = self.background_restricted.swap(restricted, Ordering::SeqCst);
        if previous != restricted {
            tracing::info!(restricted, "global background policy changed");
        }
        previous != restricted
    }

    pub fn background_restricted(&self) -> bool {
        self.background_restricted.load(Ordering::SeqCst)
    }

    /// Record whether a UID currently runs in the background.
    /// Returns true if it changed.
    pub fn set_uid_background(&self, uid: Uid, background: bool) -> bool {
        if background {
            self.background_uids.insert(uid)
        } else {
            self.background_uids.remove(&uid).is_some()
        }
    }

    pub fn is_uid_background(&self, uid: Uid) -> bool {
        self.background_uids.contains(&uid)
    }

    /// May `uid` use a network with the given metering, from the given
    /// process state?
    pub fn is_access_allowed(&self, uid: Uid, is_metered: bool, is_background: bool) -> bool {
        if self.is_system_uid(uid) {
            return true;
        }
        let policy = self.uid_policy(uid);

        if policy & UidPolicy::REJECT_ALL != 0 {
            return false;
        }
        if policy & UidPolicy::ALLOW_ALL != 0 {
            return true;
        }

        if !is_metered {
            return true;
        }
        if policy & UidPolicy::REJECT_METERED != 0 {
            return false;
        }
        if policy & (UidPolicy::ALLOW_METERED | UidPolicy::TEMPORARY_ALLOW_METERED) != 0 {
            return true;
        }

        if !is_background {
            return true;
        }
        if policy & UidPolicy::REJECT_METERED_BACKGROUND != 0 {
            return false;
        }
        if !self.background_restricted() {
            return true;
        }
        policy & UidPolicy::ALLOW_METERED_BACKGROUND != 0
    }

    /// Background state for a UID, derived with the same precedence as the
    /// background tier of [`Self::is_access_allowed`].
    pub fn background_policy_for_uid(&self, uid: Uid) -> BackgroundPolicy {
        let policy = self.uid_policy(uid);
        if policy & UidPolicy::REJECT_METERED_BACKGROUND != 0 {
            BackgroundPolicy::Enabled
        } else if !self.background_restricted() {
            BackgroundPolicy::Disable
        } else if policy & UidPolicy::ALLOW_METERED_BACKGROUND != 0 {
            BackgroundPolicy::Allowlisted
        } else {
            BackgroundPolicy::Enabled
        }
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl PolicyFirewall {
    /// Serialize the UID table to disk as JSON. Best-effort, logs on failure.
    fn save_to_disk(&self) {
        let path = match self.persist_path.as_ref() {
            Some(p) => p,
            None => return,
        };
        let snapshot: BTreeMap<String, PolicyBits> = self
            .policies
            .iter()
            .map(|e| (e.key().to_string(), *e.value()))
            .collect();
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize uid policies");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, path = %parent.display(), "failed to create policy directory");
                return;
            }
        }
        if let Err(e) = std::fs::write(path, json) {
            tracing::warn!(error = %e, path = %path.display(), "failed to persist uid policies");
        }
    }

    /// Load the UID table from disk. Returns the number of entries loaded.
    pub fn load_from_disk(&self) -> usize {
        let path = match self.persist_path.as_ref() {
            Some(p) => p,
            None => return 0,
        };
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read uid policies");
                return 0;
            }
        };
        let map: BTreeMap<String, PolicyBits> = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to parse uid policies");
                return 0;
            }
        };
        let mut loaded = 0usize;
        for (uid, policy) in map {
            match uid.parse::<Uid>() {
                Ok(uid) if policy != UidPolicy::NONE => {
                    self.policies.insert(uid, policy);
                    loaded += 1;
                }
                Ok(_) => {}
                Err(_) => tracing::warn!(uid = %uid, "skipping malformed uid in policy file"),
            }
        }
        if loaded > 0 {
            tracing::info!(count = loaded, path = %path.display(), "loaded persisted uid policies");
        }
        loaded
    }
}
