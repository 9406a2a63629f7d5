//! Per-admin gesture request lifecycle.
//!
//! Every (admin, gesture) pair has an entry that moves between `ready`,
//! `customed` and `blocked`. Entries are created lazily from the template
//! library the first time an admin's entries are read.
//!
//! ```text
//! ready ──create_or_update──► customed ──submit──► blocked
//!   ▲                            │                    │
//!   └──────delete_all_customed───┘                    │
//!   └──────────────approve / reject / reset───────────┘
//! ```
//!
//! `blocked` never moves straight to `customed`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregator::LifecycleSink;
use crate::error::{Error, Result};
use crate::storage::{self, SharedStorage, Storage};
use crate::template::{display_name, normalize_label, TemplateLibrary};

/// Role of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Customizes their own gestures.
    #[default]
    Admin,
    /// Approves and rejects other admins' customizations.
    Superadmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Superadmin => write!(f, "superadmin"),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(Error::invalid_input(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated caller of a lifecycle or approval operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Caller's admin id.
    pub admin_id: String,
    /// Caller's role.
    pub role: Role,
}

impl Actor {
    /// An ordinary admin.
    #[must_use]
    pub fn admin(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
            role: Role::Admin,
        }
    }

    /// A superadmin.
    #[must_use]
    pub fn superadmin(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
            role: Role::Superadmin,
        }
    }

    /// Whether the caller is a superadmin.
    #[must_use]
    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }

    /// Fail with 403 unless the caller is a superadmin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] for ordinary admins.
    pub fn require_superadmin(&self, action: &str) -> Result<()> {
        if self.is_superadmin() {
            Ok(())
        } else {
            Err(Error::forbidden(format!("only superadmin can {action}")))
        }
    }
}

/// Status of one gesture request entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Available for customization.
    #[default]
    Ready,
    /// Samples were uploaded; not yet submitted.
    Customed,
    /// Submitted and waiting for a superadmin.
    Blocked,
}

impl RequestStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Customed => "customed",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ready" => Ok(Self::Ready),
            "customed" => Ok(Self::Customed),
            "blocked" => Ok(Self::Blocked),
            other => Err(Error::invalid_input(format!("unknown request status '{other}'"))),
        }
    }
}

/// Whether an admin may currently request customizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestFlag {
    /// Requests allowed.
    #[default]
    Enabled,
    /// A batch is awaiting a decision.
    Disabled,
}

impl RequestFlag {
    /// Storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for RequestFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            other => Err(Error::invalid_input(format!("unknown request flag '{other}'"))),
        }
    }
}

/// One admin's request entry for one gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureRequestEntry {
    /// Owning admin.
    pub admin_id: String,
    /// Gesture label.
    pub gesture_id: String,
    /// Human-readable gesture name.
    pub gesture_name: String,
    /// Current status.
    pub status: RequestStatus,
    /// When samples were last uploaded.
    pub customed_at: Option<DateTime<Utc>>,
    /// When the entry was submitted.
    pub blocked_at: Option<DateTime<Utc>>,
    /// When a superadmin last approved it.
    pub approved_at: Option<DateTime<Utc>>,
}

impl GestureRequestEntry {
    /// A fresh `ready` entry.
    #[must_use]
    pub fn ready(admin_id: &str, gesture_id: &str, gesture_name: &str) -> Self {
        Self {
            admin_id: admin_id.to_string(),
            gesture_id: gesture_id.to_string(),
            gesture_name: gesture_name.to_string(),
            status: RequestStatus::Ready,
            customed_at: None,
            blocked_at: None,
            approved_at: None,
        }
    }

    fn clear_stamps(&mut self) {
        self.customed_at = None;
        self.blocked_at = None;
        self.approved_at = None;
    }
}

/// Entries plus the derived blocking flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GestureStatusSummary {
    /// All of the admin's entries.
    pub entries: Vec<GestureRequestEntry>,
    /// Some entry is waiting for approval.
    pub has_blocked: bool,
    /// Some entry has uploaded samples.
    pub has_customed: bool,
    /// New customizations may start.
    pub can_customize: bool,
    /// The admin's request flag.
    pub flag: RequestFlag,
}

/// Lifecycle operations over shared storage.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    storage: SharedStorage,
    library: TemplateLibrary,
    pipeline_dir: PathBuf,
}

impl Lifecycle {
    /// Create a lifecycle service.
    #[must_use]
    pub fn new(storage: SharedStorage, library: TemplateLibrary, pipeline_dir: PathBuf) -> Self {
        Self {
            storage,
            library,
            pipeline_dir,
        }
    }

    /// The admin's entries, creating one `ready` entry per template if none exist.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn entries(&self, admin_id: &str) -> Result<Vec<GestureRequestEntry>> {
        let storage = storage::lock(&self.storage)?;
        self.entries_locked(&storage, admin_id)
    }

    fn entries_locked(
        &self,
        storage: &Storage,
        admin_id: &str,
    ) -> Result<Vec<GestureRequestEntry>> {
        let entries = storage.request_entries(admin_id)?;
        if !entries.is_empty() {
            return Ok(entries);
        }

        let defaults: Vec<GestureRequestEntry> = self
            .library
            .iter()
            .map(|t| GestureRequestEntry::ready(admin_id, &t.pose_label, &t.display_name()))
            .collect();
        storage.insert_request_entries(&defaults)?;
        debug!(admin_id, count = defaults.len(), "Created default request entries");
        storage.request_entries(admin_id)
    }

    /// Entries plus `has_blocked`, `has_customed` and `can_customize`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn statuses(&self, admin_id: &str) -> Result<GestureStatusSummary> {
        let storage = storage::lock(&self.storage)?;
        let entries = self.entries_locked(&storage, admin_id)?;
        let flag = storage.request_flag(admin_id)?;

        let has_blocked = entries.iter().any(|e| e.status == RequestStatus::Blocked);
        let has_customed = entries.iter().any(|e| e.status == RequestStatus::Customed);

        Ok(GestureStatusSummary {
            entries,
            has_blocked,
            has_customed,
            can_customize: !has_blocked,
            flag,
        })
    }

    /// Move a gesture from `ready` to `customed`.
    ///
    /// A gesture missing from the admin's entries is added.
    ///
    /// # Errors
    ///
    /// Returns 400 on a blank id or name, 409 if the gesture is already
    /// customed or blocked.
    pub fn create_or_update(
        &self,
        admin_id: &str,
        gesture_id: &str,
        gesture_name: &str,
    ) -> Result<GestureRequestEntry> {
        if gesture_id.trim().is_empty() || gesture_name.trim().is_empty() {
            return Err(Error::invalid_input("gesture id and gesture name are required"));
        }
        let gesture_id = normalize_label(gesture_id);

        let storage = storage::lock(&self.storage)?;
        let entries = self.entries_locked(&storage, admin_id)?;

        let mut entry = match entries.into_iter().find(|e| e.gesture_id == gesture_id) {
            Some(entry) if entry.status != RequestStatus::Ready => {
                return Err(Error::conflict(format!(
                    "gesture '{gesture_id}' is already {}",
                    entry.status
                )));
            }
            Some(entry) => entry,
            None => GestureRequestEntry::ready(admin_id, &gesture_id, gesture_name),
        };

        entry.status = RequestStatus::Customed;
        entry.gesture_name = gesture_name.trim().to_string();
        entry.customed_at = Some(Utc::now());
        storage.save_request_entries(std::slice::from_ref(&entry))?;

        info!(admin_id, gesture = %gesture_id, "Gesture marked customed");
        Ok(entry)
    }

    /// Block every entry of the admin. Returns the number of entries blocked.
    ///
    /// # Errors
    ///
    /// Returns 404 if the admin has no entries.
    pub fn submit_for_approval(&self, admin_id: &str) -> Result<usize> {
        let storage = storage::lock(&self.storage)?;
        let entries = storage.request_entries(admin_id)?;
        if entries.is_empty() {
            return Err(Error::not_found(format!("no gesture requests for admin {admin_id}")));
        }
        Self::block(&storage, entries)
    }

    /// Block every entry, creating defaults first if needed.
    pub(crate) fn block_all(&self, admin_id: &str) -> Result<usize> {
        let storage = storage::lock(&self.storage)?;
        let entries = self.entries_locked(&storage, admin_id)?;
        Self::block(&storage, entries)
    }

    fn block(storage: &Storage, mut entries: Vec<GestureRequestEntry>) -> Result<usize> {
        let now = Utc::now();
        for entry in &mut entries {
            entry.status = RequestStatus::Blocked;
            entry.blocked_at = Some(now);
        }
        storage.save_request_entries(&entries)?;
        info!(count = entries.len(), "Gesture requests blocked");
        Ok(entries.len())
    }

    /// Move every blocked entry back to `ready` and drop its `blocked_at`.
    pub(crate) fn unblock_all(&self, admin_id: &str) -> Result<usize> {
        let storage = storage::lock(&self.storage)?;
        let entries = storage.request_entries(admin_id)?;
        Self::release_blocked(&storage, entries, None)
    }

    /// Reset customed entries to `ready` and remove the admin's pipeline folder.
    ///
    /// Folder removal is best-effort.
    ///
    /// # Errors
    ///
    /// Returns 404 if the admin has no entries.
    pub fn delete_all_customed(&self, admin_id: &str) -> Result<usize> {
        let storage = storage::lock(&self.storage)?;
        let mut entries = storage.request_entries(admin_id)?;
        if entries.is_empty() {
            return Err(Error::not_found(format!("no gesture requests for admin {admin_id}")));
        }

        remove_user_dir(&self.pipeline_dir, admin_id);

        let mut changed = Vec::new();
        for entry in &mut entries {
            if entry.status == RequestStatus::Customed {
                entry.status = RequestStatus::Ready;
                entry.clear_stamps();
                changed.push(entry.clone());
            }
        }
        storage.save_request_entries(&changed)?;

        info!(admin_id, count = changed.len(), "Customed gestures reset");
        Ok(changed.len())
    }

    /// Superadmin: release the target admin's blocked entries, stamping `approved_at`.
    ///
    /// # Errors
    ///
    /// Returns 403 for non-superadmins, 400 on a blank admin id, 404 if the
    /// admin has no entries.
    pub fn approve_requests(&self, actor: &Actor, admin_id: &str) -> Result<usize> {
        actor.require_superadmin("approve requests")?;
        if admin_id.trim().is_empty() {
            return Err(Error::invalid_input("admin id is required"));
        }

        let storage = storage::lock(&self.storage)?;
        let entries = storage.request_entries(admin_id)?;
        if entries.is_empty() {
            return Err(Error::not_found(format!("no gesture requests for admin {admin_id}")));
        }
        Self::release_blocked(&storage, entries, Some(Utc::now()))
    }

    /// Superadmin: release the target admin's blocked entries without an approval stamp.
    ///
    /// # Errors
    ///
    /// Returns 403 for non-superadmins and 400 on a blank admin id.
    pub fn reject_requests(&self, actor: &Actor, admin_id: &str) -> Result<usize> {
        actor.require_superadmin("reject requests")?;
        if admin_id.trim().is_empty() {
            return Err(Error::invalid_input("admin id is required"));
        }

        let storage = storage::lock(&self.storage)?;
        let entries = storage.request_entries(admin_id)?;
        Self::release_blocked(&storage, entries, None)
    }

    fn release_blocked(
        storage: &Storage,
        entries: Vec<GestureRequestEntry>,
        approved_at: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let changed: Vec<GestureRequestEntry> = entries
            .into_iter()
            .filter(|e| e.status == RequestStatus::Blocked)
            .map(|mut e| {
                e.status = RequestStatus::Ready;
                e.blocked_at = None;
                if approved_at.is_some() {
                    e.approved_at = approved_at;
                }
                e
            })
            .collect();
        storage.save_request_entries(&changed)?;
        Ok(changed.len())
    }

    /// Reset every non-ready entry of the target admin (default: the caller).
    ///
    /// # Errors
    ///
    /// Returns 403 when an ordinary admin targets someone else.
    pub fn reset_all_to_active(&self, actor: &Actor, target: Option<&str>) -> Result<usize> {
        let target = target
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&actor.admin_id);
        if target != actor.admin_id {
            actor.require_superadmin("reset another admin's gestures")?;
        }

        let storage = storage::lock(&self.storage)?;
        let entries = self.entries_locked(&storage, target)?;
        let changed: Vec<GestureRequestEntry> = entries
            .into_iter()
            .filter(|e| e.status != RequestStatus::Ready)
            .map(|mut e| {
                e.status = RequestStatus::Ready;
                e.clear_stamps();
                e
            })
            .collect();
        storage.save_request_entries(&changed)?;

        info!(admin_id = target, count = changed.len(), "Gestures reset to ready");
        Ok(changed.len())
    }
}

#[async_trait::async_trait]
impl LifecycleSink for Lifecycle {
    async fn mark_customed(&self, admin_id: &str, gesture_name: &str) -> Result<()> {
        let label = normalize_label(gesture_name);
        let name = self
            .library
            .get(&label)
            .map_or_else(|| display_name(&label), |t| t.display_name());
        self.create_or_update(admin_id, &label, &name).map(|_| ())
    }
}

fn remove_user_dir(pipeline_dir: &Path, admin_id: &str) {
    let user_dir = pipeline_dir.join(format!("user_{admin_id}"));
    match std::fs::remove_dir_all(&user_dir) {
        Ok(()) => debug!("Removed {}", user_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", user_dir.display(), e),
    }
}
