// Version-independent value types shared by the client layer and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flags::{ChangeType, WorkspaceOptions};
use crate::path::server;

/// Signature a freshly created local pending-changes table carries.
pub const INITIAL_PENDING_CHANGES_SIGNATURE: Uuid =
    Uuid::from_u128(0xB2140B25_F70A_4B4D_BFB1_184703037010);

/// Property marking a file executable. Offline-capable.
pub const EXECUTABLE_PROPERTY: &str = "Microsoft.TeamFoundation.VersionControl.Executable";

/// Property marking a symbolic link. Offline-capable.
pub const SYMBOLIC_LINK_PROPERTY: &str = "Microsoft.TeamFoundation.VersionControl.SymbolicLink";

/// Whether a property can be changed without contacting the server.
pub fn is_local_property(name: &str) -> bool {
    name.eq_ignore_ascii_case(EXECUTABLE_PROPERTY) || name.eq_ignore_ascii_case(SYMBOLIC_LINK_PROPERTY)
}

// ── Workspaces ─────────────────────────────────────────────────────

/// Which side owns pending-change and version metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceLocation {
    Server,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionProfile {
    #[default]
    Private,
    PublicLimited,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecursionType {
    #[default]
    None,
    OneLevel,
    Full,
}

/// A server folder mapped to a local directory, or cloaked when
/// `local_item` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingFolder {
    pub server_item: String,
    pub local_item: Option<String>,
    pub depth: RecursionType,
}

impl WorkingFolder {
    pub fn mapped(server_item: impl Into<String>, local_item: impl Into<String>) -> Self {
        Self {
            server_item: server_item.into(),
            local_item: Some(local_item.into()),
            depth: RecursionType::Full,
        }
    }

    pub fn cloaked(server_item: impl Into<String>) -> Self {
        Self {
            server_item: server_item.into(),
            local_item: None,
            depth: RecursionType::Full,
        }
    }

    pub fn is_cloaked(&self) -> bool {
        self.local_item.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub owner: String,
    pub computer: String,
    #[serde(default)]
    pub comment: String,
    pub location: WorkspaceLocation,
    #[serde(default)]
    pub options: WorkspaceOptions,
    #[serde(default)]
    pub permission_profile: PermissionProfile,
    /// Opaque per-workspace token issued by the server.
    pub security_token: Option<String>,
    #[serde(default)]
    pub folders: Vec<WorkingFolder>,
}

impl Workspace {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        computer: impl Into<String>,
        location: WorkspaceLocation,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            computer: computer.into(),
            comment: String::new(),
            location,
            options: WorkspaceOptions::NONE,
            permission_profile: PermissionProfile::Private,
            security_token: None,
            folders: Vec::new(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.location == WorkspaceLocation::Local
    }

    pub fn is_on_computer(&self, computer: &str) -> bool {
        self.computer.eq_ignore_ascii_case(computer)
    }

    pub fn matches(&self, name: &str, owner: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) && self.owner.eq_ignore_ascii_case(owner)
    }

    pub fn has_one_level_mapping(&self) -> bool {
        self.folders.iter().any(|f| f.depth == RecursionType::OneLevel)
    }
}

// ── Items and versions ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub item: String,
    pub recursion: RecursionType,
    #[serde(default)]
    pub deletion_id: i32,
}

impl ItemSpec {
    pub fn new(item: impl Into<String>, recursion: RecursionType) -> Self {
        Self {
            item: item.into(),
            recursion,
            deletion_id: 0,
        }
    }

    pub fn is_server_item(&self) -> bool {
        server::is_server_path(&self.item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionSpec {
    Latest,
    Changeset { id: i32 },
    Date { at: DateTime<Utc> },
    Label { label: String, scope: Option<String> },
    /// The version a named workspace currently holds.
    Workspace { name: String, owner: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockLevel {
    #[default]
    Unchanged,
    None,
    Checkin,
    CheckOut,
}

impl LockLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::None => "none",
            Self::Checkin => "checkin",
            Self::CheckOut => "checkout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unchanged" => Some(Self::Unchanged),
            "none" => Some(Self::None),
            "checkin" => Some(Self::Checkin),
            "checkout" => Some(Self::CheckOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    None,
    Add,
    Branch,
    Encoding,
    Edit,
    Delete,
    Lock,
    Rename,
    Undelete,
    Property,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Any,
    Folder,
    File,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Folder => "folder",
            Self::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any" => Some(Self::Any),
            "folder" => Some(Self::Folder),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletedState {
    #[default]
    NonDeleted,
    Deleted,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub name: String,
    pub value: Option<String>,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

// ── Requests ───────────────────────────────────────────────────────

/// One element of a pend batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub item: ItemSpec,
    pub version: Option<VersionSpec>,
    pub request_type: RequestType,
    pub item_type: ItemType,
    /// Code page; `-2` means "leave unchanged".
    pub encoding: i32,
    pub lock_level: LockLevel,
    pub target_item: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyValue>,
}

impl ChangeRequest {
    pub fn new(item: ItemSpec, request_type: RequestType) -> Self {
        Self {
            item,
            version: None,
            request_type,
            item_type: ItemType::Any,
            encoding: -2,
            lock_level: LockLevel::Unchanged,
            target_item: None,
            properties: Vec::new(),
        }
    }

    pub fn edit(item: impl Into<String>) -> Self {
        Self::new(ItemSpec::new(item, RecursionType::None), RequestType::Edit)
    }

    pub fn add(item: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::File,
            ..Self::new(ItemSpec::new(item, RecursionType::None), RequestType::Add)
        }
    }

    pub fn delete(item: impl Into<String>) -> Self {
        Self::new(ItemSpec::new(item, RecursionType::None), RequestType::Delete)
    }

    pub fn rename(item: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            target_item: Some(target.into()),
            ..Self::new(ItemSpec::new(item, RecursionType::None), RequestType::Rename)
        }
    }

    pub fn with_lock(mut self, lock_level: LockLevel) -> Self {
        self.lock_level = lock_level;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub item: Option<ItemSpec>,
    pub version: Option<VersionSpec>,
}

impl GetRequest {
    pub fn new(item: ItemSpec, version: Option<VersionSpec>) -> Self {
        Self {
            item: Some(item),
            version,
        }
    }
}

/// An instruction for the client to bring one item on disk in line with
/// the server (or with a pended change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetOperation {
    pub item_id: i32,
    pub item_type: ItemType,
    pub source_server_item: Option<String>,
    pub target_server_item: Option<String>,
    /// Where the item currently lives on disk.
    pub source_local_item: Option<String>,
    /// Where the item must live after the operation.
    pub target_local_item: Option<String>,
    pub version_local: i32,
    pub version_server: i32,
    pub change_type: ChangeType,
    pub lock_level: LockLevel,
    pub pending_change_id: i32,
}

impl GetOperation {
    pub fn is_move(&self) -> bool {
        match (&self.source_local_item, &self.target_local_item) {
            (Some(source), Some(target)) => !crate::path::local::equals(source, target),
            (None, Some(_)) => true,
            _ => false,
        }
    }
}

/// A conflict the client detected on its own and reports to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConflict {
    pub conflict_type: ConflictType,
    pub item_id: i32,
    pub version_from: i32,
    pub pending_change_id: i32,
    pub source_local_item: Option<String>,
    pub target_local_item: Option<String>,
    pub reason: i32,
}

// ── Results ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// Per-item failure reported instead of aborting a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub code: String,
    pub severity: Severity,
    pub item: Option<String>,
    pub local_item: Option<String>,
    pub message: String,
}

impl Failure {
    pub fn new(code: impl Into<String>, item: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity: Severity::Error,
            item,
            local_item: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.item {
            Some(item) => write!(f, "{} ({}): {}", self.code, item, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    None,
    Get,
    Checkin,
    Local,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    None,
    AcceptMerge,
    AcceptYours,
    AcceptTheirs,
    DeleteConflict,
    AcceptYoursRenameTheirs,
    OverwriteLocal,
}

/// Caller-chosen details applied when a conflict is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResolutionOptions {
    pub new_path: Option<String>,
    /// Encoding to apply on accept-merge; `-2` leaves it unchanged.
    pub accept_merge_encoding: Option<i32>,
    #[serde(default)]
    pub accept_merge_properties: Vec<PropertyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: i32,
    pub conflict_type: ConflictType,
    pub your_server_item: Option<String>,
    pub their_server_item: Option<String>,
    pub source_local_item: Option<String>,
    pub resolution: Resolution,
    #[serde(default)]
    pub resolution_options: ResolutionOptions,
}

impl Conflict {
    pub fn new(id: i32, conflict_type: ConflictType) -> Self {
        Self {
            id,
            conflict_type,
            your_server_item: None,
            their_server_item: None,
            source_local_item: None,
            resolution: Resolution::None,
            resolution_options: ResolutionOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub server_item: String,
    /// Committed location before a pended rename.
    pub source_server_item: Option<String>,
    pub local_item: Option<String>,
    pub change_type: ChangeType,
    pub item_type: ItemType,
    pub version: i32,
    pub lock_level: LockLevel,
    pub encoding: i32,
    #[serde(default)]
    pub properties: Vec<PropertyValue>,
}

impl PendingChange {
    pub fn new(server_item: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            server_item: server_item.into(),
            source_server_item: None,
            local_item: None,
            change_type,
            item_type: ItemType::File,
            version: 0,
            lock_level: LockLevel::None,
            encoding: -2,
            properties: Vec::new(),
        }
    }

    /// Where the item is committed on the server (differs from
    /// `server_item` while a rename is pending).
    pub fn committed_server_item(&self) -> &str {
        self.source_server_item.as_deref().unwrap_or(&self.server_item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSet {
    pub name: String,
    pub owner: String,
    pub computer: String,
    pub pending_changes: Vec<PendingChange>,
    pub signature: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub server_item: String,
    pub change_type: ChangeType,
    pub item_type: ItemType,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub id: i32,
    pub owner: String,
    pub committer: String,
    pub date: DateTime<Utc>,
    pub comment: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

impl Changeset {
    /// Order changes by server item, case-insensitively.
    pub fn sort_changes(&mut self) {
        self.changes
            .sort_by(|a, b| server::compare(&a.server_item, &b.server_item));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckinNotificationInfo {
    #[serde(default)]
    pub work_item_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinResult {
    /// Zero when nothing was committed (e.g. gated or shelved).
    pub changeset: i32,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub undo_operations: Vec<GetOperation>,
    #[serde(default)]
    pub local_version_updates: Vec<ServerItemLocalVersionUpdate>,
}

impl CheckinResult {
    pub fn committed(changeset: i32) -> Self {
        Self {
            changeset,
            date: None,
            undo_operations: Vec::new(),
            local_version_updates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVersion {
    pub local_item: String,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedItem {
    pub target_server_item: String,
    pub source_server_item: Option<String>,
    pub local_item: Option<String>,
    pub item_id: i32,
    pub item_type: ItemType,
    pub version_local: i32,
    pub version_latest: i32,
    pub deletion_id: i32,
    pub change_type: ChangeType,
}

impl ExtendedItem {
    pub fn is_local(&self) -> bool {
        self.local_item.is_some() || self.change_type.contains(ChangeType::DELETE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelveset {
    pub name: String,
    pub owner: String,
    pub comment: String,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: Vec<PropertyValue>,
}

/// Tells the server which version of an item the workspace has on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerItemLocalVersionUpdate {
    pub source_server_item: String,
    pub item_id: i32,
    /// `None` when the item is no longer on disk.
    pub target_local_item: Option<String>,
    pub local_version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub new_signature: Uuid,
    pub pending_changes_updated: bool,
    #[serde(default)]
    pub new_pending_changes: Vec<PendingChange>,
    pub replay_local_versions_required: bool,
    #[serde(default)]
    pub failures: Vec<Failure>,
}

/// Parameters of a history query; `max_count` bounds one server page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub workspace_name: Option<String>,
    pub workspace_owner: Option<String>,
    pub item: ItemSpec,
    pub version_item: Option<VersionSpec>,
    pub user: Option<String>,
    pub version_from: Option<VersionSpec>,
    pub version_to: Option<VersionSpec>,
    pub max_count: i32,
    pub include_files: bool,
    pub generate_download_urls: bool,
    pub slot_mode: bool,
    pub sort_ascending: bool,
}

impl HistoryQuery {
    pub fn new(item: ItemSpec, max_count: i32) -> Self {
        Self {
            workspace_name: None,
            workspace_owner: None,
            item,
            version_item: None,
            user: None,
            version_from: None,
            version_to: None,
            max_count,
            include_files: false,
            generate_download_urls: false,
            slot_mode: true,
            sort_ascending: false,
        }
    }
}

/// Root properties of the repository service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryProperties {
    pub supported_features: crate::flags::SupportedFeatures,
    pub latest_changeset: i32,
}
