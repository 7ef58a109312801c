// Versioned call dispatcher.
//
// Every operation follows the same steps: validate arguments, reject
// parameters the negotiated generation cannot carry, replay queued edits
// for the addressed workspace, run the operation's generation ladder, and
// convert the generation-specific response into one result struct. No
// transport fault leaves this module unmapped.

mod checkin;
pub(crate) mod ladder;
mod pending;
mod query;
mod resolve;
pub mod results;
mod workspace;


use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tfvc_common::flags::{PendChangesOptions, SupportedFeatures};
use tfvc_common::path::MAX_SERVER_PATH_SIZE;
use tfvc_common::types::{ChangeRequest, Workspace};
use tfvc_common::{map_fault, ServiceLevel, VcError};

use crate::cancel::{NeverCancelled, TaskMonitor};
use crate::events::EventBus;
use crate::negotiate::negotiate;
use crate::replay::{EditPender, QueuedEditReplayer, ReplayReport};
use crate::transport::{LocationService, TransportSet};
use crate::workspace::WorkspaceRegistry;

pub use results::{
    CheckinOutcome, CollectResolutions, MergeOutcome, PendOutcome, PendingChangesOutcome,
    PendingSetsOutcome, ResolveErrorOptions, ResolveHandler, ResolvedConflict, UnshelveOutcome,
};

/// Maximum server path length sent with every newest-generation call.
pub(crate) const MAX_PATH: i32 = MAX_SERVER_PATH_SIZE;

pub struct Dispatcher {
    transports: TransportSet,
    level: ServiceLevel,
    supported_features: Mutex<Option<SupportedFeatures>>,
    workspaces: Arc<WorkspaceRegistry>,
    events: Arc<EventBus>,
    monitor: Arc<dyn TaskMonitor>,
    replayer: QueuedEditReplayer,
}

impl Dispatcher {
    /// Negotiate the service level once and keep it for the connection.
    pub fn new(
        transports: TransportSet,
        locations: &dyn LocationService,
        workspaces: Arc<WorkspaceRegistry>,
        events: Arc<EventBus>,
        configuration_dir: impl Into<PathBuf>,
    ) -> Self {
        let level = negotiate(&transports, locations);
        Self {
            transports,
            level,
            supported_features: Mutex::new(None),
            workspaces,
            events,
            monitor: Arc::new(NeverCancelled),
            replayer: QueuedEditReplayer::new(configuration_dir),
        }
    }

    pub fn with_task_monitor(mut self, monitor: Arc<dyn TaskMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn service_level(&self) -> ServiceLevel {
        self.level
    }

    pub fn workspaces(&self) -> &Arc<WorkspaceRegistry> {
        &self.workspaces
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn replayer(&self) -> &QueuedEditReplayer {
        &self.replayer
    }

    /// Capability mask of the server, fetched on first use.
    pub fn supported_features(&self) -> Result<SupportedFeatures, VcError> {
        let mut cached = self
            .supported_features
            .lock()
            .map_err(|_| VcError::VersionControl("supported features cache poisoned".into()))?;
        if let Some(features) = *cached {
            return Ok(features);
        }
        let properties = self
            .transports
            .repository
            .get_repository_properties()
            .map_err(map_fault)?;
        *cached = Some(properties.supported_features);
        Ok(properties.supported_features)
    }

    // ── Gating ──────────────────────────────────────────────────────

    pub(crate) fn require_service_level(
        &self,
        required: ServiceLevel,
        feature: &str,
    ) -> Result<(), VcError> {
        if self.level < required {
            return Err(VcError::not_supported(feature, required, self.level));
        }
        Ok(())
    }

    /// The oldest generation did not version-gate reliably; consult its
    /// capability mask instead. Newer servers pass unconditionally.
    pub(crate) fn require_supported_feature(
        &self,
        feature: SupportedFeatures,
        description: &str,
    ) -> Result<(), VcError> {
        if self.level != ServiceLevel::PreTfs2010 {
            return Ok(());
        }
        if !self.supported_features()?.contains(feature) {
            return Err(VcError::CapabilityMissing(description.to_string()));
        }
        Ok(())
    }

    /// Property filters need 2012.2; otherwise attribute filters need 2010.
    pub(crate) fn require_filter_support(
        &self,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<(), VcError> {
        if !property_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2012Update2, "item property filters")
        } else if !attribute_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2010, "item attribute filters")
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), VcError> {
        self.monitor.check()
    }

    // ── Queued edits ────────────────────────────────────────────────

    /// Replay queued edits for a SERVER workspace on this machine. Local
    /// workspaces never queue edits this way.
    pub fn playback_queued_edits(
        &self,
        workspace: &str,
        owner: &str,
        excluded: &[ChangeRequest],
    ) -> ReplayReport {
        if self.level < ServiceLevel::Tfs2010 {
            return ReplayReport::Nothing;
        }
        let Some(ws) = self.workspaces.server_workspace(workspace, owner) else {
            return ReplayReport::Nothing;
        };
        if ws.security_token.is_none() {
            return ReplayReport::Nothing;
        }
        self.replayer.playback(self, &ws, excluded, &self.events)
    }

    pub(crate) fn transports(&self) -> &TransportSet {
        &self.transports
    }
}

impl EditPender for Dispatcher {
    fn pend_queued_edits(&self, workspace: &Workspace, paths: &[String]) -> Result<PendOutcome, VcError> {
        let changes: Vec<ChangeRequest> = paths.iter().map(ChangeRequest::edit).collect();
        self.pend_changes(
            &workspace.name,
            &workspace.owner,
            &changes,
            PendChangesOptions::FORCE_CHECK_OUT_LOCAL_VERSION,
            SupportedFeatures::ALL,
            &[],
            &[],
        )
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("level", &self.level)
            .field("transports", &self.transports)
            .finish()
    }
}
