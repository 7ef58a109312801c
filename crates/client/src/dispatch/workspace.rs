// Workspace create, update and lookup.

use tfvc_common::flags::{SupportedFeatures, WorkspaceOptions};
use tfvc_common::types::{PermissionProfile, Workspace, WorkspaceLocation};
use tfvc_common::{map_fault, ServiceLevel, VcError};

use super::ladder::Ladder;
use super::Dispatcher;

impl Dispatcher {
    /// Create a workspace. The new workspace has nothing to replay.
    pub fn create_workspace(&self, workspace: &Workspace) -> Result<Workspace, VcError> {
        if workspace.location == WorkspaceLocation::Local {
            self.require_service_level(ServiceLevel::Tfs2012, "local workspaces")?;
        }
        if workspace.options.contains(WorkspaceOptions::SET_FILE_TO_CHECKIN) {
            self.require_service_level(ServiceLevel::Tfs2012Update1, "set file time to check-in")?;
        }
        if workspace.permission_profile != PermissionProfile::Private {
            self.require_service_level(ServiceLevel::Tfs2010, "workspace permission profiles")?;
        }
        self.check_one_level_mappings(workspace)?;

        self.transports()
            .repository
            .create_workspace(workspace)
            .map_err(map_fault)
    }

    /// Update a workspace, possibly renaming it from `old_name`.
    pub fn update_workspace(
        &self,
        old_name: &str,
        owner: &str,
        workspace: &Workspace,
        features: SupportedFeatures,
    ) -> Result<Workspace, VcError> {
        self.playback_queued_edits(old_name, owner, &[]);
        self.check_one_level_mappings(workspace)?;
        if workspace.options.contains(WorkspaceOptions::SET_FILE_TO_CHECKIN) {
            self.require_service_level(ServiceLevel::Tfs2012Update1, "set file time to check-in")?;
        }

        self.transports()
            .repository
            .update_workspace(old_name, owner, workspace, features)
            .map_err(map_fault)
    }

    /// Fetch the server's copy of a workspace. `None` when it does not exist.
    pub fn query_workspace(&self, workspace: &str, owner: &str) -> Result<Option<Workspace>, VcError> {
        self.playback_queued_edits(workspace, owner, &[]);

        let t = self.transports();
        Ladder::new("query_workspace")
            .rung(ServiceLevel::Tfs2012, || {
                t.repository4()?
                    .query_workspace(workspace, owner)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .query_workspace(workspace, owner)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    fn check_one_level_mappings(&self, workspace: &Workspace) -> Result<(), VcError> {
        if workspace.has_one_level_mapping() {
            self.require_supported_feature(
                SupportedFeatures::ONE_LEVEL_MAPPING,
                "one-level working folder mappings",
            )?;
        }
        Ok(())
    }
}
