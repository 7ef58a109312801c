// Check-in, shelving and conflict bookkeeping.

use tfvc_common::flags::CheckinFlags;
use tfvc_common::types::{Changeset, CheckinNotificationInfo, Failure, NewConflict, Shelveset};
use tfvc_common::{map_fault, ServiceLevel, VcError};

use super::ladder::Ladder;
use super::{CheckinOutcome, Dispatcher, MAX_PATH};

impl Dispatcher {
    pub fn add_conflict(&self, workspace: &str, owner: &str, conflict: &NewConflict) -> Result<(), VcError> {
        self.playback_queued_edits(workspace, owner, &[]);

        let t = self.transports();
        Ladder::new("add_conflict")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .add_conflict(workspace, owner, conflict, MAX_PATH)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .add_conflict(workspace, owner, conflict)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    /// Commit pending changes for `server_items`.
    ///
    /// Event suppression, owner validation, a gated-build ticket and
    /// deferred commit are 2010 features and fail fast on older servers.
    pub fn check_in(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        changeset: &Changeset,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
        defer: bool,
        ticket: i32,
    ) -> Result<CheckinOutcome, VcError> {
        if flags.intersects(CheckinFlags::SUPPRESS_EVENT | CheckinFlags::VALIDATE_CHECK_IN_OWNER) {
            self.require_service_level(ServiceLevel::Tfs2010, "check-in event and owner flags")?;
        }
        if ticket != 0 {
            self.require_service_level(ServiceLevel::Tfs2010, "gated check-in tickets")?;
        }
        if defer {
            self.require_service_level(ServiceLevel::Tfs2010, "deferred check-in")?;
        }

        self.playback_queued_edits(workspace, owner, &[]);

        let t = self.transports();
        Ladder::new("check_in")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                let r = t
                    .repository5()?
                    .check_in(workspace, owner, server_items, changeset, info, flags, defer, ticket, MAX_PATH)
                    .map_err(map_fault)?;
                Ok(CheckinOutcome {
                    result: r.result,
                    conflicts: r.conflicts,
                    failures: r.failures,
                })
            })
            .rung(ServiceLevel::Tfs2012, || {
                let r = t
                    .repository4()?
                    .check_in(workspace, owner, server_items, changeset, info, flags, defer, ticket)
                    .map_err(map_fault)?;
                Ok(CheckinOutcome {
                    result: r.result,
                    conflicts: r.conflicts,
                    failures: r.failures,
                })
            })
            .rung(ServiceLevel::Tfs2010, || {
                let r = t
                    .extensions()?
                    .check_in(workspace, owner, server_items, changeset, info, flags, defer, ticket)
                    .map_err(map_fault)?;
                Ok(CheckinOutcome {
                    result: r.result,
                    conflicts: r.failures,
                    failures: Vec::new(),
                })
            })
            .rung(ServiceLevel::PreTfs2010, || {
                let r = t
                    .repository
                    .check_in(workspace, owner, server_items, changeset, info, flags)
                    .map_err(map_fault)?;
                Ok(CheckinOutcome {
                    result: r.result,
                    conflicts: r.failures,
                    failures: Vec::new(),
                })
            })
            .run(self.service_level())
    }

    /// Commit a shelveset directly. Never touches the caller's workspace,
    /// so queued edits are not replayed.
    pub fn check_in_shelveset(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        changeset_owner: &str,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
    ) -> Result<CheckinOutcome, VcError> {
        self.require_service_level(ServiceLevel::Tfs2010, "shelveset check-in")?;

        let t = self.transports();
        Ladder::new("check_in_shelveset")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                let r = t
                    .repository5()?
                    .check_in_shelveset(shelveset_name, shelveset_owner, changeset_owner, info, flags, MAX_PATH)
                    .map_err(map_fault)?;
                Ok(CheckinOutcome {
                    result: r.result,
                    conflicts: r.conflicts,
                    failures: r.failures,
                })
            })
            .rung(ServiceLevel::Tfs2012, || {
                let r = t
                    .repository4()?
                    .check_in_shelveset(shelveset_name, shelveset_owner, changeset_owner, info, flags)
                    .map_err(map_fault)?;
                Ok(CheckinOutcome {
                    result: r.result,
                    conflicts: r.conflicts,
                    failures: r.failures,
                })
            })
            .rung(ServiceLevel::Tfs2010, || {
                let r = t
                    .extensions()?
                    .check_in_shelveset(shelveset_name, shelveset_owner, changeset_owner, info, flags)
                    .map_err(map_fault)?;
                Ok(CheckinOutcome {
                    result: r.result,
                    conflicts: Vec::new(),
                    failures: r.failures,
                })
            })
            .run(self.service_level())
    }

    pub fn check_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
    ) -> Result<Vec<Failure>, VcError> {
        self.playback_queued_edits(workspace, owner, &[]);

        let t = self.transports();
        Ladder::new("check_pending_changes")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .check_pending_changes(workspace, owner, server_items, MAX_PATH)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .check_pending_changes(workspace, owner, server_items)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    pub fn shelve(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        shelveset: &Shelveset,
        replace: bool,
    ) -> Result<Vec<Failure>, VcError> {
        self.playback_queued_edits(workspace, owner, &[]);

        let t = self.transports();
        Ladder::new("shelve")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .shelve(workspace, owner, server_items, shelveset, replace, MAX_PATH)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .shelve(workspace, owner, server_items, shelveset, replace)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }
}
