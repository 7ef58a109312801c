// Operations that pend or undo changes, plus get.

use tfvc_common::flags::{
    GetOptions, MergeFlags, PendChangesOptions, RollbackOptions, SupportedFeatures,
};
use tfvc_common::types::{
    ChangeRequest, GetOperation, GetRequest, ItemSpec, LockLevel, RequestType, VersionSpec,
};
use tfvc_common::{map_fault, ServiceLevel, VcError};

use super::ladder::Ladder;
use super::{Dispatcher, MergeOutcome, PendOutcome, UnshelveOutcome, MAX_PATH};

impl Dispatcher {
    /// Download (or preview) items. Rows the server leaves empty are dropped.
    pub fn get(
        &self,
        workspace: &str,
        owner: &str,
        requests: &[GetRequest],
        max_results: i32,
        options: GetOptions,
        no_get: bool,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<Vec<Vec<GetOperation>>, VcError> {
        self.require_filter_support(property_filters, attribute_filters)?;
        if max_results != 0 && options.contains(GetOptions::GET_ALL) {
            return Err(VcError::usage("max_results cannot be combined with GET_ALL"));
        }

        let mut wire_options = options - GetOptions::NO_DISK_UPDATE;
        if no_get {
            wire_options |= GetOptions::PREVIEW;
        }

        self.playback_queued_edits(workspace, owner, &[]);

        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();
        let rows = Ladder::new("get")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .get(workspace, owner, requests, max_results, wire_options, props, attrs, MAX_PATH)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .get(workspace, owner, requests, max_results, wire_options, props, attrs)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .get(workspace, owner, requests, max_results, wire_options, attrs)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .get(
                        workspace,
                        owner,
                        requests,
                        wire_options.contains(GetOptions::GET_ALL),
                        wire_options.contains(GetOptions::PREVIEW),
                        max_results,
                        wire_options,
                    )
                    .map_err(map_fault)
            })
            .run(self.service_level())?;

        Ok(rows.into_iter().flatten().collect())
    }

    pub fn merge(
        &self,
        workspace: &str,
        owner: &str,
        source: &ItemSpec,
        target: &str,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        lock_level: LockLevel,
        flags: MergeFlags,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<MergeOutcome, VcError> {
        self.require_filter_support(property_filters, attribute_filters)?;
        self.playback_queued_edits(workspace, owner, &[]);

        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();
        Ladder::new("merge")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .merge(workspace, owner, source, target, from, to, lock_level, flags, props, attrs, MAX_PATH)
                    .map(MergeOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .merge(workspace, owner, source, target, from, to, lock_level, flags, props, attrs)
                    .map(MergeOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .merge(workspace, owner, source, target, from, to, lock_level, flags, attrs)
                    .map(MergeOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .merge(workspace, owner, source, target, from, to, lock_level, flags)
                    .map(MergeOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    /// Pend a homogeneous batch of changes on the server.
    ///
    /// An EDIT batch excludes its own items from queued-edit replay so the
    /// same file is not pended twice.
    pub fn pend_changes(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        let first = changes
            .first()
            .ok_or_else(|| VcError::usage("at least one change request is required"))?;
        self.require_filter_support(property_filters, attribute_filters)?;
        if options.contains(
            PendChangesOptions::FORCE_CHECK_OUT_LOCAL_VERSION
                | PendChangesOptions::GET_LATEST_ON_CHECKOUT,
        ) {
            return Err(VcError::usage(
                "FORCE_CHECK_OUT_LOCAL_VERSION cannot be combined with GET_LATEST_ON_CHECKOUT",
            ));
        }

        let excluded: &[ChangeRequest] = if first.request_type == RequestType::Edit {
            changes
        } else {
            &[]
        };
        self.playback_queued_edits(workspace, owner, excluded);

        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();
        Ladder::new("pend_changes")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .pend_changes(workspace, owner, changes, options, features, props, attrs, MAX_PATH)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .pend_changes(workspace, owner, changes, options, features, props, attrs)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .pend_changes(workspace, owner, changes, options, features, attrs)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .pend_changes(workspace, owner, changes, options, features)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    /// Pend on the server on behalf of a local workspace.
    pub fn pend_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        if changes.is_empty() {
            return Err(VcError::usage("at least one change request is required"));
        }
        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();
        Ladder::new("pend_changes_in_local_workspace")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .pend_changes_in_local_workspace(workspace, owner, changes, options, features, props, attrs, MAX_PATH)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012, || {
                t.repository4()?
                    .pend_changes_in_local_workspace(workspace, owner, changes, options, features, props, attrs)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    pub fn rollback(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        item_version: Option<&VersionSpec>,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        options: RollbackOptions,
        lock_level: LockLevel,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<MergeOutcome, VcError> {
        if !property_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2012Update2, "item property filters")?;
        }
        self.playback_queued_edits(workspace, owner, &[]);

        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();
        Ladder::new("rollback")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .rollback(workspace, owner, items, item_version, from, to, options, lock_level, props, attrs, MAX_PATH)
                    .map(MergeOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .rollback(workspace, owner, items, item_version, from, to, options, lock_level, props, attrs)
                    .map(MergeOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .rollback(workspace, owner, items, item_version, from, to, options, lock_level, attrs)
                    .map(MergeOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    pub fn undo_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        self.require_filter_support(property_filters, attribute_filters)?;
        self.playback_queued_edits(workspace, owner, &[]);

        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();
        Ladder::new("undo_pending_changes")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .undo_pending_changes(workspace, owner, items, props, attrs, MAX_PATH)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .undo_pending_changes(workspace, owner, items, props, attrs)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .undo_pending_changes(workspace, owner, items, attrs)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .undo_pending_changes(workspace, owner, items)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    pub fn undo_pending_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();
        Ladder::new("undo_pending_changes_in_local_workspace")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .undo_pending_changes_in_local_workspace(workspace, owner, items, props, attrs, MAX_PATH)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012, || {
                t.repository4()?
                    .undo_pending_changes_in_local_workspace(workspace, owner, items, props, attrs)
                    .map(PendOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    /// Unshelve into a workspace. The outcome's shelveset is `None` when
    /// the server did not find it.
    pub fn unshelve(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
        shelveset_property_filters: &[String],
        merge: bool,
    ) -> Result<UnshelveOutcome, VcError> {
        if !property_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2012Update2, "item property filters")?;
        } else if merge {
            self.require_service_level(ServiceLevel::Tfs2012, "unshelve with merge")?;
        } else if !shelveset_property_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2012, "shelveset property filters")?;
        } else if !attribute_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2010, "item attribute filters")?;
        }
        self.playback_queued_edits(workspace, owner, &[]);

        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let shelveset_props = Some(shelveset_property_filters);
        let t = self.transports();
        Ladder::new("unshelve")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .unshelve(
                        shelveset_name,
                        shelveset_owner,
                        workspace,
                        owner,
                        items,
                        props,
                        attrs,
                        shelveset_props,
                        merge,
                        MAX_PATH,
                    )
                    .map(UnshelveOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012, || {
                t.repository4()?
                    .unshelve(
                        shelveset_name,
                        shelveset_owner,
                        workspace,
                        owner,
                        items,
                        props,
                        attrs,
                        shelveset_props,
                        merge,
                    )
                    .map(UnshelveOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .unshelve(shelveset_name, shelveset_owner, workspace, owner, items, attrs)
                    .map(UnshelveOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .unshelve(shelveset_name, shelveset_owner, workspace, owner, items)
                    .map(UnshelveOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }
}
