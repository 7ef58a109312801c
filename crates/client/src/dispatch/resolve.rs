// Conflict resolution.
//
// Conflicts are resolved one server call at a time. A single resolution
// can close other conflicts as a side effect; those are skipped rather
// than sent again.

use std::collections::HashSet;

use tracing::{debug, warn};

use tfvc_common::flags::ChangePendedFlags;
use tfvc_common::types::{Conflict, LockLevel};
use tfvc_common::{map_fault, ServiceLevel, VcError};

use super::ladder::Ladder;
use super::{Dispatcher, ResolveErrorOptions, ResolveHandler, ResolvedConflict, MAX_PATH};

/// Encoding sent when the caller did not pick one.
const DEFAULT_ENCODING: i32 = -2;

impl Dispatcher {
    pub fn resolve(
        &self,
        workspace: &str,
        owner: &str,
        conflicts: &[Conflict],
        property_filters: &[String],
        attribute_filters: &[String],
        error_options: ResolveErrorOptions,
        handler: &mut dyn ResolveHandler,
    ) -> Result<(), VcError> {
        self.require_filter_support(property_filters, attribute_filters)?;
        self.playback_queued_edits(workspace, owner, &[]);

        let mut resolved_ids = HashSet::new();
        for conflict in conflicts {
            self.check_cancelled()?;
            if resolved_ids.contains(&conflict.id) {
                debug!(conflict = conflict.id, "already resolved by an earlier resolution");
                continue;
            }

            match self.resolve_one(workspace, owner, conflict, property_filters, attribute_filters) {
                Ok(resolution) => {
                    resolved_ids.extend(resolution.resolved_conflicts.iter().map(|c| c.id));
                    handler.resolved(resolution);
                }
                Err(error) => match error_options {
                    ResolveErrorOptions::ThrowOnError => return Err(error),
                    ResolveErrorOptions::ReportToHandler => {
                        warn!(conflict = conflict.id, %error, "conflict resolution failed");
                        handler.failed(conflict, error);
                    }
                },
            }
        }
        Ok(())
    }

    fn resolve_one(
        &self,
        workspace: &str,
        owner: &str,
        conflict: &Conflict,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<ResolvedConflict, VcError> {
        let options = &conflict.resolution_options;
        let new_path = options.new_path.as_deref();
        let encoding = options.accept_merge_encoding.unwrap_or(DEFAULT_ENCODING);
        let lock = LockLevel::Unchanged;
        let props = Some(property_filters);
        let attrs = Some(attribute_filters);
        let t = self.transports();

        Ladder::new("resolve")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .resolve(
                        workspace,
                        owner,
                        conflict.id,
                        conflict.resolution,
                        new_path,
                        encoding,
                        lock,
                        &options.accept_merge_properties,
                        props,
                        attrs,
                        MAX_PATH,
                    )
                    .map(|r| ResolvedConflict::from_response(conflict, r))
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .resolve(
                        workspace,
                        owner,
                        conflict.id,
                        conflict.resolution,
                        new_path,
                        encoding,
                        lock,
                        &options.accept_merge_properties,
                        props,
                        attrs,
                    )
                    .map(|r| ResolvedConflict::from_response(conflict, r))
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .resolve(workspace, owner, conflict.id, conflict.resolution, new_path, encoding, lock, attrs)
                    .map(|r| ResolvedConflict::from_response(conflict, r))
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .resolve(workspace, owner, conflict.id, conflict.resolution, new_path, encoding, lock)
                    .map(|r| ResolvedConflict::from_legacy(conflict, r))
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    /// Drop conflicts that exist only on this machine. Each removal is
    /// reported as an empty resolution.
    pub fn remove_local_conflicts(
        &self,
        workspace: &str,
        owner: &str,
        conflicts: &[Conflict],
        error_options: ResolveErrorOptions,
        handler: &mut dyn ResolveHandler,
    ) -> Result<(), VcError> {
        self.playback_queued_edits(workspace, owner, &[]);

        for conflict in conflicts {
            self.check_cancelled()?;
            let removed = self
                .transports()
                .repository
                .remove_local_conflict(workspace, owner, conflict.id)
                .map_err(map_fault);
            match removed {
                Ok(()) => handler.resolved(ResolvedConflict {
                    conflict: conflict.clone(),
                    operations: Vec::new(),
                    undo_operations: Vec::new(),
                    resolved_conflicts: Vec::new(),
                    flags: ChangePendedFlags::UNKNOWN,
                }),
                Err(error) => match error_options {
                    ResolveErrorOptions::ThrowOnError => return Err(error),
                    ResolveErrorOptions::ReportToHandler => handler.failed(conflict, error),
                },
            }
        }
        Ok(())
    }
}
