// Bit-flag sets exchanged with the server.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Kind of change recorded against an item.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ChangeType: u32 {
        const NONE = 0;
        const ADD = 1;
        const EDIT = 1 << 1;
        const ENCODING = 1 << 2;
        const RENAME = 1 << 3;
        const DELETE = 1 << 4;
        const UNDELETE = 1 << 5;
        const BRANCH = 1 << 6;
        const MERGE = 1 << 7;
        const LOCK = 1 << 8;
        const ROLLBACK = 1 << 9;
        const SOURCE_RENAME = 1 << 10;
        const PROPERTY = 1 << 11;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct GetOptions: u32 {
        const NONE = 0;
        const OVERWRITE = 1;
        const GET_ALL = 1 << 1;
        const PREVIEW = 1 << 2;
        const REMAP = 1 << 3;
        /// Client-only: never sent on the wire.
        const NO_DISK_UPDATE = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PendChangesOptions: u32 {
        const NONE = 0;
        const GET_LATEST_ON_CHECKOUT = 1;
        const SILENT = 1 << 1;
        const FORCE_CHECK_OUT_LOCAL_VERSION = 1 << 2;
        const APPLY_LOCAL_ITEM_EXCLUSIONS = 1 << 3;
        const SUPPRESS_ITEM_NOT_FOUND_FAILURES = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CheckinFlags: u32 {
        const NONE = 0;
        const SUPPRESS_EVENT = 1;
        const VALIDATE_CHECK_IN_OWNER = 1 << 1;
        const ALLOW_UNCHANGED_CONTENT = 1 << 2;
        const NO_AUTO_RESOLVE = 1 << 3;
        const QUEUE_BUILD_FOR_GATED_CHECK_IN = 1 << 4;
    }
}

bitflags! {
    /// Capability mask advertised by the oldest server generation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SupportedFeatures: u32 {
        const NONE = 0;
        const GET_LATEST_ON_CHECKOUT = 1;
        const ONE_LEVEL_MAPPING = 2;
        const DESTROY = 4;
        const CREATE_BRANCH = 8;
        const GET_CHANGES_FOR_CHANGESET = 16;
        const PROXY_SUPPORT = 32;
        const LOCK_LEVEL_CHECKOUT = 64;
        const CHECKIN_DATES = 128;
        const ALL = 255;
    }
}

bitflags! {
    /// Side effects of a mutating call that cached state must follow.
    ///
    /// `UNKNOWN` has every bit set: a generation that cannot report side
    /// effects forces callers to assume all of them happened.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ChangePendedFlags: u32 {
        const NONE = 0;
        const WORKING_FOLDER_MAPPINGS_UPDATED = 1;
        const UNKNOWN = u32::MAX;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WorkspaceOptions: u32 {
        const NONE = 0;
        const SET_FILE_TO_CHECKIN = 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MergeFlags: u32 {
        const NONE = 0;
        const FORCE_MERGE = 1;
        const BASELESS = 1 << 1;
        const NO_MERGE = 1 << 2;
        const ALWAYS_ACCEPT_MINE = 1 << 3;
        const SILENT = 1 << 4;
        const NO_IMPLICIT_BASELESS = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RollbackOptions: u32 {
        const NONE = 0;
        const TO_VERSION = 1;
        const SILENT = 1 << 1;
        const NO_AUTO_RESOLVE = 1 << 2;
        const KEEP_MERGE_HISTORY = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct GetItemsOptions: u32 {
        const NONE = 0;
        const DOWNLOAD = 1;
        const UNSORTED = 1 << 1;
        const INCLUDE_BRANCH_INFO = 1 << 2;
        const INCLUDE_SOURCE_RENAMES = 1 << 3;
        /// Answer from local workspace tables only.
        const LOCAL_ONLY = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_implies_mappings_updated() {
        assert!(ChangePendedFlags::UNKNOWN.contains(ChangePendedFlags::WORKING_FOLDER_MAPPINGS_UPDATED));
        assert!(!ChangePendedFlags::NONE.contains(ChangePendedFlags::WORKING_FOLDER_MAPPINGS_UPDATED));
    }

    #[test]
    fn supported_features_all_covers_every_bit() {
        let union = SupportedFeatures::GET_LATEST_ON_CHECKOUT
            | SupportedFeatures::ONE_LEVEL_MAPPING
            | SupportedFeatures::DESTROY
            | SupportedFeatures::CREATE_BRANCH
            | SupportedFeatures::GET_CHANGES_FOR_CHANGESET
            | SupportedFeatures::PROXY_SUPPORT
            | SupportedFeatures::LOCK_LEVEL_CHECKOUT
            | SupportedFeatures::CHECKIN_DATES;
        assert_eq!(union, SupportedFeatures::ALL);
    }

    #[test]
    fn stripping_client_only_get_option() {
        let options = GetOptions::OVERWRITE | GetOptions::NO_DISK_UPDATE;
        assert_eq!(options - GetOptions::NO_DISK_UPDATE, GetOptions::OVERWRITE);
    }
}
