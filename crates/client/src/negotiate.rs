// Service level negotiation: probe newest generation first, fall back.

use tracing::info;

use tfvc_common::ServiceLevel;

use crate::transport::{interfaces, LocationService, TransportSet};

/// Decide the protocol generation for a connection.
///
/// A missing handle or an unresolved location only lowers the result;
/// negotiation itself never fails.
pub fn negotiate(transports: &TransportSet, locations: &dyn LocationService) -> ServiceLevel {
    let resolves = |tag: &str| locations.location_for(tag).is_some();

    let level = if transports.repository5.is_some() {
        if resolves(interfaces::VERSION_CONTROL_5_1) {
            ServiceLevel::Tfs2012Qu1Update1
        } else {
            ServiceLevel::Tfs2012Qu1
        }
    } else if transports.repository4.is_some() {
        if resolves(interfaces::VERSION_CONTROL_4_3) {
            ServiceLevel::Tfs2012Update3
        } else if resolves(interfaces::VERSION_CONTROL_4_2) {
            ServiceLevel::Tfs2012Update2
        } else if resolves(interfaces::VERSION_CONTROL_4_1) {
            ServiceLevel::Tfs2012Update1
        } else {
            ServiceLevel::Tfs2012
        }
    } else if transports.extensions.is_some() {
        ServiceLevel::Tfs2010
    } else {
        ServiceLevel::PreTfs2010
    };

    info!(level = %level, "negotiated version control service level");
    level
}
