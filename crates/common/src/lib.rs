// tfvc-common: value types, flag sets and errors shared by the tfvc crates

pub mod error;
pub mod flags;
pub mod level;
pub mod path;
pub mod types;

pub use error::{map_fault, TransportFault, VcError};
pub use level::ServiceLevel;
