// tfvc-client: version-compatibility layer between a client and servers of
// several protocol generations.

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod history;
pub mod layer;
pub mod local;
pub mod negotiate;
pub mod replay;
pub mod transport;
pub mod workspace;

pub use dispatch::Dispatcher;
pub use history::{HistoryIterator, HistorySource};
pub use layer::VersionControlLayer;
pub use local::LocalWorkspaceStrategy;
