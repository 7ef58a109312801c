// Server paths, local paths and the mapping between them.

pub mod local;
pub mod mapping;
pub mod server;

pub use server::{PathError, MAX_SERVER_PATH_SIZE, ROOT};
