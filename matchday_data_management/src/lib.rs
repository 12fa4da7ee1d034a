pub mod database;
pub mod memory;
mod data_manager;
mod store;

pub use data_manager::*;
pub use store::*;

/// How many observations seed a traffic advice prompt.
pub const RECENT_LOCATION_LIMIT: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum DataManagerError {
    #[error("{0}")]
    Database(String),
    #[error("{0}")]
    NotFound(String),
}
