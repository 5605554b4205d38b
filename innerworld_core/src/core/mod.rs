pub mod state;
pub mod sync_store;

// Re-export the modules here for easy import elsewhere.
pub use state::*;
pub use sync_store::*;
