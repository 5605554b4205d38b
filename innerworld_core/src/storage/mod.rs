pub mod records;
pub mod store;

// Re-export the modules here for easy import elsewhere.
pub use records::*;
pub use store::*;
