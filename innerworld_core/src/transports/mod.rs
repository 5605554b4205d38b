pub mod local;
pub mod transport;

// Re-export the modules here for easy import elsewhere.
pub use local::*;
pub use transport::*;
