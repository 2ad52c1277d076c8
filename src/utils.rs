/// Spinner wrapper for long-running API calls
pub mod spinner;

pub use spinner::Spinner;
