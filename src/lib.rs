pub mod configuration;
pub mod error_handling;
pub mod network;
pub mod persistence;
pub mod session_management;
pub mod storage;

pub use session_management::SessionStatus;
