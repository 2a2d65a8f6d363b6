//! Process lifecycle: the single-run lock and signal handling.

pub mod lock;
pub mod shutdown;

pub use lock::RunLock;
pub use shutdown::ShutdownCoordinator;
