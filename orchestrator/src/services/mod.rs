//! Service implementations
//!
//! Real implementations of the service traits. These are the production
//! implementations that handle actual I/O: disks, emulator processes and
//! the terminal.

pub mod console;
pub mod disk_manager;
pub mod process_manager;
pub mod process_output_handler;

// Re-export all service implementations
pub use console::ConsoleObserver;
pub use disk_manager::RealDiskManager;
pub use process_manager::RealProcessManager;
