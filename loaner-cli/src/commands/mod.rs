//! CLI command implementations.
//!
//! - `init`: Create the data directory and database
//! - `device`: Provision and list devices
//! - `requester`: Register and list requesters
//! - `reserve`: Loan a device to a requester
//! - `status`: End a reservation (`complete`, `cancel`)
//! - `queue`: Join, leave, list and clear the tier waitlists
//! - `list`: List active reservations or the full history
//! - `check`: Audit the stored data for inconsistencies
//! - `demo`: Drive sample traffic through the worker pool
//! - `completions`: Generate shell completion scripts

pub mod check;
pub mod completions;
pub mod demo;
pub mod device;
pub mod init;
pub mod list;
pub mod queue;
pub mod requester;
pub mod reserve;
pub mod status;

pub use check::CheckCommand;
pub use completions::CompletionsCommand;
pub use demo::DemoCommand;
pub use device::DeviceCommand;
pub use init::InitCommand;
pub use list::ListCommand;
pub use queue::QueueCommand;
pub use requester::RequesterCommand;
pub use reserve::ReserveCommand;
pub use status::FinishCommand;
