//! Management protocols for simulated devices: SSH and Telnet.
//!
//! Both protocols admit clients through the management engine, which
//! enforces session limits, idle timeouts and failed-login blocking.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod credentials;
pub mod ssh;
pub mod telnet;

pub use credentials::{LoginCredentials, UserAccount, UserDatabase};
pub use ssh::{Ssh, SshConfig, SshCredentials, SshSession};
pub use telnet::{Telnet, TelnetConfig, TelnetSession};
