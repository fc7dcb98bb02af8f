//! CLI subcommand implementations.

pub mod dashboard;
pub mod history;
pub mod init;
pub mod record;
pub mod status;
pub mod timing;
pub mod util;
pub mod watch;
