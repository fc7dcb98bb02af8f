//! Init command for establishing the client identity.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::commands::util::open_store;

/// Runs the init command.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let client_id = store.client_id();

    writeln!(writer, "Client ID: {client_id}")?;
    writeln!(writer, "Database:  {}", config.database_path.display())?;

    Ok(())
}
