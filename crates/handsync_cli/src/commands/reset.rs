//! Reset command implementation.

use super::Connection;
use handsync_protocol::ItemKind;

/// Runs the reset command.
pub fn run(connection: &Connection, kind: ItemKind) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connection.start(kind)?;
    let flags = session.reset_sync_state(kind)?;
    session.terminate()?;

    for k in ItemKind::ALL {
        let state = if flags.is_synced(k) { "in sync" } else { "slow sync" };
        println!("  {:<8} {state}", k.name());
    }
    Ok(())
}
