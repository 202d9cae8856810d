//! Time command implementation.

use super::Connection;
use handsync_protocol::{DeviceTime, ItemKind};

/// Runs the time command.
pub fn run(connection: &Connection, set: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let new_time = set.map(DeviceTime::parse).transpose()?;

    let mut session = connection.start(ItemKind::Todo)?;
    if let Some(time) = new_time {
        session.set_time(time)?;
    }
    let time = session.request_time()?;
    session.terminate()?;

    println!("{time}");
    Ok(())
}
