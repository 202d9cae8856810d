//! Info command implementation.

use super::Connection;
use handsync_protocol::ItemKind;
use serde::Serialize;

/// What the device reports about itself.
#[derive(Debug, Serialize)]
pub struct InfoResult {
    /// Model name.
    pub model: String,
    /// Two-letter language code.
    pub language: String,
    /// Whether a password is required.
    pub requires_auth: bool,
    /// Storage path on the device.
    pub storage_path: String,
}

/// Runs the info command.
pub fn run(connection: &Connection, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connection.start(ItemKind::Todo)?;
    let info = session
        .device_info()
        .cloned()
        .ok_or("device sent no identity")?;
    let storage_path = session.request_storage_path()?;
    session.terminate()?;

    let result = InfoResult {
        model: info.model_name(),
        language: info.language_code(),
        requires_auth: info.requires_auth(),
        storage_path,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("Device");
            println!("  Model:        {}", result.model);
            println!("  Language:     {}", result.language);
            println!(
                "  Password:     {}",
                if result.requires_auth { "required" } else { "not required" }
            );
            println!("  Storage path: {}", result.storage_path);
        }
    }

    Ok(())
}
