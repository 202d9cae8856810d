//! CLI command implementations.

pub mod info;
pub mod pull;
pub mod reset;
pub mod time;

use handsync_engine::{AuthOutcome, FileMessageLog, SessionConfig, SyncSession};
use handsync_protocol::ItemKind;
use std::path::PathBuf;
use tracing::info;

/// Where and how to reach the device.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Device address.
    pub device: String,
    /// Device port.
    pub port: u16,
    /// Desktop listener port.
    pub listen_port: u16,
    /// Password, if any.
    pub password: Option<String>,
    /// Message log file.
    pub log: Option<PathBuf>,
}

impl Connection {
    /// Builds an idle session for `kind`.
    pub fn session(&self, kind: ItemKind) -> Result<SyncSession, Box<dyn std::error::Error>> {
        let mut config = SessionConfig::new(self.device.as_str())
            .with_device_port(self.port)
            .with_listen_port(self.listen_port)
            .with_kind(kind);
        if let Some(password) = &self.password {
            config = config.with_password(password.as_bytes());
        }

        let session = SyncSession::new(config);
        Ok(match &self.log {
            Some(path) => {
                info!(path = %path.display(), "message log");
                session.with_log(FileMessageLog::open(path)?)
            }
            None => session,
        })
    }

    /// Opens a session and runs the handshake up to the sync state.
    pub fn start(&self, kind: ItemKind) -> Result<SyncSession, Box<dyn std::error::Error>> {
        let mut session = self.session(kind)?;
        if session.initiate_sync()? == AuthOutcome::Denied {
            session.finalize();
            return Err("device refused the password".into());
        }
        Ok(session)
    }
}

/// `~/.handsync/handsync.log`, if a home directory is known.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".handsync").join("handsync.log"))
}
