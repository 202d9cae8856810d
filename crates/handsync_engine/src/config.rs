//! Configuration for a sync session.

use handsync_protocol::ItemKind;
use std::fmt;
use zeroize::Zeroizing;

/// Port the device listens on.
pub const DEVICE_PORT: u16 = 4244;

/// Port the desktop listens on for the device's callback connection.
pub const DESKTOP_PORT: u16 = 4245;

/// Configuration for a sync session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Device host name or address.
    pub device_host: String,
    /// Device port.
    pub device_port: u16,
    /// Address the desktop listener binds to.
    pub listen_host: String,
    /// Desktop listener port; `0` picks an ephemeral port.
    pub listen_port: u16,
    /// Password sent during authentication.
    pub password: Option<Zeroizing<Vec<u8>>>,
    /// Category the session starts with.
    pub kind: ItemKind,
}

impl SessionConfig {
    /// Creates a configuration for the given device host.
    pub fn new(device_host: impl Into<String>) -> Self {
        Self {
            device_host: device_host.into(),
            device_port: DEVICE_PORT,
            listen_host: "0.0.0.0".to_string(),
            listen_port: DESKTOP_PORT,
            password: None,
            kind: ItemKind::Todo,
        }
    }

    /// Sets the device port.
    pub fn with_device_port(mut self, port: u16) -> Self {
        self.device_port = port;
        self
    }

    /// Sets the listener bind address.
    pub fn with_listen_host(mut self, host: impl Into<String>) -> Self {
        self.listen_host = host.into();
        self
    }

    /// Sets the listener port.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Sets the password.
    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Sets the starting category.
    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("127.0.0.1")
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("device_host", &self.device_host)
            .field("device_port", &self.device_port)
            .field("listen_host", &self.listen_host)
            .field("listen_port", &self.listen_port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("kind", &self.kind)
            .finish()
    }
}
