//! Sync session state machine.

use crate::config::SessionConfig;
use crate::error::{SyncError, SyncResult};
use crate::log::{MessageLog, NullLog};
use crate::transport::{accept, bind, dial, Channel, Leg};
use handsync_codec::{ControlKind, Incoming};
use handsync_protocol::{
    decode_item, encode_item, DeviceInfo, DeviceTime, Item, ItemKind, ItemWrite, Message,
    ParamFormatEntry, ParamValue, SchemaError, SyncIdLists, SyncStateFlags,
};
use serde::Serialize;
use std::net::{TcpListener, TcpStream};
use tracing::{info, warn};
use zeroize::Zeroize;

/// The current state of a sync session.
///
/// States are ordered; an operation that needs a state accepts any later
/// connected state as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// Nothing open.
    Idle,
    /// Desktop listener bound.
    Listening,
    /// Both legs open.
    Connected,
    /// Device information received.
    InfoKnown,
    /// Password accepted or not required.
    Authenticated,
    /// Sync-state flags received.
    StateKnown,
    /// Parameter format cached for the selected category.
    FormatKnown,
    /// Ids or items are being fetched.
    Iterating,
    /// The selected category was marked done.
    Done,
    /// The session was terminated or finalized.
    Disconnected,
}

impl SessionState {
    /// Returns true while both legs are open.
    pub fn is_connected(&self) -> bool {
        *self >= SessionState::Connected && *self <= SessionState::Done
    }

    /// Returns true if a new listener may be bound.
    pub fn can_listen(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Disconnected)
    }
}

/// Result of an authentication exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    /// The device accepted the session without a password check.
    NotRequired,
    /// The device refused the password.
    Denied,
}

/// Everything a pull of one category produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Category that was pulled.
    pub kind: ItemKind,
    /// True if the device reported the category as out of sync.
    pub slow_sync: bool,
    /// Id lists as reported by the device.
    pub ids: SyncIdLists,
    /// New and modified items, in id-list order.
    pub items: Vec<Item>,
}

impl PullReport {
    /// Ids the device deleted.
    pub fn deleted(&self) -> &[u32] {
        &self.ids.deleted.ids
    }
}

#[derive(Debug)]
struct CachedFormat {
    kind: ItemKind,
    entries: Vec<ParamFormatEntry>,
}

/// A desktop-side sync session with one device.
///
/// All operations take `&mut self`; a session is driven from one thread.
pub struct SyncSession {
    config: SessionConfig,
    state: SessionState,
    listener: Option<TcpListener>,
    inbound: Option<Channel<TcpStream>>,
    outbound: Option<Channel<TcpStream>>,
    log: Box<dyn MessageLog>,
    device: Option<DeviceInfo>,
    auth: Option<AuthOutcome>,
    kind: ItemKind,
    flags: Option<SyncStateFlags>,
    format: Option<CachedFormat>,
}

impl SyncSession {
    /// Creates an idle session.
    pub fn new(config: SessionConfig) -> Self {
        let kind = config.kind;
        Self {
            config,
            state: SessionState::Idle,
            listener: None,
            inbound: None,
            outbound: None,
            log: Box::new(NullLog),
            device: None,
            auth: None,
            kind,
            flags: None,
            format: None,
        }
    }

    /// Sets the message log sink.
    pub fn with_log(mut self, log: impl MessageLog + 'static) -> Self {
        self.log = Box::new(log);
        self
    }

    /// Gets the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Gets the selected category.
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Device information, once received.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Outcome of the last authentication exchange.
    pub fn auth_outcome(&self) -> Option<AuthOutcome> {
        self.auth
    }

    /// Sync-state flags, once received.
    pub fn sync_state(&self) -> Option<SyncStateFlags> {
        self.flags
    }

    /// Cached parameter format for the selected category.
    pub fn param_format(&self) -> Option<&[ParamFormatEntry]> {
        self.format
            .as_ref()
            .filter(|format| format.kind == self.kind)
            .map(|format| format.entries.as_slice())
    }

    /// Port the desktop listener is bound to.
    pub fn listen_port(&self) -> Option<u16> {
        self.listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
            .map(|addr| addr.port())
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, "session state");
            self.state = state;
        }
    }

    /// Moves forward to `state`; never moves back.
    fn advance(&mut self, state: SessionState) {
        if state > self.state {
            self.set_state(state);
        }
    }

    fn require(&self, operation: &'static str, at_least: SessionState) -> SyncResult<()> {
        if self.state.is_connected() && self.state >= at_least {
            Ok(())
        } else {
            Err(SyncError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// One wrapped request followed by one wrapped reply on the inbound leg.
    fn exchange(&mut self, request: &Message) -> SyncResult<Message> {
        let Self { inbound, log, .. } = self;
        let channel = inbound.as_mut().ok_or(SyncError::NotConnected)?;
        channel.wrapped_send(request, log.as_mut())?;
        channel.wrapped_recv(log.as_mut())
    }

    fn exchange_complete(&mut self, request: &Message) -> SyncResult<()> {
        match self.exchange(request)? {
            Message::ExchangeComplete => Ok(()),
            other => Err(SyncError::unexpected("exchange complete", other.name())),
        }
    }

    fn cached_format(&self, kind: ItemKind) -> SyncResult<&[ParamFormatEntry]> {
        self.format
            .as_ref()
            .filter(|format| format.kind == kind)
            .map(|format| format.entries.as_slice())
            .ok_or(SyncError::Schema(SchemaError::FormatMissing { kind }))
    }

    /// Binds the desktop listener.
    pub fn listen(&mut self) -> SyncResult<()> {
        if !self.state.can_listen() {
            return Err(SyncError::InvalidState {
                operation: "listen",
                state: self.state,
            });
        }
        let listener = bind(&self.config.listen_host, self.config.listen_port)?;
        self.listener = Some(listener);
        self.device = None;
        self.auth = None;
        self.flags = None;
        info!(port = ?self.listen_port(), "listening for device");
        self.set_state(SessionState::Listening);
        Ok(())
    }

    /// Dials the device, announces readiness and accepts its callback.
    pub fn connect(&mut self) -> SyncResult<()> {
        if self.state != SessionState::Listening {
            return Err(SyncError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }
        let stream = dial(&self.config.device_host, self.config.device_port)?;
        let outbound = self.outbound.insert(Channel::new(stream, Leg::Outbound));
        outbound.wrapped_send(&Message::Ready, self.log.as_mut())?;

        let listener = self.listener.as_ref().ok_or(SyncError::NotConnected)?;
        let (stream, peer) = accept(listener)?;
        info!(%peer, "device connected");
        self.inbound = Some(Channel::new(stream, Leg::Inbound));
        self.set_state(SessionState::Connected);
        Ok(())
    }

    /// Accepts a device-initiated session.
    ///
    /// The device connects first and announces itself; the desktop then
    /// dials back to the device port on the same host.
    pub fn accept_device(&mut self) -> SyncResult<()> {
        if self.state != SessionState::Listening {
            return Err(SyncError::InvalidState {
                operation: "accept_device",
                state: self.state,
            });
        }
        let listener = self.listener.as_ref().ok_or(SyncError::NotConnected)?;
        let (stream, peer) = accept(listener)?;
        info!(%peer, "device initiated session");
        let inbound = self.inbound.insert(Channel::new(stream, Leg::Inbound));
        match inbound.wrapped_recv(self.log.as_mut())? {
            Message::DeviceReady => {}
            other => return Err(SyncError::unexpected("device ready", other.name())),
        }

        let stream = dial(&peer.ip().to_string(), self.config.device_port)?;
        let outbound = self.outbound.insert(Channel::new(stream, Leg::Outbound));
        outbound.wrapped_send(&Message::Ready, self.log.as_mut())?;
        self.set_state(SessionState::Connected);
        Ok(())
    }

    /// Requests model, language and authentication state.
    pub fn request_device_info(&mut self) -> SyncResult<DeviceInfo> {
        self.require("request_device_info", SessionState::Connected)?;
        let info = match self.exchange(&Message::DeviceInfoRequest)? {
            Message::DeviceInfo(info) => info,
            other => return Err(SyncError::unexpected("device info", other.name())),
        };
        info!(
            model = %info.model_name(),
            language = %info.language_code(),
            auth = info.requires_auth(),
            "device info"
        );
        self.device = Some(info.clone());
        self.advance(SessionState::InfoKnown);
        Ok(info)
    }

    /// Sends the password and reads the verdict.
    ///
    /// A refusal is reported as [`AuthOutcome::Denied`], not as an error.
    pub fn authenticate(&mut self, password: &[u8]) -> SyncResult<AuthOutcome> {
        self.require("authenticate", SessionState::InfoKnown)?;
        let Self { inbound, log, .. } = self;
        let channel = inbound.as_mut().ok_or(SyncError::NotConnected)?;
        let log = log.as_mut();

        let mut request = Message::AuthRequest {
            password: password.to_vec(),
        };
        let sent = channel.wrapped_send(&request, log);
        if let Message::AuthRequest { password } = &mut request {
            password.zeroize();
        }
        sent?;

        channel.send_control(ControlKind::Request, log)?;
        let outcome = match channel.recv(log)? {
            Incoming::Message(frame) => {
                let reply = Message::from_frame(&frame)?;
                channel.send_control(ControlKind::Acknowledge, log)?;
                match reply {
                    Message::AuthNotRequired => AuthOutcome::NotRequired,
                    other => return Err(SyncError::unexpected("auth not required", other.name())),
                }
            }
            Incoming::Control(ControlKind::Abort) => {
                let reply = channel.recv_message(log)?;
                channel.send_control(ControlKind::Acknowledge, log)?;
                match reply {
                    Message::AuthDenied => AuthOutcome::Denied,
                    other => return Err(SyncError::unexpected("auth denied", other.name())),
                }
            }
            Incoming::Control(other) => {
                return Err(SyncError::unexpected("auth response", other));
            }
        };

        self.auth = Some(outcome);
        match outcome {
            AuthOutcome::NotRequired => self.advance(SessionState::Authenticated),
            AuthOutcome::Denied => warn!("device refused the password"),
        }
        Ok(outcome)
    }

    /// Requests the sync-state flags.
    pub fn request_sync_state(&mut self) -> SyncResult<SyncStateFlags> {
        self.require("request_sync_state", SessionState::InfoKnown)?;
        let needs_auth = self.device.as_ref().is_some_and(DeviceInfo::requires_auth);
        if needs_auth && self.auth != Some(AuthOutcome::NotRequired) {
            return Err(SyncError::InvalidState {
                operation: "request_sync_state",
                state: self.state,
            });
        }
        let flags = match self.exchange(&Message::SyncStateRequest { kind: self.kind })? {
            Message::SyncState { flags } => flags,
            other => return Err(SyncError::unexpected("sync state", other.name())),
        };
        info!(
            flags = flags.bits(),
            slow_sync = flags.needs_slow_sync(self.kind),
            "sync state"
        );
        self.flags = Some(flags);
        self.advance(SessionState::StateKnown);
        Ok(flags)
    }

    /// Forces a slow sync for `kind` and every category after it.
    pub fn reset_sync_state(&mut self, kind: ItemKind) -> SyncResult<SyncStateFlags> {
        self.require("reset_sync_state", SessionState::StateKnown)?;
        let mut flags = self.flags.unwrap_or_default();
        flags.reset(kind);
        self.exchange_complete(&Message::SetSyncState { flags })?;
        info!(%kind, flags = flags.bits(), "sync state reset");
        self.flags = Some(flags);
        Ok(flags)
    }

    /// Switches the category later operations act on.
    ///
    /// Drops a cached format for another category.
    pub fn select_kind(&mut self, kind: ItemKind) {
        if kind == self.kind {
            return;
        }
        self.kind = kind;
        self.format = None;
        if self.state > SessionState::StateKnown && self.state.is_connected() {
            self.set_state(SessionState::StateKnown);
        }
    }

    /// Requests and caches the parameter format for the selected category.
    pub fn obtain_param_format(&mut self) -> SyncResult<&[ParamFormatEntry]> {
        self.require("obtain_param_format", SessionState::StateKnown)?;
        if let Some(format) = &self.format {
            return Err(SchemaError::AlreadyObtained { kind: format.kind }.into());
        }
        let kind = self.kind;
        let entries = match self.exchange(&Message::ParamFormatRequest { kind })? {
            Message::ParamFormat { entries } => entries,
            other => return Err(SyncError::unexpected("param format", other.name())),
        };
        info!(%kind, fields = entries.len(), "param format");
        self.advance(SessionState::FormatKnown);
        Ok(self
            .format
            .insert(CachedFormat { kind, entries })
            .entries
            .as_slice())
    }

    /// Drops the cached parameter format.
    ///
    /// The session falls back to [`SessionState::StateKnown`]; the format
    /// must be obtained again before fetching or writing.
    pub fn reset_param_format(&mut self) {
        self.format = None;
        if matches!(
            self.state,
            SessionState::FormatKnown | SessionState::Iterating | SessionState::Done
        ) {
            self.set_state(SessionState::StateKnown);
        }
    }

    /// Requests the new, modified and deleted id lists.
    pub fn request_sync_ids(&mut self) -> SyncResult<SyncIdLists> {
        self.require("request_sync_ids", SessionState::FormatKnown)?;
        let lists = match self.exchange(&Message::SyncIdsRequest { kind: self.kind })? {
            Message::SyncIds(lists) => lists,
            other => return Err(SyncError::unexpected("sync ids", other.name())),
        };
        info!(
            new = lists.new.ids.len(),
            modified = lists.modified.ids.len(),
            deleted = lists.deleted.ids.len(),
            "sync ids"
        );
        self.advance(SessionState::Iterating);
        Ok(lists)
    }

    /// Requests the raw values of one item.
    pub fn fetch_param_values(&mut self, sync_id: u32) -> SyncResult<Vec<ParamValue>> {
        self.require("fetch_param_values", SessionState::FormatKnown)?;
        let request = Message::ItemRequest {
            kind: self.kind,
            sync_id,
        };
        let values = match self.exchange(&request)? {
            Message::ItemData { values } => values,
            other => return Err(SyncError::unexpected("item data", other.name())),
        };
        self.advance(SessionState::Iterating);
        Ok(values)
    }

    /// Requests one item and decodes it with the cached format.
    pub fn fetch_item(&mut self, sync_id: u32) -> SyncResult<Item> {
        self.cached_format(self.kind)?;
        let values = self.fetch_param_values(sync_id)?;
        let format = self.cached_format(self.kind)?;
        Ok(decode_item(format, &values, self.kind)?)
    }

    /// Sends an item write and returns the sync id the device reports.
    pub fn write_item(&mut self, write: ItemWrite) -> SyncResult<u32> {
        self.require("write_item", SessionState::FormatKnown)?;
        match self.exchange(&Message::ItemWrite(write))? {
            Message::ItemWritten { sync_id } => Ok(sync_id),
            other => Err(SyncError::unexpected("item written", other.name())),
        }
    }

    /// Creates a new item on the device.
    pub fn insert_item(&mut self, item: &Item) -> SyncResult<u32> {
        self.require("insert_item", SessionState::FormatKnown)?;
        let kind = item.kind();
        let values = encode_item(self.cached_format(kind)?, item)?;
        self.write_item(ItemWrite::Insert { kind, values })
    }

    /// Replaces an existing item on the device.
    pub fn update_item(&mut self, sync_id: u32, item: &Item) -> SyncResult<u32> {
        self.require("update_item", SessionState::FormatKnown)?;
        let kind = item.kind();
        let values = encode_item(self.cached_format(kind)?, item)?;
        self.write_item(ItemWrite::Update {
            kind,
            sync_id,
            values,
        })
    }

    /// Deletes items of the selected category.
    pub fn delete_items(&mut self, ids: &[u32]) -> SyncResult<()> {
        self.require("delete_items", SessionState::FormatKnown)?;
        self.exchange_complete(&Message::DeleteItems {
            kind: self.kind,
            ids: ids.to_vec(),
        })
    }

    /// Tells the device the selected category is synchronized.
    pub fn mark_done(&mut self) -> SyncResult<()> {
        self.require("mark_done", SessionState::FormatKnown)?;
        let kind = self.kind;
        self.exchange_complete(&Message::SyncDone { kind })?;
        if let Some(flags) = self.flags.as_mut() {
            flags.mark_synced(kind);
        }
        self.set_state(SessionState::Done);
        Ok(())
    }

    /// Reads the device clock.
    pub fn request_time(&mut self) -> SyncResult<DeviceTime> {
        self.require("request_time", SessionState::Connected)?;
        match self.exchange(&Message::TimeRequest)? {
            Message::DeviceTime { time } => Ok(time),
            other => Err(SyncError::unexpected("device time", other.name())),
        }
    }

    /// Sets the device clock.
    pub fn set_time(&mut self, time: DeviceTime) -> SyncResult<()> {
        self.require("set_time", SessionState::Connected)?;
        self.exchange_complete(&Message::SetTime { time })
    }

    /// Reads the device storage path.
    pub fn request_storage_path(&mut self) -> SyncResult<String> {
        self.require("request_storage_path", SessionState::Connected)?;
        match self.exchange(&Message::StoragePathRequest)? {
            Message::StoragePath { path } => Ok(String::from_utf8_lossy(&path).into_owned()),
            other => Err(SyncError::unexpected("storage path", other.name())),
        }
    }

    /// Ends the session on both legs.
    pub fn terminate(&mut self) -> SyncResult<()> {
        self.require("terminate", SessionState::Connected)?;
        self.exchange_complete(&Message::Terminate)?;

        let mut outbound = self.outbound.take().ok_or(SyncError::NotConnected)?;
        let result = outbound.wrapped_send(&Message::Ready, self.log.as_mut());
        outbound.close();
        result?;
        self.set_state(SessionState::Disconnected);
        Ok(())
    }

    /// Closes every socket and drops cached state. Safe to call repeatedly.
    pub fn finalize(&mut self) {
        if let Some(channel) = self.inbound.take() {
            channel.close();
        }
        if let Some(channel) = self.outbound.take() {
            channel.close();
        }
        self.listener = None;
        self.format = None;
        if self.state != SessionState::Idle {
            self.set_state(SessionState::Disconnected);
        }
    }

    /// Listens if needed, connects, authenticates and reads sync state.
    ///
    /// Stops after authentication if the device refuses the password.
    pub fn initiate_sync(&mut self) -> SyncResult<AuthOutcome> {
        if self.state.can_listen() {
            self.listen()?;
        }
        self.connect()?;
        let info = self.request_device_info()?;

        let password = self.config.password.clone();
        let outcome = match password {
            Some(password) => self.authenticate(&password)?,
            None if info.requires_auth() => self.authenticate(&[])?,
            None => AuthOutcome::NotRequired,
        };
        if outcome == AuthOutcome::Denied {
            return Ok(outcome);
        }

        self.request_sync_state()?;
        Ok(outcome)
    }

    /// Fetches every new and modified item of the selected category.
    pub fn pull_changes(&mut self) -> SyncResult<PullReport> {
        self.require("pull_changes", SessionState::StateKnown)?;
        if self.param_format().is_none() {
            self.obtain_param_format()?;
        }
        let ids = self.request_sync_ids()?;

        let mut items = Vec::new();
        for sync_id in ids.changed() {
            items.push(self.fetch_item(sync_id)?);
        }

        let kind = self.kind;
        let slow_sync = self.flags.map_or(true, |flags| flags.needs_slow_sync(kind));
        info!(%kind, items = items.len(), deleted = ids.deleted.ids.len(), "pulled changes");
        Ok(PullReport {
            kind,
            slow_sync,
            ids,
            items,
        })
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("state", &self.state)
            .field("kind", &self.kind)
            .field("device", &self.device)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
