//! A scripted handheld device.
//!
//! [`MockDevice`] plays the device side of both TCP legs on loopback. It
//! answers desktop requests from a [`DeviceData`] model and records every
//! request it saw, so tests can assert on the conversation afterwards.
//!
//! ```text
//! desktop                          device
//!   dial ------------------------>  ready leg      (RAY)
//!   listener <--------------------  dial back      (requests / replies)
//!   ...
//!   RQT -> AEX                      callback leg
//!   RAY ------------------------->  ready leg, then both close
//! ```

use handsync_codec::{
    read_incoming, write_control, write_frame, CodecError, ControlKind, Incoming,
    TransportError, WireError,
};
use handsync_protocol::{
    DeviceInfo, DeviceTime, ItemKind, ItemWrite, Message, ParamFormatEntry, ParamValue,
    SyncIdLists, SyncStateFlags,
};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Failures on the device side of a scripted session.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Socket setup failed.
    #[error("device socket error: {0}")]
    Io(#[from] io::Error),

    /// A frame could not be read or written.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The desktop sent something out of order.
    #[error("device expected {expected}, got {actual}")]
    Unexpected {
        /// What the device was waiting for.
        expected: String,
        /// What arrived instead.
        actual: String,
    },
}

impl From<TransportError> for DeviceError {
    fn from(e: TransportError) -> Self {
        Self::Wire(e.into())
    }
}

impl From<CodecError> for DeviceError {
    fn from(e: CodecError) -> Self {
        Self::Wire(e.into())
    }
}

impl DeviceError {
    fn unexpected(expected: impl ToString, actual: impl ToString) -> Self {
        Self::Unexpected {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Returns true if the socket failed rather than the conversation.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Wire(WireError::Transport(_)))
    }
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// One leg seen from the device, speaking the mirror image of the
/// desktop's wrapped exchanges.
#[derive(Debug)]
pub struct DeviceLink {
    stream: TcpStream,
}

impl DeviceLink {
    /// Wraps a connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Sends a control frame.
    pub fn send_control(&mut self, kind: ControlKind) -> DeviceResult<()> {
        write_control(&mut self.stream, kind)?;
        Ok(())
    }

    /// Sends a message without wrapping.
    pub fn send_message(&mut self, message: &Message) -> DeviceResult<()> {
        let frame = message.to_frame()?;
        write_frame(&mut self.stream, &frame)?;
        Ok(())
    }

    /// Reads whatever arrives next.
    pub fn recv(&mut self) -> DeviceResult<Incoming> {
        Ok(read_incoming(&mut self.stream)?)
    }

    /// Reads a control frame and checks its kind.
    pub fn expect_control(&mut self, expected: ControlKind) -> DeviceResult<()> {
        match self.recv()? {
            Incoming::Control(kind) if kind == expected => Ok(()),
            other => Err(DeviceError::unexpected(expected, other.describe())),
        }
    }

    /// Reads and decodes a general message.
    pub fn recv_message(&mut self) -> DeviceResult<Message> {
        match self.recv()? {
            Incoming::Message(frame) => Ok(Message::from_frame(&frame)?),
            Incoming::Control(kind) => Err(DeviceError::unexpected("message", kind)),
        }
    }

    /// Receives one desktop message: `-> REQ  <- message  -> ACK`.
    pub fn expect_request(&mut self) -> DeviceResult<Message> {
        self.send_control(ControlKind::Request)?;
        let message = self.recv_message()?;
        self.send_control(ControlKind::Acknowledge)?;
        Ok(message)
    }

    /// Sends one reply: `<- REQ  -> message  <- ACK`.
    pub fn reply(&mut self, message: &Message) -> DeviceResult<()> {
        self.expect_control(ControlKind::Request)?;
        self.send_message(message)?;
        self.expect_control(ControlKind::Acknowledge)
    }

    /// Refuses a password: `<- REQ  -> ABORT  -> ANG  <- ACK`.
    pub fn deny(&mut self) -> DeviceResult<()> {
        self.expect_control(ControlKind::Request)?;
        self.send_control(ControlKind::Abort)?;
        self.send_message(&Message::AuthDenied)?;
        self.expect_control(ControlKind::Acknowledge)
    }

    /// Reads the desktop's ready announcement.
    pub fn expect_ready(&mut self) -> DeviceResult<()> {
        match self.expect_request()? {
            Message::Ready => Ok(()),
            other => Err(DeviceError::unexpected("RAY", other.tag())),
        }
    }

    /// Shuts the stream down.
    pub fn close(self) {
        // the desktop may already be gone
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Items and formats the device holds for one category.
#[derive(Debug, Clone, Default)]
pub struct Category {
    /// Advertised parameter format.
    pub format: Vec<ParamFormatEntry>,
    /// Stored items by sync id, values in format order.
    pub items: BTreeMap<u32, Vec<ParamValue>>,
    /// Id lists reported on enumeration.
    pub ids: SyncIdLists,
}

/// How the device answers one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A wrapped reply message.
    Message(Message),
    /// Refusal: a wrong password, or a request made before a right one.
    Deny,
}

/// The device model a [`MockDevice`] serves from.
#[derive(Debug, Clone)]
pub struct DeviceData {
    /// Reported identity.
    pub info: DeviceInfo,
    /// Accepted password; `None` accepts anything.
    pub password: Option<Vec<u8>>,
    /// Sync-state flags.
    pub flags: SyncStateFlags,
    /// Device clock.
    pub time: DeviceTime,
    /// Storage path bytes.
    pub storage_path: Vec<u8>,
    /// Per-category data.
    pub categories: HashMap<ItemKind, Category>,
    /// Every request received, in order.
    pub requests: Vec<Message>,
    /// False while a password is required and not yet given.
    pub unlocked: bool,
    next_sync_id: u32,
}

impl DeviceData {
    /// First sync id handed out for inserted items.
    pub const FIRST_INSERTED_ID: u32 = 1000;

    /// Creates a device with no items.
    pub fn new(info: DeviceInfo, time: DeviceTime) -> Self {
        Self {
            info,
            password: None,
            flags: SyncStateFlags::default(),
            time,
            storage_path: Vec::new(),
            categories: HashMap::new(),
            requests: Vec::new(),
            unlocked: true,
            next_sync_id: Self::FIRST_INSERTED_ID,
        }
    }

    /// Requires `password`; marks the device as wanting authentication.
    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = Some(password.into());
        self.info.auth_state = 1;
        self.unlocked = false;
        self
    }

    /// Sets the sync-state flags.
    pub fn with_flags(mut self, flags: SyncStateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the storage path.
    pub fn with_storage_path(mut self, path: impl Into<Vec<u8>>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Sets the parameter format for a category.
    pub fn with_format(mut self, kind: ItemKind, format: Vec<ParamFormatEntry>) -> Self {
        self.category_mut(kind).format = format;
        self
    }

    /// Stores an item and lists it as new.
    pub fn with_new_item(mut self, kind: ItemKind, sync_id: u32, values: Vec<ParamValue>) -> Self {
        let category = self.category_mut(kind);
        category.items.insert(sync_id, values);
        category.ids.new.ids.push(sync_id);
        self
    }

    /// Stores an item and lists it as modified.
    pub fn with_modified_item(
        mut self,
        kind: ItemKind,
        sync_id: u32,
        values: Vec<ParamValue>,
    ) -> Self {
        let category = self.category_mut(kind);
        category.items.insert(sync_id, values);
        category.ids.modified.ids.push(sync_id);
        self
    }

    /// Lists an id as deleted.
    pub fn with_deleted_id(mut self, kind: ItemKind, sync_id: u32) -> Self {
        self.category_mut(kind).ids.deleted.ids.push(sync_id);
        self
    }

    /// Data for one category.
    pub fn category(&self, kind: ItemKind) -> Option<&Category> {
        self.categories.get(&kind)
    }

    fn category_mut(&mut self, kind: ItemKind) -> &mut Category {
        self.categories.entry(kind).or_default()
    }

    /// Tags of every request received, as text.
    pub fn request_tags(&self) -> Vec<String> {
        self.requests.iter().map(|m| m.tag().to_string()).collect()
    }

    /// Records a request and works out the answer.
    ///
    /// A locked device only answers device info, auth and terminate.
    pub fn respond(&mut self, request: &Message) -> DeviceResult<Reply> {
        self.requests.push(request.clone());
        let open = matches!(
            request,
            Message::DeviceInfoRequest | Message::AuthRequest { .. } | Message::Terminate
        );
        if !self.unlocked && !open {
            return Ok(Reply::Deny);
        }
        let reply = match request {
            Message::DeviceInfoRequest => Message::DeviceInfo(self.info.clone()),
            Message::AuthRequest { password } => match &self.password {
                Some(expected) if expected != password => return Ok(Reply::Deny),
                _ => {
                    self.unlocked = true;
                    Message::AuthNotRequired
                }
            },
            Message::TimeRequest => Message::DeviceTime { time: self.time },
            Message::SetTime { time } => {
                self.time = *time;
                Message::ExchangeComplete
            }
            Message::StoragePathRequest => Message::StoragePath {
                path: self.storage_path.clone(),
            },
            Message::SyncStateRequest { .. } => Message::SyncState { flags: self.flags },
            Message::SetSyncState { flags } => {
                self.flags = *flags;
                Message::ExchangeComplete
            }
            Message::ParamFormatRequest { kind } => Message::ParamFormat {
                entries: self.category_mut(*kind).format.clone(),
            },
            Message::SyncIdsRequest { kind } => {
                Message::SyncIds(self.category_mut(*kind).ids.clone())
            }
            Message::ItemRequest { kind, sync_id } => Message::ItemData {
                values: self
                    .category_mut(*kind)
                    .items
                    .get(sync_id)
                    .cloned()
                    .unwrap_or_default(),
            },
            Message::DeleteItems { kind, ids } => {
                let category = self.category_mut(*kind);
                for id in ids {
                    category.items.remove(id);
                }
                Message::ExchangeComplete
            }
            Message::ItemWrite(write) => {
                let sync_id = match write {
                    ItemWrite::Insert { .. } => {
                        let id = self.next_sync_id;
                        self.next_sync_id += 1;
                        id
                    }
                    ItemWrite::Update { sync_id, .. }
                    | ItemWrite::FlaggedUpdate { sync_id, .. } => *sync_id,
                };
                self.category_mut(write.kind())
                    .items
                    .insert(sync_id, write.values().to_vec());
                Message::ItemWritten { sync_id }
            }
            Message::SyncDone { kind } => {
                self.flags.mark_synced(*kind);
                Message::ExchangeComplete
            }
            Message::Terminate => Message::ExchangeComplete,
            other => return Err(DeviceError::unexpected("desktop request", other.tag())),
        };
        Ok(Reply::Message(reply))
    }
}

/// A device bound to an ephemeral loopback port.
#[derive(Debug)]
pub struct MockDevice {
    listener: TcpListener,
}

impl MockDevice {
    /// Binds the device listener on `127.0.0.1:0`.
    pub fn bind() -> DeviceResult<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0")?,
        })
    }

    /// Port the desktop should dial.
    pub fn port(&self) -> DeviceResult<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Serves a desktop-initiated session on a background thread.
    ///
    /// The thread accepts the desktop's dial, reads its ready message,
    /// connects back to `desktop_port` and answers requests until the
    /// session terminates or the desktop goes away. It returns the device
    /// model with every request recorded.
    pub fn spawn(self, desktop_port: u16, data: DeviceData) -> JoinHandle<DeviceResult<DeviceData>> {
        thread::spawn(move || {
            let (stream, _) = self.listener.accept()?;
            let mut ready = DeviceLink::new(stream);
            ready.expect_ready()?;
            let callback = DeviceLink::new(TcpStream::connect(loopback(desktop_port))?);
            serve(ready, callback, data)
        })
    }

    /// Serves a device-initiated session on a background thread.
    ///
    /// The device connects to `desktop_port` first and announces itself,
    /// then waits for the desktop to dial back.
    pub fn spawn_initiating(
        self,
        desktop_port: u16,
        data: DeviceData,
    ) -> JoinHandle<DeviceResult<DeviceData>> {
        thread::spawn(move || {
            let mut callback = DeviceLink::new(TcpStream::connect(loopback(desktop_port))?);
            callback.reply(&Message::DeviceReady)?;
            let (stream, _) = self.listener.accept()?;
            let mut ready = DeviceLink::new(stream);
            ready.expect_ready()?;
            serve(ready, callback, data)
        })
    }
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Answers requests on the callback leg until terminate or disconnect.
fn serve(
    mut ready: DeviceLink,
    mut callback: DeviceLink,
    mut data: DeviceData,
) -> DeviceResult<DeviceData> {
    loop {
        let request = match callback.expect_request() {
            Ok(request) => request,
            // the desktop finalized without terminating
            Err(e) if e.is_transport() => break,
            Err(e) => return Err(e),
        };
        match data.respond(&request)? {
            Reply::Message(reply) => callback.reply(&reply)?,
            Reply::Deny => callback.deny()?,
        }
        if request == Message::Terminate {
            ready.expect_ready()?;
            break;
        }
    }
    ready.close();
    callback.close();
    Ok(data)
}
