//! TCP legs and wrapped exchanges.
//!
//! A session uses two TCP connections. The outbound leg is dialled by the
//! desktop to the device; the inbound leg is the device's callback to the
//! desktop listener. Every message on either leg travels inside a wrapped
//! exchange:
//!
//! ```text
//! send:    <- REQ    -> message    <- ACK
//! receive: -> REQ    <- message    -> ACK
//! ```

use crate::error::{SyncError, SyncResult};
use crate::log::{Direction, MessageLog};
use handsync_codec::{
    read_incoming, write_control, write_frame, ControlKind, Incoming, TransportError,
};
use handsync_protocol::Message;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use tracing::{debug, warn};

/// Binds the desktop listener.
pub fn bind(host: &str, port: u16) -> Result<TcpListener, TransportError> {
    TcpListener::bind((host, port)).map_err(|source| TransportError::Bind {
        addr: format!("{host}:{port}"),
        source,
    })
}

/// Dials a peer.
pub fn dial(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let stream = TcpStream::connect((host, port)).map_err(|source| TransportError::Connect {
        addr: format!("{host}:{port}"),
        source,
    })?;
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::io("set_nodelay", e))?;
    Ok(stream)
}

/// Accepts one connection on the listener.
pub fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), TransportError> {
    let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::io("set_nodelay", e))?;
    Ok((stream, peer))
}

/// Which TCP connection a channel runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Device connected to the desktop listener.
    Inbound,
    /// Desktop dialled the device.
    Outbound,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        })
    }
}

/// A stream that can be shut down.
pub trait Closeable {
    /// Shuts the stream down in both directions.
    fn close(&mut self) -> io::Result<()>;
}

impl Closeable for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// One leg of the session, speaking wrapped exchanges.
pub struct Channel<S> {
    stream: S,
    leg: Leg,
}

impl<S: Read + Write> Channel<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S, leg: Leg) -> Self {
        Self { stream, leg }
    }

    /// Which leg this is.
    pub fn leg(&self) -> Leg {
        self.leg
    }

    /// Borrows the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Sends a control frame.
    pub fn send_control(&mut self, kind: ControlKind, log: &mut dyn MessageLog) -> SyncResult<()> {
        debug!(leg = %self.leg, control = %kind, "send");
        note(log.control(Direction::Sent, kind));
        write_control(&mut self.stream, kind)?;
        Ok(())
    }

    /// Sends a general message without wrapping.
    pub fn send_message(&mut self, message: &Message, log: &mut dyn MessageLog) -> SyncResult<()> {
        let frame = message.to_frame()?;
        debug!(leg = %self.leg, tag = %frame.tag(), len = frame.cont_size(), "send");
        note(log.dump(Direction::Sent, &frame));
        write_frame(&mut self.stream, &frame)?;
        Ok(())
    }

    /// Reads whatever arrives next.
    pub fn recv(&mut self, log: &mut dyn MessageLog) -> SyncResult<Incoming> {
        let incoming = read_incoming(&mut self.stream)?;
        match &incoming {
            Incoming::Control(kind) => {
                debug!(leg = %self.leg, control = %kind, "recv");
                note(log.control(Direction::Received, *kind));
            }
            Incoming::Message(frame) => {
                debug!(leg = %self.leg, tag = %frame.tag(), len = frame.cont_size(), "recv");
                note(log.dump(Direction::Received, frame));
            }
        }
        Ok(incoming)
    }

    /// Reads a control frame and checks its kind.
    pub fn expect_control(
        &mut self,
        expected: ControlKind,
        log: &mut dyn MessageLog,
    ) -> SyncResult<()> {
        match self.recv(log)? {
            Incoming::Control(kind) if kind == expected => Ok(()),
            other => Err(SyncError::UnexpectedControl {
                expected,
                actual: other.describe(),
            }),
        }
    }

    /// Reads a general message and decodes it.
    pub fn recv_message(&mut self, log: &mut dyn MessageLog) -> SyncResult<Message> {
        match self.recv(log)? {
            Incoming::Message(frame) => Ok(Message::from_frame(&frame)?),
            Incoming::Control(kind) => Err(SyncError::unexpected("message", kind)),
        }
    }

    /// Sends `message` inside a wrapped exchange.
    pub fn wrapped_send(&mut self, message: &Message, log: &mut dyn MessageLog) -> SyncResult<()> {
        self.expect_control(ControlKind::Request, log)?;
        self.send_message(message, log)?;
        self.expect_control(ControlKind::Acknowledge, log)
    }

    /// Receives one message inside a wrapped exchange.
    pub fn wrapped_recv(&mut self, log: &mut dyn MessageLog) -> SyncResult<Message> {
        self.send_control(ControlKind::Request, log)?;
        let message = self.recv_message(log)?;
        self.send_control(ControlKind::Acknowledge, log)?;
        Ok(message)
    }
}

impl<S: Closeable> Channel<S> {
    /// Shuts the stream down. Errors are logged, not returned.
    pub fn close(mut self) {
        if let Err(e) = self.stream.close() {
            if e.kind() != io::ErrorKind::NotConnected {
                warn!(leg = %self.leg, error = %e, "shutdown failed");
            }
        }
    }
}

impl<S> fmt::Debug for Channel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("leg", &self.leg).finish()
    }
}

fn note(result: io::Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "message log write failed");
    }
}

/// An in-memory stream for testing.
///
/// Reads are served from a scripted byte buffer; writes are captured.
#[derive(Debug, Default)]
pub struct MockStream {
    input: io::Cursor<Vec<u8>>,
    output: Vec<u8>,
    closed: bool,
}

impl MockStream {
    /// Creates a stream that will yield `input` to readers.
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: io::Cursor::new(input),
            output: Vec::new(),
            closed: false,
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.output
    }

    /// Returns true once the stream was closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Closeable for MockStream {
    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NullLog;
    use handsync_protocol::{ItemKind, SyncStateFlags};

    fn script(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    fn frame_bytes(message: &Message) -> Vec<u8> {
        message.to_frame().unwrap().to_bytes().unwrap()
    }

    #[test]
    fn wrapped_send_writes_message_between_controls() {
        let input = script(&[
            &ControlKind::Request.frame(),
            &ControlKind::Acknowledge.frame(),
        ]);
        let mut channel = Channel::new(MockStream::new(input), Leg::Outbound);
        channel.wrapped_send(&Message::Ready, &mut NullLog).unwrap();
        assert_eq!(channel.get_ref().written(), frame_bytes(&Message::Ready));
    }

    #[test]
    fn wrapped_recv_brackets_with_request_and_ack() {
        let reply = Message::SyncState {
            flags: SyncStateFlags::from_bits(0x01),
        };
        let mut channel = Channel::new(MockStream::new(frame_bytes(&reply)), Leg::Inbound);
        let got = channel.wrapped_recv(&mut NullLog).unwrap();
        assert_eq!(got, reply);
        assert_eq!(
            channel.get_ref().written(),
            script(&[
                &ControlKind::Request.frame(),
                &ControlKind::Acknowledge.frame()
            ])
        );
    }

    #[test]
    fn wrong_control_is_reported() {
        let input = ControlKind::Abort.frame().to_vec();
        let mut channel = Channel::new(MockStream::new(input), Leg::Inbound);
        let err = channel
            .wrapped_send(
                &Message::SyncDone {
                    kind: ItemKind::Todo,
                },
                &mut NullLog,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnexpectedControl {
                expected: ControlKind::Request,
                ..
            }
        ));
    }

    #[test]
    fn message_instead_of_control() {
        let input = frame_bytes(&Message::ExchangeComplete);
        let mut channel = Channel::new(MockStream::new(input), Leg::Inbound);
        let err = channel
            .expect_control(ControlKind::Request, &mut NullLog)
            .unwrap_err();
        match err {
            SyncError::UnexpectedControl { actual, .. } => assert_eq!(actual, "AEX"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn control_instead_of_message() {
        let input = ControlKind::Acknowledge.frame().to_vec();
        let mut channel = Channel::new(MockStream::new(input), Leg::Inbound);
        let err = channel.wrapped_recv(&mut NullLog).unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedMessage { expected: "message", .. }));
    }

    #[test]
    fn eof_is_a_transport_error() {
        let mut channel = Channel::new(MockStream::new(Vec::new()), Leg::Inbound);
        let err = channel.wrapped_recv(&mut NullLog).unwrap_err();
        assert!(err.is_peer_closed());
        assert!(err.is_fatal());
    }

    #[test]
    fn close_shuts_the_stream() {
        let mut stream = MockStream::new(Vec::new());
        stream.close().unwrap();
        assert!(stream.is_closed());
        assert!(stream.write(&[1]).is_err());
    }

    #[test]
    fn bind_failure_names_the_address() {
        let listener = bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let err = bind("127.0.0.1", port).unwrap_err();
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }

    #[test]
    fn dial_and_accept_over_loopback() {
        let listener = bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = std::thread::spawn(move || dial("127.0.0.1", port).map(|_| ()));
        let (_stream, peer) = accept(&listener).unwrap();
        assert!(peer.ip().is_loopback());
        client.join().unwrap().unwrap();
    }
}
