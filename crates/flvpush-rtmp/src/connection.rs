//! Publishing connection.
//!
//! [`Connection`] is the seam between the pump and the network: the pump
//! only asks whether the peer is still there and hands over packets.
//! [`RtmpConnection`] is the blocking TCP implementation.

use bytes::BytesMut;
use flvpush_common::amf::AmfValue;
use flvpush_common::{HeaderClass, TransmissionPacket};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::address::RtmpUrl;
use crate::chunk::{ChunkReader, ChunkWriter, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::handshake;
use crate::message::{self, Command, Message};
use crate::{Error, Result};

/// An established publishing session.
pub trait Connection {
    /// Whether the peer is still reachable. May process pending control
    /// traffic from the peer.
    fn is_connected(&mut self) -> bool;

    /// Transmit one media packet.
    fn send(&mut self, packet: &TransmissionPacket) -> Result<()>;

    /// Message stream id assigned by the server.
    fn stream_id(&self) -> u32;
}

/// Options for [`RtmpConnection::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Applies to the TCP connect and to every blocking read or write.
    pub timeout: Duration,
    /// Outgoing chunk size announced after the handshake.
    pub chunk_size: u32,
    /// `flashVer` sent in the connect command.
    pub flash_ver: String,
    /// Window acknowledgement size announced to the server.
    pub window_ack_size: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            chunk_size: 4096,
            flash_ver: concat!("FMLE/3.0 (compatible; flvpush/", env!("CARGO_PKG_VERSION"), ")")
                .to_string(),
            window_ack_size: 2_500_000,
        }
    }
}

/// Blocking RTMP publisher over TCP.
pub struct RtmpConnection {
    stream: TcpStream,
    url: RtmpUrl,
    reader: ChunkReader,
    writer: ChunkWriter,
    scratch: BytesMut,
    pending: Vec<u8>,
    stream_id: u32,
    next_transaction: f64,
    peer_window: u32,
    last_ack: u64,
    connected: bool,
    publishing: bool,
}

impl RtmpConnection {
    /// Connect, handshake and start publishing to `address`.
    pub fn connect(address: &str, options: &ConnectOptions) -> Result<Self> {
        let url = RtmpUrl::parse(address)?;
        let authority = url.authority();

        let stream = open_socket(&authority, options.timeout)?;
        tracing::debug!(addr = %authority, "TCP connected");

        let mut conn = Self {
            stream,
            url,
            reader: ChunkReader::new(),
            writer: ChunkWriter::new(),
            scratch: BytesMut::with_capacity(8 * 1024),
            pending: Vec::new(),
            stream_id: 0,
            next_transaction: 1.0,
            peer_window: 0,
            last_ack: 0,
            connected: true,
            publishing: false,
        };

        handshake::perform(&mut conn.stream)?;
        conn.start_session(options)?;
        Ok(conn)
    }

    pub fn url(&self) -> &RtmpUrl {
        &self.url
    }

    /// Stop publishing and close the socket. Errors are ignored; the peer
    /// may already be gone.
    pub fn close(&mut self) {
        if self.publishing && self.connected {
            let stream_name = self.url.stream.clone();
            let unpublish = Command::new(
                "FCUnpublish",
                self.take_transaction(),
                vec![AmfValue::Null, AmfValue::String(stream_name)],
            );
            let delete = Command::new(
                "deleteStream",
                self.take_transaction(),
                vec![AmfValue::Null, AmfValue::Number(self.stream_id as f64)],
            );
            let _ = self.write_message(&unpublish.into_message(0));
            let _ = self.write_message(&delete.into_message(0));
        }
        self.publishing = false;

        if self.connected {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.connected = false;
            tracing::info!(url = %self.url, "connection closed");
        }
    }

    fn start_session(&mut self, options: &ConnectOptions) -> Result<()> {
        let chunk_size = options.chunk_size.clamp(DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self.write_message(&Message::set_chunk_size(chunk_size))?;
        self.writer.set_chunk_size(chunk_size);

        let connect = Command::new(
            "connect",
            self.take_transaction(),
            vec![AmfValue::object([
                ("app", AmfValue::string(self.url.app.clone())),
                ("type", AmfValue::string("nonprivate")),
                ("flashVer", AmfValue::string(options.flash_ver.clone())),
                ("tcUrl", AmfValue::string(self.url.tc_url())),
            ])],
        );
        let txn = connect.transaction_id;
        self.write_message(&connect.into_message(0))?;
        self.wait_for_result("connect", txn)?;
        tracing::debug!(app = %self.url.app, "NetConnection established");

        self.write_message(&Message::window_ack_size(options.window_ack_size))?;

        let stream_name = self.url.stream.clone();
        for name in ["releaseStream", "FCPublish"] {
            let cmd = Command::new(
                name,
                self.take_transaction(),
                vec![AmfValue::Null, AmfValue::String(stream_name.clone())],
            );
            self.write_message(&cmd.into_message(0))?;
        }

        let create = Command::new("createStream", self.take_transaction(), vec![AmfValue::Null]);
        let txn = create.transaction_id;
        self.write_message(&create.into_message(0))?;
        let result = self.wait_for_result("createStream", txn)?;
        self.stream_id = result
            .args
            .iter()
            .filter_map(AmfValue::as_number)
            .next()
            .ok_or_else(|| Error::protocol("createStream result without a stream id"))?
            as u32;

        let publish = Command::new(
            "publish",
            self.take_transaction(),
            vec![
                AmfValue::Null,
                AmfValue::String(stream_name),
                AmfValue::string("live"),
            ],
        );
        self.write_message(&publish.into_message(self.stream_id))?;
        self.wait_for_publish_start()?;
        self.publishing = true;

        tracing::info!(url = %self.url, stream_id = self.stream_id, "publishing");
        Ok(())
    }

    fn take_transaction(&mut self) -> f64 {
        let txn = self.next_transaction;
        self.next_transaction += 1.0;
        txn
    }

    fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.scratch.clear();
        self.writer.encode(msg, HeaderClass::Large, &mut self.scratch);
        self.write_scratch()
    }

    fn write_scratch(&mut self) -> Result<()> {
        if let Err(e) = self.stream.write_all(&self.scratch) {
            self.connected = false;
            return Err(Error::Io(e));
        }
        Ok(())
    }

    fn read_message(&mut self, waiting_for: &str) -> Result<Message> {
        let mut pending = io::Cursor::new(std::mem::take(&mut self.pending));
        let result = {
            let mut src = (&mut pending).chain(&mut self.stream);
            self.reader.read_message(&mut src)
        };
        let pos = pending.position() as usize;
        let mut rest = pending.into_inner();
        rest.drain(..pos.min(rest.len()));
        self.pending = rest;

        result.map_err(|e| match e {
            Error::Io(err) if is_timeout(&err) => Error::Timeout(waiting_for.to_string()),
            Error::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                self.connected = false;
                Error::Disconnected
            }
            other => other,
        })
    }

    /// Handle protocol control traffic. Returns the command when the
    /// message is one.
    fn handle_message(&mut self, msg: Message) -> Result<Option<Command>> {
        match msg.type_id {
            message::SET_CHUNK_SIZE => {
                let size = msg.control_value()?;
                self.reader.set_chunk_size(size)?;
                tracing::debug!(size, "peer chunk size");
            }
            message::ABORT => self.reader.abort(msg.control_value()?),
            message::ACKNOWLEDGEMENT => {}
            message::WINDOW_ACK_SIZE => {
                self.peer_window = msg.control_value()?;
                tracing::debug!(window = self.peer_window, "peer window ack size");
            }
            message::SET_PEER_BANDWIDTH => {
                let size = msg.control_value()?;
                self.write_message(&Message::window_ack_size(size))?;
            }
            message::USER_CONTROL => {
                let (event, value) = msg.user_control()?;
                match event {
                    message::EVENT_PING_REQUEST => {
                        self.write_message(&Message::ping_response(value))?;
                    }
                    message::EVENT_STREAM_BEGIN => {
                        tracing::trace!(stream_id = value, "stream begin");
                    }
                    _ => tracing::trace!(event, value, "user control event"),
                }
            }
            message::COMMAND_AMF0 => return Ok(Some(Command::parse(&msg.payload)?)),
            other => tracing::trace!(type_id = other, "ignoring message"),
        }

        if self.peer_window > 0 {
            let read = self.reader.bytes_read();
            if read - self.last_ack >= self.peer_window as u64 {
                self.last_ack = read;
                self.write_message(&Message::acknowledgement(read as u32))?;
            }
        }

        Ok(None)
    }

    fn wait_for_result(&mut self, command: &str, txn: f64) -> Result<Command> {
        loop {
            let msg = self.read_message(command)?;
            let Some(cmd) = self.handle_message(msg)? else {
                continue;
            };

            if cmd.transaction_id != txn {
                tracing::debug!(name = %cmd.name, "ignoring unrelated command");
                continue;
            }
            match cmd.name.as_str() {
                "_result" => return Ok(cmd),
                "_error" => {
                    return Err(Error::Rejected {
                        command: command.to_string(),
                        description: cmd.status_description(),
                    })
                }
                other => tracing::debug!(name = other, "unexpected reply"),
            }
        }
    }

    fn wait_for_publish_start(&mut self) -> Result<()> {
        loop {
            let msg = self.read_message("publish")?;
            let Some(cmd) = self.handle_message(msg)? else {
                continue;
            };
            if cmd.name != "onStatus" {
                tracing::debug!(name = %cmd.name, "ignoring command while publishing");
                continue;
            }

            match (cmd.status_level(), cmd.status_code()) {
                (_, Some("NetStream.Publish.Start")) => return Ok(()),
                (Some("error"), _) => {
                    return Err(Error::Rejected {
                        command: "publish".to_string(),
                        description: cmd.status_description(),
                    })
                }
                (_, code) => tracing::debug!(?code, "onStatus"),
            }
        }
    }

    /// Drain whatever the peer has sent without blocking. Returns false
    /// once the peer has closed the connection. Never waits for the rest of
    /// a partially received message.
    fn poll_peer(&mut self) -> bool {
        if self.stream.set_nonblocking(true).is_err() {
            return false;
        }

        let mut buf = [0u8; 4096];
        let alive = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break false,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break true,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("peer read failed: {}", e);
                    break false;
                }
            }
        };

        if self.stream.set_nonblocking(false).is_err() {
            return false;
        }
        if !alive {
            return false;
        }

        loop {
            let msg = match self.reader.decode_buffered(&self.pending) {
                Ok(Some((msg, used))) => {
                    self.pending.drain(..used);
                    msg
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("failed to decode peer message: {}", e);
                    return false;
                }
            };
            match self.handle_message(msg) {
                Ok(Some(cmd)) => {
                    if cmd.name == "onStatus" && cmd.status_level() == Some("error") {
                        tracing::warn!(code = ?cmd.status_code(), "{}", cmd.status_description());
                        return false;
                    }
                    tracing::debug!(name = %cmd.name, "peer command");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("failed to process peer message: {}", e);
                    return false;
                }
            }
        }

        true
    }
}

impl Connection for RtmpConnection {
    fn is_connected(&mut self) -> bool {
        if self.connected && !self.poll_peer() {
            tracing::info!(url = %self.url, "peer closed the connection");
            self.connected = false;
        }
        self.connected
    }

    fn send(&mut self, packet: &TransmissionPacket) -> Result<()> {
        if !self.connected {
            return Err(Error::Disconnected);
        }

        let msg = Message {
            channel: packet.channel,
            timestamp: packet.timestamp,
            type_id: packet.packet_type.as_u8(),
            stream_id: packet.stream_id,
            payload: bytes::Bytes::copy_from_slice(packet.body()),
        };
        self.scratch.clear();
        self.writer.encode(&msg, packet.header_class, &mut self.scratch);
        self.write_scratch()
    }

    fn stream_id(&self) -> u32 {
        self.stream_id
    }
}

impl Drop for RtmpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_socket(authority: &str, timeout: Duration) -> Result<TcpStream> {
    let addrs = authority.to_socket_addrs().map_err(|e| Error::Connect {
        addr: authority.to_string(),
        source: e,
    })?;

    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, "connect failed: {}", e);
                last_err = e;
            }
        }
    }

    Err(Error::Connect {
        addr: authority.to_string(),
        source: last_err,
    })
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
