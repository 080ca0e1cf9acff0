//! A single-session RTMP ingest server on 127.0.0.1.

use bytes::BytesMut;
use flvpush_common::{AmfValue, HeaderClass};
use flvpush_rtmp::chunk::{ChunkReader, ChunkWriter};
use flvpush_rtmp::handshake::HANDSHAKE_SIZE;
use flvpush_rtmp::message::{self, Command, Message};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What the server saw before the client hung up.
#[derive(Debug, Default)]
pub struct Session {
    pub app: Option<String>,
    pub stream_name: Option<String>,
    /// Command names in arrival order.
    pub commands: Vec<String>,
    /// Audio, video and data messages in arrival order.
    pub media: Vec<Message>,
}

fn send(stream: &mut TcpStream, writer: &ChunkWriter, msg: &Message) {
    let mut buf = BytesMut::new();
    writer.encode(msg, HeaderClass::Large, &mut buf);
    stream.write_all(&buf).unwrap();
}

fn handshake(stream: &mut TcpStream) {
    let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
    stream.read_exact(&mut c0c1).unwrap();
    let mut reply = vec![3u8];
    reply.extend(vec![0u8; HANDSHAKE_SIZE]);
    reply.extend_from_slice(&c0c1[1..]);
    stream.write_all(&reply).unwrap();
    let mut c2 = vec![0u8; HANDSHAKE_SIZE];
    stream.read_exact(&mut c2).unwrap();
}

/// Start a server that accepts one publisher. Returns its URL for
/// `/live/<stream>` and a handle yielding the recorded session.
pub fn spawn(stream_name: &str) -> (String, JoinHandle<Session>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("rtmp://{}/live/{}", listener.local_addr().unwrap(), stream_name);

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        handshake(&mut stream);

        let mut reader = ChunkReader::new();
        let mut writer = ChunkWriter::new();
        let mut session = Session::default();

        while let Ok(msg) = reader.read_message(&mut stream) {
            match msg.type_id {
                message::SET_CHUNK_SIZE => {
                    reader.set_chunk_size(msg.control_value().unwrap()).unwrap();
                }
                message::COMMAND_AMF0 => {
                    let cmd = Command::parse(&msg.payload).unwrap();
                    session.commands.push(cmd.name.clone());
                    match cmd.name.as_str() {
                        "connect" => {
                            session.app = cmd.args[0]
                                .get("app")
                                .and_then(AmfValue::as_str)
                                .map(String::from);
                            send(&mut stream, &writer, &Message::set_chunk_size(4096));
                            writer.set_chunk_size(4096);
                            let result = Command::new(
                                "_result",
                                cmd.transaction_id,
                                vec![AmfValue::Null, AmfValue::Null],
                            );
                            send(&mut stream, &writer, &result.into_message(0));
                        }
                        "createStream" => {
                            let result = Command::new(
                                "_result",
                                cmd.transaction_id,
                                vec![AmfValue::Null, AmfValue::Number(1.0)],
                            );
                            send(&mut stream, &writer, &result.into_message(0));
                        }
                        "publish" => {
                            session.stream_name =
                                cmd.args.get(1).and_then(AmfValue::as_str).map(String::from);
                            let info = AmfValue::object([
                                ("level", AmfValue::string("status")),
                                ("code", AmfValue::string("NetStream.Publish.Start")),
                                ("description", AmfValue::string("publishing")),
                            ]);
                            let on_status =
                                Command::new("onStatus", 0.0, vec![AmfValue::Null, info]);
                            send(&mut stream, &writer, &on_status.into_message(1));
                        }
                        _ => {}
                    }
                }
                message::AUDIO | message::VIDEO | message::DATA_AMF0 => session.media.push(msg),
                _ => {}
            }
        }

        session
    });

    (url, handle)
}
