//! Publishing against an in-process RTMP server on the loopback interface.

use bytes::BytesMut;
use flvpush_common::{AmfValue, HeaderClass, TagType, TransmissionPacket};
use flvpush_rtmp::chunk::{ChunkReader, ChunkWriter};
use flvpush_rtmp::handshake::HANDSHAKE_SIZE;
use flvpush_rtmp::message::{self, Command, Message};
use flvpush_rtmp::{ConnectOptions, Connection, Error, RtmpConnection};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Accept,
    RejectPublish,
    DropAfterFirstMedia,
}

/// After publish starts, the server writes part of a control message and
/// holds the rest until released.
struct Gate {
    partial_written: Sender<()>,
    release: Receiver<()>,
}

#[derive(Default)]
struct Received {
    publish_name: Option<String>,
    app: Option<String>,
    media: Vec<Message>,
    commands: Vec<String>,
}

fn send(stream: &mut TcpStream, writer: &ChunkWriter, msg: &Message) {
    let mut buf = BytesMut::new();
    writer.encode(msg, HeaderClass::Large, &mut buf);
    stream.write_all(&buf).unwrap();
}

fn status(level: &str, code: &str) -> AmfValue {
    AmfValue::object([
        ("level", AmfValue::string(level)),
        ("code", AmfValue::string(code)),
        ("description", AmfValue::string(format!("{} test", code))),
    ])
}

fn spawn_server(behavior: Behavior) -> (String, JoinHandle<Received>) {
    spawn_server_with(behavior, None)
}

fn spawn_server_with(behavior: Behavior, gate: Option<Gate>) -> (String, JoinHandle<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("rtmp://{}/live/room", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
        stream.read_exact(&mut c0c1).unwrap();
        let mut reply = vec![3u8];
        reply.extend(vec![0u8; HANDSHAKE_SIZE]);
        reply.extend_from_slice(&c0c1[1..]);
        stream.write_all(&reply).unwrap();
        let mut c2 = vec![0u8; HANDSHAKE_SIZE];
        stream.read_exact(&mut c2).unwrap();

        let mut reader = ChunkReader::new();
        let mut writer = ChunkWriter::new();
        let mut received = Received::default();

        while let Ok(msg) = reader.read_message(&mut stream) {
            match msg.type_id {
                message::SET_CHUNK_SIZE => {
                    reader.set_chunk_size(msg.control_value().unwrap()).unwrap();
                }
                message::COMMAND_AMF0 => {
                    let cmd = Command::parse(&msg.payload).unwrap();
                    received.commands.push(cmd.name.clone());
                    match cmd.name.as_str() {
                        "connect" => {
                            received.app = cmd.args[0]
                                .get("app")
                                .and_then(AmfValue::as_str)
                                .map(String::from);
                            send(&mut stream, &writer, &Message::window_ack_size(5_000_000));
                            send(&mut stream, &writer, &Message::set_chunk_size(4096));
                            writer.set_chunk_size(4096);
                            let result = Command::new(
                                "_result",
                                cmd.transaction_id,
                                vec![
                                    AmfValue::object([("fmsVer", AmfValue::string("FMS/3,0,1,123"))]),
                                    status("status", "NetConnection.Connect.Success"),
                                ],
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
                            received.publish_name =
                                cmd.args.get(1).and_then(AmfValue::as_str).map(String::from);
                            let info = if behavior == Behavior::RejectPublish {
                                status("error", "NetStream.Publish.BadName")
                            } else {
                                status("status", "NetStream.Publish.Start")
                            };
                            let on_status =
                                Command::new("onStatus", 0.0, vec![AmfValue::Null, info]);
                            send(&mut stream, &writer, &on_status.into_message(1));

                            if let Some(gate) = gate.as_ref() {
                                let mut ack = BytesMut::new();
                                writer.encode(
                                    &Message::acknowledgement(1),
                                    HeaderClass::Large,
                                    &mut ack,
                                );
                                stream.write_all(&ack[..6]).unwrap();
                                gate.partial_written.send(()).unwrap();
                                gate.release.recv().unwrap();
                                stream.write_all(&ack[6..]).unwrap();
                            }
                        }
                        _ => {}
                    }
                }
                message::AUDIO | message::VIDEO | message::DATA_AMF0 => {
                    received.media.push(msg);
                    if behavior == Behavior::DropAfterFirstMedia {
                        break;
                    }
                }
                _ => {}
            }
        }

        received
    });

    (url, handle)
}

fn packet_for(conn: &RtmpConnection) -> TransmissionPacket {
    let mut packet = TransmissionPacket::default();
    packet.stream_id = conn.stream_id();
    packet
}

#[test]
fn test_publish_delivers_media_in_order() {
    let (url, server) = spawn_server(Behavior::Accept);
    let mut conn = RtmpConnection::connect(&url, &ConnectOptions::default()).unwrap();
    assert_eq!(conn.stream_id(), 1);
    assert!(conn.is_connected());

    let large: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
    let mut packet = packet_for(&conn);

    packet.load(TagType::Script, 0, &[0x02, 0x00, 0x01, b'x']).unwrap();
    conn.send(&packet).unwrap();
    packet.load(TagType::Audio, 0, &[0xAF, 0x00, 0x12, 0x10]).unwrap();
    conn.send(&packet).unwrap();
    packet.load(TagType::Video, 40, &large).unwrap();
    conn.send(&packet).unwrap();
    packet.load(TagType::Video, 0x0100_0000, &[0x27, 0x01]).unwrap();
    conn.send(&packet).unwrap();

    conn.close();
    assert!(!conn.is_connected());
    let received = server.join().unwrap();

    assert_eq!(received.app.as_deref(), Some("live"));
    assert_eq!(received.publish_name.as_deref(), Some("room"));

    let summary: Vec<(u8, u32, usize)> = received
        .media
        .iter()
        .map(|m| (m.type_id, m.timestamp, m.payload.len()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (message::DATA_AMF0, 0, 4),
            (message::AUDIO, 0, 4),
            (message::VIDEO, 40, 10_000),
            (message::VIDEO, 0x0100_0000, 2),
        ]
    );
    assert_eq!(&received.media[2].payload[..], &large[..]);
    assert!(received.media.iter().all(|m| m.stream_id == 1 && m.channel == 4));

    let expected = ["connect", "releaseStream", "FCPublish", "createStream", "publish"];
    assert_eq!(&received.commands[..5], &expected);
    assert!(received.commands.contains(&"FCUnpublish".to_string()));
    assert!(received.commands.contains(&"deleteStream".to_string()));
}

#[test]
fn test_rejected_publish() {
    let (url, server) = spawn_server(Behavior::RejectPublish);
    let err = RtmpConnection::connect(&url, &ConnectOptions::default())
        .err()
        .unwrap();
    match err {
        Error::Rejected {
            command,
            description,
        } => {
            assert_eq!(command, "publish");
            assert!(description.contains("BadName"));
        }
        other => panic!("unexpected error: {}", other),
    }
    let received = server.join().unwrap();
    assert!(received.media.is_empty());
}

#[test]
fn test_peer_close_is_detected() {
    let (url, server) = spawn_server(Behavior::DropAfterFirstMedia);
    let mut conn = RtmpConnection::connect(&url, &ConnectOptions::default()).unwrap();

    let mut packet = packet_for(&conn);
    packet.load(TagType::Audio, 0, &[0xAF, 0x01]).unwrap();
    conn.send(&packet).unwrap();

    let received = server.join().unwrap();
    assert_eq!(received.media.len(), 1);

    let mut alive = true;
    for _ in 0..100 {
        alive = conn.is_connected();
        if !alive {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(!alive);
    assert!(matches!(conn.send(&packet), Err(Error::Disconnected)));
}

#[test]
fn test_partial_peer_message_keeps_connection_live() {
    let (partial_tx, partial_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Gate {
        partial_written: partial_tx,
        release: release_rx,
    };
    let (url, server) = spawn_server_with(Behavior::Accept, Some(gate));

    let options = ConnectOptions {
        timeout: Duration::from_secs(2),
        ..ConnectOptions::default()
    };
    let mut conn = RtmpConnection::connect(&url, &options).unwrap();
    partial_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    assert!(conn.is_connected());
    assert!(started.elapsed() < Duration::from_secs(1));

    release_tx.send(()).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(conn.is_connected());

    let mut packet = packet_for(&conn);
    packet.load(TagType::Video, 0, &[0x17, 0x00]).unwrap();
    conn.send(&packet).unwrap();
    assert!(conn.is_connected());

    conn.close();
    let received = server.join().unwrap();
    assert_eq!(received.media.len(), 1);
    assert_eq!(received.media[0].type_id, message::VIDEO);
}

#[test]
fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("rtmp://{}/live/room", addr);
    let options = ConnectOptions {
        timeout: Duration::from_secs(2),
        ..ConnectOptions::default()
    };
    let err = RtmpConnection::connect(&url, &options).err().unwrap();
    assert!(matches!(err, Error::Connect { .. }));
}

#[test]
fn test_invalid_url_never_connects() {
    let err = RtmpConnection::connect("rtmp://localhost", &ConnectOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidUrl { .. }));
}
