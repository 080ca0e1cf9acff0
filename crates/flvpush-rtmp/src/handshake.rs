//! Simple (unsigned) RTMP handshake, client side.
//!
//! ```text
//! client                         server
//!   C0 (version) + C1 (1536) ──►
//!                            ◄── S0 + S1 + S2
//!   C2 (echo of S1)          ──►
//! ```

use rand::RngCore;
use std::io::{Read, Write};

use crate::{Error, Result};

/// Protocol version byte sent in C0 and expected in S0.
pub const RTMP_VERSION: u8 = 3;

/// Size of C1/C2/S1/S2.
pub const HANDSHAKE_SIZE: usize = 1536;

/// Run the client side of the handshake on a connected stream.
pub fn perform<S: Read + Write>(stream: &mut S) -> Result<()> {
    let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
    c0c1[0] = RTMP_VERSION;
    // time (4) and zero (4) stay zero; the rest is random
    rand::thread_rng().fill_bytes(&mut c0c1[9..]);
    stream.write_all(&c0c1)?;
    stream.flush()?;
    tracing::trace!("sent C0+C1");

    let mut s0 = [0u8; 1];
    read_phase(stream, &mut s0, "S0")?;
    if s0[0] != RTMP_VERSION {
        return Err(Error::handshake(format!(
            "server requested unsupported version {}",
            s0[0]
        )));
    }

    let mut s1 = vec![0u8; HANDSHAKE_SIZE];
    read_phase(stream, &mut s1, "S1")?;

    stream.write_all(&s1)?;
    stream.flush()?;
    tracing::trace!("sent C2");

    let mut s2 = vec![0u8; HANDSHAKE_SIZE];
    read_phase(stream, &mut s2, "S2")?;
    if s2[8..] != c0c1[9..] {
        tracing::warn!("S2 does not echo C1; continuing");
    }

    tracing::debug!("handshake complete");
    Ok(())
}

fn read_phase<S: Read>(stream: &mut S, buf: &mut [u8], phase: &str) -> Result<()> {
    stream.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
            Error::Timeout(format!("handshake {}", phase))
        }
        std::io::ErrorKind::UnexpectedEof => {
            Error::handshake(format!("connection closed before {}", phase))
        }
        _ => Error::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory peer: reads come from a canned server reply, writes are captured.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn server_reply(version: u8) -> Vec<u8> {
        let mut reply = vec![version];
        reply.extend((0..HANDSHAKE_SIZE).map(|i| (i % 251) as u8));
        reply.extend(vec![0u8; HANDSHAKE_SIZE]);
        reply
    }

    #[test]
    fn test_handshake_echoes_s1() {
        let mut peer = Duplex {
            input: Cursor::new(server_reply(3)),
            output: Vec::new(),
        };
        perform(&mut peer).unwrap();

        assert_eq!(peer.output.len(), 1 + 2 * HANDSHAKE_SIZE);
        assert_eq!(peer.output[0], RTMP_VERSION);
        let c2 = &peer.output[1 + HANDSHAKE_SIZE..];
        assert_eq!(c2, &server_reply(3)[1..1 + HANDSHAKE_SIZE]);
    }

    #[test]
    fn test_handshake_rejects_version() {
        let mut peer = Duplex {
            input: Cursor::new(server_reply(6)),
            output: Vec::new(),
        };
        assert!(matches!(perform(&mut peer), Err(Error::Handshake(_))));
    }

    #[test]
    fn test_handshake_short_reply() {
        let mut peer = Duplex {
            input: Cursor::new(vec![3, 0, 0]),
            output: Vec::new(),
        };
        let err = perform(&mut peer).unwrap_err();
        assert!(err.to_string().contains("S1"));
    }
}
