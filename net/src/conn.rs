//! A framed connection to a single peer (§4.5, §5).
//!
//! `END`-terminated payloads are reassembled by repeatedly pulling 1024-byte
//! chunks until the accumulated buffer ends with the sentinel, exactly as
//! the original reads did. This means an image whose raw bytes happen to
//! contain the literal ASCII sequence `END` right at a chunk boundary will
//! be truncated early — a known limitation carried over rather than
//! silently patched (§9 Open Questions, §12).

use crate::error::{Error, Result};
use crate::frame::{Tag, END};
use imgchain_core::UserId;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Mutex;

/// Size of each `recv` call while scanning for the `END` sentinel, matching
/// the original's `conn.recv(1024)`.
const SCAN_CHUNK: usize = 1024;

/// A live connection to one peer: one `TcpStream`, a write-side mutex so
/// broadcast threads never interleave bytes on the wire, and the peer's
/// identity as learned during the handshake.
pub struct Peer {
    stream: TcpStream,
    write_lock: Mutex<()>,
    pub addr: SocketAddr,
    pub user_id: UserId,
    pub username: String,
    pub listen_port: u16,
}

impl Peer {
    pub fn new(stream: TcpStream, addr: SocketAddr, user_id: UserId, username: String, listen_port: u16) -> Self {
        Self {
            stream,
            write_lock: Mutex::new(()),
            addr,
            user_id,
            username,
            listen_port,
        }
    }

    /// Opens a fresh TCP connection to a peer's listener.
    pub fn connect(addr: SocketAddr, user_id: UserId, username: String, listen_port: u16) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::new(stream, addr, user_id, username, listen_port))
    }

    /// Clones the underlying socket so a dedicated reader thread can block
    /// on reads while the owning `Peer` is shared for writes.
    pub fn try_clone_stream(&self) -> Result<TcpStream> {
        Ok(self.stream.try_clone()?)
    }

    pub fn send_bytes(&self, bytes: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        (&self.stream).write_all(bytes)?;
        Ok(())
    }

    pub fn send_tag(&self, tag: Tag) -> Result<()> {
        self.send_bytes(&tag.as_bytes())
    }

    /// Sends `tag ‖ payload`, appending the `END` sentinel when `tag` calls
    /// for a variable-length body.
    pub fn send_framed(&self, tag: Tag, payload: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        (&self.stream).write_all(&tag.as_bytes())?;
        (&self.stream).write_all(payload)?;
        if tag.is_end_terminated() {
            (&self.stream).write_all(&END)?;
        }
        Ok(())
    }
}

/// Reads exactly `n` bytes from `reader`, matching `socket.recv(n)` used for
/// every fixed-size field in the original protocol.
pub fn recv_exact(reader: &mut impl Read, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(e)
        }
    })?;
    Ok(buf)
}

/// Reads a 3-byte tag and parses it.
pub fn recv_tag(reader: &mut impl Read) -> Result<Tag> {
    let bytes = recv_exact(reader, Tag::LEN)?;
    Tag::parse(bytes.try_into().unwrap())
}

/// Pulls `SCAN_CHUNK`-sized reads until the buffer ends with `END`, then
/// strips the sentinel and returns the payload — the Rust shape of
/// `while not data.endswith(END): data += conn.recv(1024)`.
pub fn recv_until_end(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut chunk = [0u8; SCAN_CHUNK];
    while data.len() < END.len() || data[data.len() - END.len()..] != END {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        data.extend_from_slice(&chunk[..n]);
    }
    data.truncate(data.len() - END.len());
    Ok(data)
}
