//! Tracker rendezvous handshake (§4.7, §11): login (new vs. returning
//! identity, with the returning-user confirmation prompt supplemented from
//! the original `Client.login`) and the subsequent peer table fetch.

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::wire_strings::{pad_bytes, unpad_bytes};
use imgchain_core::UserId;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream};

/// One entry of the peer table the tracker hands back after login.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub user_id: UserId,
    pub username: String,
}

/// Callbacks the CLI/GUI layer supplies so the tracker handshake can prompt
/// a human without this crate depending on any particular UI.
pub trait LoginPrompts {
    /// Asked when the tracker has never seen this connection's address before.
    fn prompt_new_username(&self) -> String;
    /// Asked when the tracker already has an identity on file for this
    /// address: "Welcome back, {username}. Is this you?" Returning `false`
    /// discards the prior identity and prompts for a fresh username.
    fn confirm_returning_user(&self, username: &str) -> bool;
}

/// Performs the login handshake against an already-connected tracker socket
/// and returns the identity the client should use for the rest of the
/// session (freshly generated or confirmed-returning).
pub fn login(stream: &mut TcpStream, listen_port: u16, prompts: &dyn LoginPrompts) -> Result<Identity> {
    let mut head = [0u8; 3];
    stream.read_exact(&mut head)?;

    let identity = if &head == b"NEW" {
        Identity::new(UserId::random(), prompts.prompt_new_username(), listen_port)
    } else {
        let mut rest = [0u8; 61];
        stream.read_exact(&mut rest)?;
        let mut buf = [0u8; 64];
        buf[..3].copy_from_slice(&head);
        buf[3..].copy_from_slice(&rest);

        let user_id = UserId::from_wire(&buf[0..32])
            .map_err(|_| Error::MalformedTracker("invalid returning user id".into()))?;
        let username = unpad_bytes(&buf[32..64]);

        if prompts.confirm_returning_user(&username) {
            Identity::new(user_id, username, listen_port)
        } else {
            Identity::new(UserId::random(), prompts.prompt_new_username(), listen_port)
        }
    };

    let mut hello = Vec::with_capacity(66);
    hello.extend_from_slice(identity.user_id.as_bytes());
    hello.extend_from_slice(&pad_bytes::<32>(&identity.username));
    hello.extend_from_slice(&identity.listen_port.to_be_bytes());
    stream.write_all(&hello)?;

    Ok(identity)
}

/// Fetches the tracker's table of other currently-active peers.
pub fn get_peers(stream: &mut TcpStream) -> Result<Vec<PeerInfo>> {
    let mut count_buf = [0u8; 4];
    stream.read_exact(&mut count_buf)?;
    let count = u32::from_be_bytes(count_buf);

    let mut peers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut row = [0u8; 70];
        stream.read_exact(&mut row)?;
        let ip = Ipv4Addr::new(row[0], row[1], row[2], row[3]);
        let port = u16::from_be_bytes([row[4], row[5]]);
        let user_id = UserId::from_wire(&row[6..38])
            .map_err(|_| Error::MalformedTracker("invalid peer user id".into()))?;
        let username = unpad_bytes(&row[38..70]);
        peers.push(PeerInfo {
            ip,
            port,
            user_id,
            username,
        });
    }
    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_and_unpad_round_trip_usernames() {
        let padded = pad_bytes::<32>("alice");
        assert_eq!(unpad_bytes(&padded), "alice");
    }

    #[test]
    fn unpad_handles_a_fully_padded_field() {
        assert_eq!(unpad_bytes(&[0u8; 32]), "");
    }
}
