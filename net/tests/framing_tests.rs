use imgchain_core::UserId;
use imgchain_net::conn::{recv_tag, recv_until_end, Peer};
use imgchain_net::frame::Tag;
use std::net::{TcpListener, TcpStream};
use std::thread;

fn connected_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
    let (server, _) = listener.accept().unwrap();
    (server, client.join().unwrap())
}

#[test]
fn fixed_size_tag_round_trips_over_a_real_socket() {
    let (server, client) = connected_pair();
    let peer = Peer::new(client, server.peer_addr().unwrap(), UserId::random(), "a".into(), 0);
    peer.send_tag(Tag::AllOk).unwrap();

    let mut reader = server;
    assert_eq!(recv_tag(&mut reader).unwrap(), Tag::AllOk);
}

#[test]
fn end_terminated_payload_reassembles_across_partial_reads() {
    let (server, client) = connected_pair();
    let peer = Peer::new(client, server.peer_addr().unwrap(), UserId::random(), "a".into(), 0);

    let payload = vec![7u8; 5000]; // bigger than the 1024-byte scan chunk
    peer.send_framed(Tag::NewBlock, &payload).unwrap();

    let mut reader = server;
    assert_eq!(recv_tag(&mut reader).unwrap(), Tag::NewBlock);
    let received = recv_until_end(&mut reader).unwrap();
    assert_eq!(received, payload);
}

#[test]
fn new_difficulty_frame_has_no_end_sentinel() {
    let (server, client) = connected_pair();
    let peer = Peer::new(client, server.peer_addr().unwrap(), UserId::random(), "a".into(), 0);
    peer.send_framed(Tag::NewDifficulty, &7u16.to_be_bytes()).unwrap();

    let mut reader = server;
    assert_eq!(recv_tag(&mut reader).unwrap(), Tag::NewDifficulty);
    let payload = imgchain_net::conn::recv_exact(&mut reader, 2).unwrap();
    assert_eq!(u16::from_be_bytes(payload.try_into().unwrap()), 7);
}
