use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use unwindd_front::pool::BufferPool;
use unwindd_front::session::UdpSession;

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

#[tokio::test]
async fn udp_session_round_trips_a_datagram() {
    let server = UdpSession::bind(loopback(0), BufferPool::new(4096, 8))
        .await
        .expect("bind server");
    let server_addr = server.local_addr().unwrap();

    let client = UdpSession::bind(loopback(0), BufferPool::new(4096, 8))
        .await
        .expect("bind client");
    let client_addr = client.local_addr().unwrap();

    client.send(b"hello", server_addr).await.unwrap();
    let (buf, peer) = server.recv().await.unwrap();
    assert_eq!(buf, b"hello");
    assert_eq!(peer, client_addr);

    server.send(b"world", peer).await.unwrap();
    let (buf, _) = client.recv().await.unwrap();
    assert_eq!(buf, b"world");
}
