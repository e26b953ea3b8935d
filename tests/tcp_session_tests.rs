use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use unwindd_front::accept_limiter::AcceptLimiter;
use unwindd_front::session::TcpServer;

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

#[tokio::test]
async fn tcp_connection_round_trips_a_length_prefixed_query() {
    let server = TcpServer::bind(loopback(0), AcceptLimiter::with_capacity(4))
        .await
        .expect("bind server");
    let addr = server.local_addr().unwrap();

    let client_task = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&3u16.to_be_bytes()).await.unwrap();
        stream.write_all(b"abc").await.unwrap();

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await.unwrap();
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
        body
    });

    let mut conn = server.accept().await.unwrap();
    let query = conn.read_query().await.unwrap().unwrap();
    assert_eq!(query, b"abc");
    conn.write_reply(b"reply").await.unwrap();

    let echoed = client_task.await.unwrap();
    assert_eq!(echoed, b"reply");
}

#[tokio::test]
async fn tcp_connection_read_returns_none_on_clean_close() {
    let server = TcpServer::bind(loopback(0), AcceptLimiter::with_capacity(4))
        .await
        .expect("bind server");
    let addr = server.local_addr().unwrap();

    tokio::spawn(async move {
        let _stream = TcpStream::connect(addr).await.unwrap();
        // Dropping the stream immediately closes the connection before any
        // query is sent.
    });

    let mut conn = server.accept().await.unwrap();
    let result = conn.read_query().await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn accept_backs_off_once_the_limiter_is_exhausted() {
    let server = TcpServer::bind(loopback(0), AcceptLimiter::with_capacity(1))
        .await
        .expect("bind server");
    let addr = server.local_addr().unwrap();

    let _client1 = TcpStream::connect(addr).await.unwrap();
    let first = server.accept().await.unwrap();

    let _client2 = TcpStream::connect(addr).await.unwrap();
    // With the single permit held by `first`, accept() must back off rather
    // than return immediately; dropping `first` frees the permit so the
    // second connection is eventually accepted instead of hanging forever.
    let accept_fut = server.accept();
    tokio::pin!(accept_fut);
    tokio::select! {
        _ = &mut accept_fut => panic!("accept should not succeed while the limiter is exhausted"),
        _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
    }
    drop(first);
    let second = accept_fut.await.unwrap();
    assert!(second.peer().port() > 0);
}
