use serde::{Deserialize, Serialize};
use tokio::net::UnixStream;

use unwindd_front::ipc::framing::{read_message, recv_fd, send_fd, write_message};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Header {
    kind: String,
    n: u32,
}

#[tokio::test]
async fn write_then_read_message_round_trips_header_and_payload() {
    let (mut a, mut b) = UnixStream::pair().unwrap();

    let header = Header {
        kind: "test".to_string(),
        n: 7,
    };
    write_message(&mut a, &header, b"payload bytes").await.unwrap();

    let (got_header, got_payload): (Header, Vec<u8>) = read_message(&mut b).await.unwrap();
    assert_eq!(got_header, header);
    assert_eq!(got_payload, b"payload bytes");
}

#[tokio::test]
async fn send_fd_then_recv_fd_delivers_a_usable_descriptor() {
    use std::io::Read;
    use std::os::fd::{AsRawFd, FromRawFd};

    let (a, b) = UnixStream::pair().unwrap();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), b"marker").unwrap();
    let file = std::fs::File::open(tmp.path()).unwrap();
    let fd = file.as_raw_fd();

    let send = tokio::spawn(async move { send_fd(&a, fd).await });
    let received_fd = recv_fd(&b).await.unwrap();
    send.await.unwrap().unwrap();

    // SAFETY: `received_fd` was just handed to us over SCM_RIGHTS and is not
    // owned anywhere else yet.
    let mut received = unsafe { std::fs::File::from_raw_fd(received_fd) };
    let mut contents = String::new();
    received.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "marker");
}
