use std::os::fd::AsRawFd;

use tokio::net::{UdpSocket, UnixStream};

use unwindd_front::ipc::framing::{send_fd, write_message};
use unwindd_front::ipc::main_channel::{MainEvent, MainMessage};
use unwindd_front::ipc::MainChannel;

#[tokio::test]
async fn next_event_delivers_a_listener_socket_handed_down_as_an_fd() {
    let (mut parent, child) = UnixStream::pair().unwrap();
    let mut channel = MainChannel::new(child);

    let listener_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let fd = listener_socket.as_raw_fd();

    let parent_task = tokio::spawn(async move {
        write_message(&mut parent, &MainMessage::NewUdpListener, &[])
            .await
            .unwrap();
        send_fd(&parent, fd).await.unwrap();
        // Keep `listener_socket` and `parent` alive until the fd has
        // actually been duplicated into the child's address space.
        parent
    });

    match channel.next_event().await.unwrap() {
        MainEvent::NewUdpListener(socket) => {
            assert!(socket.local_addr().is_ok());
        }
        other => panic!("expected NewUdpListener, got a different event: {}", matches_name(&other)),
    }

    parent_task.await.unwrap();
}

#[tokio::test]
async fn reconf_bracket_only_commits_at_reconf_end() {
    let (mut parent, child) = UnixStream::pair().unwrap();
    let mut channel = MainChannel::new(child);

    tokio::spawn(async move {
        write_message(&mut parent, &MainMessage::ReconfStart, &[]).await.unwrap();
        write_message(
            &mut parent,
            &MainMessage::ReconfBlocklist {
                names: vec!["ads.example.".to_string()],
            },
            &[],
        )
        .await
        .unwrap();
        write_message(
            &mut parent,
            &MainMessage::ReconfForwarders {
                forwarders: vec!["1.1.1.1".to_string()],
            },
            &[],
        )
        .await
        .unwrap();
        write_message(&mut parent, &MainMessage::ReconfEnd, &[]).await.unwrap();
        parent
    });

    match channel.next_event().await.unwrap() {
        MainEvent::ReconfCommitted(staged) => {
            assert_eq!(staged.blocklist, Some(vec!["ads.example.".to_string()]));
            assert_eq!(staged.forwarders, Some(vec!["1.1.1.1".to_string()]));
            assert_eq!(staged.trust_anchors, None);
        }
        _ => panic!("expected ReconfCommitted"),
    }
}

fn matches_name(event: &MainEvent) -> &'static str {
    match event {
        MainEvent::NewUdpListener(_) => "NewUdpListener",
        MainEvent::NewTcpListener(_) => "NewTcpListener",
        MainEvent::ReconfCommitted(_) => "ReconfCommitted",
        MainEvent::NetworkChanged => "NetworkChanged",
    }
}
