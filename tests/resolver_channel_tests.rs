use tokio::net::UnixStream;

use unwindd_front::ipc::framing::{read_message, write_message};
use unwindd_front::ipc::{ResolverChannel, ResolverInbound, ResolverOutbound};

#[tokio::test]
async fn send_query_delivers_id_and_wire_payload() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let mut channel = ResolverChannel::new(a);

    channel.send_query(42, b"wire query bytes").await.unwrap();

    let (message, payload): (ResolverOutbound, Vec<u8>) = read_message(&mut b).await.unwrap();
    assert!(matches!(message, ResolverOutbound::Query { id: 42 }));
    assert_eq!(payload, b"wire query bytes");
}

#[tokio::test]
async fn recv_decodes_an_answer_with_its_payload() {
    let (mut a, b) = UnixStream::pair().unwrap();
    let mut channel = ResolverChannel::new(b);

    let answer = ResolverInbound::Answer {
        id: 9,
        bogus: false,
        srvfail: false,
    };
    write_message(&mut a, &answer, b"resolver reply bytes").await.unwrap();

    let (message, payload) = channel.recv().await.unwrap();
    match message {
        ResolverInbound::Answer { id, bogus, srvfail } => {
            assert_eq!(id, 9);
            assert!(!bogus);
            assert!(!srvfail);
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(payload, b"resolver reply bytes");
}

#[tokio::test]
async fn send_forwards_non_query_variants_without_a_payload() {
    let (a, mut b) = UnixStream::pair().unwrap();
    let mut channel = ResolverChannel::new(a);

    channel
        .send(&ResolverOutbound::ReplaceForwarders {
            forwarders: vec!["9.9.9.9".to_string()],
        })
        .await
        .unwrap();

    let (message, payload): (ResolverOutbound, Vec<u8>) = read_message(&mut b).await.unwrap();
    assert!(payload.is_empty());
    match message {
        ResolverOutbound::ReplaceForwarders { forwarders } => {
            assert_eq!(forwarders, vec!["9.9.9.9".to_string()]);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}
