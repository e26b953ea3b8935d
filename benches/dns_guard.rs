use criterion::{black_box, criterion_group, criterion_main, Criterion};

use unwindd_front::blocklist::Blocklist;
use unwindd_front::dns::{DnsHeader, DnsMessage, Name, Opcode, QClass, QType, Question};
use unwindd_front::guard::check_query;

fn sample_query(qname: &str) -> Vec<u8> {
    let message = DnsMessage {
        header: DnsHeader {
            id: 0xABCD,
            qr: false,
            opcode: u8::from(Opcode::Query),
            aa: false,
            tc: false,
            rd: true,
            ra: false,
            z: 0,
            cd: false,
            ad: false,
            rcode: 0,
            qdcount: 1,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        },
        questions: vec![Question {
            qname: Name::from_fqdn(qname),
            qtype: QType::A,
            qclass: QClass::IN,
        }],
        answers: Vec::new(),
        authorities: Vec::new(),
        additional: Vec::new(),
    };
    message.serialize()
}

fn bench_check_query_forwarded(c: &mut Criterion) {
    let blocklist = Blocklist::empty();
    let buf = sample_query("example.com.");
    c.bench_function("check_query forwarded", |b| {
        b.iter(|| {
            black_box(check_query(black_box(&buf), black_box(&blocklist)));
        });
    });
}

fn bench_check_query_blocked(c: &mut Criterion) {
    let blocklist = Blocklist::from_names((0..10_000).map(|i| format!("blocked{i}.example.")));
    let buf = sample_query("blocked9999.example.");
    c.bench_function("check_query blocklisted, 10k entries", |b| {
        b.iter(|| {
            black_box(check_query(black_box(&buf), black_box(&blocklist)));
        });
    });
}

criterion_group!(benches, bench_check_query_forwarded, bench_check_query_blocked);
criterion_main!(benches);
