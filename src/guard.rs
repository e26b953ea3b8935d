//! Query screening (§4.1): every inbound datagram/message passes through
//! `check_query` before it can reach the pending-query table or the
//! resolver IPC channel. Grounded on the teacher's `QueryProcessor`
//! pipeline (`protocol/query_processor.rs`) — parse, then validate, then
//! special-case handling before ever calling the resolver — adapted to the
//! specific screen this front-end applies instead of heimdall's own.

use crate::blocklist::Blocklist;
use crate::dns::{wire, DnsMessage, EdnsInfo, Opcode, ParseError, QClass, QType, Question, Rcode};

/// What the caller should do with a screened query.
pub enum CheckOutcome {
    /// Forward to the resolver: the query passed every guard.
    Forward {
        question: Question,
        header_id: u16,
        rd: bool,
        cd: bool,
        edns: EdnsInfo,
    },
    /// Hand this wire-format buffer straight back to the client.
    Respond(Vec<u8>),
    /// Too malformed to safely answer at all; the caller must not touch the
    /// socket again for this datagram.
    Drop,
}

const SERVER_VERSION: &str = "unwind";

pub fn check_query(buf: &[u8], blocklist: &Blocklist) -> CheckOutcome {
    if buf.len() < 12 {
        return CheckOutcome::Drop;
    }

    let message = match wire::parse_query(buf) {
        Ok(m) => m,
        Err(ParseError::TooShort) => return CheckOutcome::Drop,
        Err(_) => {
            // We at least have a header; best-effort echo its id/rd so the
            // client can match the FORMERR to its query.
            return respond_with_header_only(buf, Rcode::FormErr);
        }
    };

    if message.header.qr {
        // This is someone's response, not a query; never answer it.
        return CheckOutcome::Drop;
    }

    let id = message.header.id;
    let rd = message.header.rd;
    let cd = message.header.cd;

    if message.header.tc {
        return CheckOutcome::Respond(wire::encode_error(None, id, rd, Rcode::FormErr));
    }

    if Opcode::from(message.header.opcode) != Opcode::Query {
        return CheckOutcome::Respond(wire::encode_error(None, id, rd, Rcode::NotImp));
    }

    if !rd {
        return CheckOutcome::Respond(wire::encode_error(None, id, rd, Rcode::Refused));
    }

    // §4.1's count guard, exactly as stated: all four counts must be
    // simultaneously off before this fires.
    if message.header.qdcount != 1
        && message.header.ancount != 0
        && message.header.nscount != 0
        && message.header.arcount > 1
    {
        return CheckOutcome::Respond(wire::encode_error(None, id, rd, Rcode::FormErr));
    }

    if message.questions.len() != 1 || !message.authorities.is_empty() {
        return CheckOutcome::Respond(wire::encode_error(None, id, rd, Rcode::FormErr));
    }
    // At most one OPT pseudo-record is allowed in additional.
    if message.additional.iter().filter(|rr| rr.rtype == QType::OPT).count() > 1 {
        return CheckOutcome::Respond(wire::encode_error(None, id, rd, Rcode::FormErr));
    }

    let question = message.questions[0].clone();

    if matches!(question.qtype, QType::AXFR | QType::IXFR) {
        return CheckOutcome::Respond(wire::encode_error(
            Some(&question),
            id,
            rd,
            Rcode::Refused,
        ));
    }

    if is_disallowed_meta_type(question.qtype) {
        return CheckOutcome::Respond(wire::encode_error(
            Some(&question),
            id,
            rd,
            Rcode::FormErr,
        ));
    }

    if question.qclass == QClass::CH {
        return handle_chaos(&question, id, rd);
    }

    if question.qclass != QClass::IN {
        return CheckOutcome::Respond(wire::encode_error(
            Some(&question),
            id,
            rd,
            Rcode::Refused,
        ));
    }

    if blocklist.is_blocked(question.qname.as_fqdn()) {
        return CheckOutcome::Respond(wire::encode_error(
            Some(&question),
            id,
            rd,
            Rcode::Refused,
        ));
    }

    let edns = EdnsInfo::from_additional(&message.additional);
    CheckOutcome::Forward {
        question,
        header_id: id,
        rd,
        cd,
        edns,
    }
}

fn is_disallowed_meta_type(t: QType) -> bool {
    matches!(
        t,
        QType::OPT | QType::TSIG | QType::TKEY | QType::MAILA | QType::MAILB
    ) || t.is_meta_range()
}

fn handle_chaos(question: &Question, id: u16, rd: bool) -> CheckOutcome {
    let qname = question.qname.as_fqdn().to_ascii_lowercase();
    if question.qtype == QType::TXT && (qname == "version.server." || qname == "version.bind.") {
        CheckOutcome::Respond(wire::encode_chaos_version(question, id, rd, SERVER_VERSION))
    } else {
        CheckOutcome::Respond(wire::encode_error(Some(question), id, rd, Rcode::Refused))
    }
}

/// The header parsed but the rest of the message didn't: still echo back
/// id/rd if we can scrape them out of the fixed 12-byte header directly.
fn respond_with_header_only(buf: &[u8], rcode: Rcode) -> CheckOutcome {
    let id = u16::from_be_bytes([buf[0], buf[1]]);
    let rd = buf[2] & 0x01 != 0;
    CheckOutcome::Respond(wire::encode_error(None, id, rd, rcode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DnsHeader, Name};

    fn encode(message: &DnsMessage) -> Vec<u8> {
        message.serialize()
    }

    fn base_query(qname: &str, qtype: QType, qclass: QClass) -> DnsMessage {
        DnsMessage {
            header: DnsHeader {
                id: 0xABCD,
                qr: false,
                opcode: 0,
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
                qtype,
                qclass,
            }],
            answers: Vec::new(),
            authorities: Vec::new(),
            additional: Vec::new(),
        }
    }

    #[test]
    fn forwards_well_formed_query() {
        let bl = Blocklist::empty();
        let buf = encode(&base_query("example.com.", QType::A, QClass::IN));
        match check_query(&buf, &bl) {
            CheckOutcome::Forward { question, rd, .. } => {
                assert_eq!(question.qname.as_fqdn(), "example.com.");
                assert!(rd);
            }
            _ => panic!("expected forward"),
        }
    }

    #[test]
    fn drops_too_short_packet() {
        let bl = Blocklist::empty();
        assert!(matches!(check_query(&[0u8; 4], &bl), CheckOutcome::Drop));
    }

    #[test]
    fn refuses_without_recursion_desired() {
        let bl = Blocklist::empty();
        let mut m = base_query("example.com.", QType::A, QClass::IN);
        m.header.rd = false;
        let buf = encode(&m);
        match check_query(&buf, &bl) {
            CheckOutcome::Respond(resp) => {
                let parsed = DnsMessage::parse(&resp).unwrap();
                assert_eq!(parsed.header.rcode, Rcode::Refused.as_u8());
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn refuses_axfr() {
        let bl = Blocklist::empty();
        let buf = encode(&base_query("example.com.", QType::AXFR, QClass::IN));
        match check_query(&buf, &bl) {
            CheckOutcome::Respond(resp) => {
                let parsed = DnsMessage::parse(&resp).unwrap();
                assert_eq!(parsed.header.rcode, Rcode::Refused.as_u8());
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn answers_chaos_version_query() {
        let bl = Blocklist::empty();
        let buf = encode(&base_query("version.bind.", QType::TXT, QClass::CH));
        match check_query(&buf, &bl) {
            CheckOutcome::Respond(resp) => {
                let parsed = DnsMessage::parse(&resp).unwrap();
                assert_eq!(parsed.header.rcode, Rcode::NoError.as_u8());
                assert_eq!(parsed.answers.len(), 1);
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn refuses_other_chaos_queries() {
        let bl = Blocklist::empty();
        let buf = encode(&base_query("hostname.bind.", QType::TXT, QClass::CH));
        match check_query(&buf, &bl) {
            CheckOutcome::Respond(resp) => {
                let parsed = DnsMessage::parse(&resp).unwrap();
                assert_eq!(parsed.header.rcode, Rcode::Refused.as_u8());
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn refuses_blocklisted_name() {
        let bl = Blocklist::from_names(["ads.example.".to_string()]);
        let buf = encode(&base_query("ads.example.", QType::A, QClass::IN));
        match check_query(&buf, &bl) {
            CheckOutcome::Respond(resp) => {
                let parsed = DnsMessage::parse(&resp).unwrap();
                assert_eq!(parsed.header.rcode, Rcode::Refused.as_u8());
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn rejects_meta_type_range() {
        let bl = Blocklist::empty();
        let buf = encode(&base_query("example.com.", QType(200), QClass::IN));
        match check_query(&buf, &bl) {
            CheckOutcome::Respond(resp) => {
                let parsed = DnsMessage::parse(&resp).unwrap();
                assert_eq!(parsed.header.rcode, Rcode::FormErr.as_u8());
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn forward_carries_the_cd_bit_through() {
        let bl = Blocklist::empty();
        let mut m = base_query("example.com.", QType::A, QClass::IN);
        m.header.cd = true;
        let buf = encode(&m);
        match check_query(&buf, &bl) {
            CheckOutcome::Forward { cd, .. } => assert!(cd),
            _ => panic!("expected forward"),
        }
    }

    #[test]
    fn drops_query_with_qr_bit_set() {
        let bl = Blocklist::empty();
        let mut m = base_query("example.com.", QType::A, QClass::IN);
        m.header.qr = true;
        let buf = encode(&m);
        assert!(matches!(check_query(&buf, &bl), CheckOutcome::Drop));
    }
}
