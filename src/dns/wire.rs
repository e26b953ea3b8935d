//! The four operations the rest of the crate is allowed to know about the
//! wire format through: `parse_query`, `parse_reply`, `encode_reply`, and
//! `encode_error`. Everything else in the `dns` module is private support
//! for these four.

use super::{DnsHeader, DnsMessage, EdnsInfo, Name, ParseError, Opcode, Question, Rcode, ResourceRecord};

/// Parse a client query into header + questions (and, if present, EDNS).
/// Does not apply any policy — that is `guard::check_query`'s job.
pub fn parse_query(buf: &[u8]) -> Result<DnsMessage, ParseError> {
    DnsMessage::parse(buf)
}

/// Parse the resolver's accumulated answer bytes the same way.
pub fn parse_reply(buf: &[u8]) -> Result<DnsMessage, ParseError> {
    DnsMessage::parse(buf)
}

/// The maximum size budget a TCP response may use, per §4.5.1.
pub const TCP_MAX_SIZE: usize = u16::MAX as usize;

/// Re-encode a resolver answer for the client, per §4.5.1: the client's
/// original question and header id are restored regardless of anything the
/// resolver rewrote, the resolver's flags (rcode/aa) are carried through,
/// the transport-appropriate size budget is applied, and the client's DO
/// bit governs whether DNSSEC records are echoed back.
pub struct ReplyContext<'a> {
    pub qname: &'a Name,
    pub qtype: super::QType,
    pub qclass: super::QClass,
    pub client_id: u16,
    pub client_rd: bool,
    pub client_edns: EdnsInfo,
    pub max_size: usize,
}

pub fn encode_reply(ctx: &ReplyContext, resolver_reply: &DnsMessage) -> Vec<u8> {
    let question = Question {
        qname: ctx.qname.clone(),
        qtype: ctx.qtype,
        qclass: ctx.qclass,
    };

    // Answer minimization: carry the answer section through unmodified, but
    // only keep authority records when there are no answers (e.g. an SOA
    // for negative-answer TTL) and always drop additional records other
    // than the EDNS OPT we add back ourselves.
    let answers = resolver_reply.answers.clone();
    let authorities = if answers.is_empty() {
        resolver_reply.authorities.clone()
    } else {
        Vec::new()
    };
    let dnssec_records = |rrs: Vec<ResourceRecord>| -> Vec<ResourceRecord> {
        if ctx.client_edns.do_bit {
            rrs
        } else {
            rrs.into_iter()
                .filter(|rr| !is_dnssec_only_type(rr.rtype))
                .collect()
        }
    };
    let answers = dnssec_records(answers);
    let authorities = dnssec_records(authorities);

    let mut additional = Vec::new();
    if ctx.client_edns.present {
        additional.push(
            ctx.client_edns
                .to_opt_record(ctx.client_edns.udp_budget()),
        );
    }

    let mut message = DnsMessage {
        header: DnsHeader {
            id: ctx.client_id,
            qr: true,
            opcode: u8::from(Opcode::Query),
            aa: resolver_reply.header.aa,
            tc: false,
            rd: ctx.client_rd,
            ra: true,
            z: 0,
            cd: resolver_reply.header.cd,
            ad: resolver_reply.header.ad,
            rcode: resolver_reply.header.rcode,
            qdcount: 1,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        },
        questions: vec![question],
        answers,
        authorities,
        additional,
    };

    let encoded = message.serialize();
    if encoded.len() <= ctx.max_size {
        return encoded;
    }

    // Over budget: truncate per the encoder's responsibility noted in
    // §4.3 — drop every section but the question and set TC.
    message.answers.clear();
    message.authorities.clear();
    message.additional.clear();
    message.header.tc = true;
    message.serialize()
}

fn is_dnssec_only_type(t: super::QType) -> bool {
    matches!(t, super::QType::RRSIG | super::QType::NSEC | super::QType::DNSKEY | super::QType::DS)
}

/// Build an error response carrying no answer data, used for every guard
/// rejection and the CH-class TXT reply.
pub fn encode_error(
    question: Option<&Question>,
    id: u16,
    rd: bool,
    rcode: Rcode,
) -> Vec<u8> {
    let message = DnsMessage {
        header: DnsHeader {
            id,
            qr: true,
            opcode: u8::from(Opcode::Query),
            aa: false,
            tc: false,
            rd,
            ra: true,
            z: 0,
            cd: false,
            ad: false,
            rcode: rcode.as_u8(),
            qdcount: if question.is_some() { 1 } else { 0 },
            ancount: 0,
            nscount: 0,
            arcount: 0,
        },
        questions: question.cloned().into_iter().collect(),
        answers: Vec::new(),
        authorities: Vec::new(),
        additional: Vec::new(),
    };
    message.serialize()
}

/// Build the literal `version.bind.`/`version.server.` CH TXT reply (§4.1).
pub fn encode_chaos_version(question: &Question, id: u16, rd: bool, value: &str) -> Vec<u8> {
    let mut rdata = Vec::with_capacity(value.len() + 1);
    rdata.push(value.len() as u8);
    rdata.extend_from_slice(value.as_bytes());

    let message = DnsMessage {
        header: DnsHeader {
            id,
            qr: true,
            opcode: u8::from(Opcode::Query),
            aa: true,
            tc: false,
            rd,
            ra: true,
            z: 0,
            cd: false,
            ad: false,
            rcode: Rcode::NoError.as_u8(),
            qdcount: 1,
            ancount: 1,
            nscount: 0,
            arcount: 0,
        },
        questions: vec![question.clone()],
        answers: vec![ResourceRecord {
            name: question.qname.clone(),
            rtype: super::QType::TXT,
            rclass: question.qclass,
            ttl: 0,
            rdata,
        }],
        authorities: Vec::new(),
        additional: Vec::new(),
    };
    message.serialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{QClass, QType};

    fn sample_question() -> Question {
        Question {
            qname: Name::from_fqdn("example.com."),
            qtype: QType::A,
            qclass: QClass::IN,
        }
    }

    #[test]
    fn encode_reply_preserves_client_header_id() {
        let q = sample_question();
        let mut resolver_header = DnsHeader::default();
        resolver_header.id = 0xFFFF; // resolver-side id, must not leak out
        resolver_header.rcode = Rcode::NoError.as_u8();
        let resolver_reply = DnsMessage {
            header: resolver_header,
            questions: vec![q.clone()],
            answers: vec![ResourceRecord {
                name: q.qname.clone(),
                rtype: QType::A,
                rclass: QClass::IN,
                ttl: 300,
                rdata: vec![1, 1, 1, 1],
            }],
            authorities: Vec::new(),
            additional: Vec::new(),
        };

        let ctx = ReplyContext {
            qname: &q.qname,
            qtype: q.qtype,
            qclass: q.qclass,
            client_id: 0x1234,
            client_rd: true,
            client_edns: EdnsInfo::default(),
            max_size: TCP_MAX_SIZE,
        };

        let bytes = encode_reply(&ctx, &resolver_reply);
        let parsed = DnsMessage::parse(&bytes).unwrap();
        assert_eq!(parsed.header.id, 0x1234);
        assert_eq!(parsed.answers.len(), 1);
    }

    #[test]
    fn encode_reply_truncates_over_budget() {
        let q = sample_question();
        let mut answers = Vec::new();
        for _ in 0..100 {
            answers.push(ResourceRecord {
                name: q.qname.clone(),
                rtype: QType::TXT,
                rclass: QClass::IN,
                ttl: 300,
                rdata: vec![0u8; 200],
            });
        }
        let resolver_reply = DnsMessage {
            header: DnsHeader::default(),
            questions: vec![q.clone()],
            answers,
            authorities: Vec::new(),
            additional: Vec::new(),
        };
        let ctx = ReplyContext {
            qname: &q.qname,
            qtype: q.qtype,
            qclass: q.qclass,
            client_id: 7,
            client_rd: true,
            client_edns: EdnsInfo::default(),
            max_size: 512,
        };
        let bytes = encode_reply(&ctx, &resolver_reply);
        assert!(bytes.len() <= 512);
        let parsed = DnsMessage::parse(&bytes).unwrap();
        assert!(parsed.header.tc);
        assert!(parsed.answers.is_empty());
    }
}
