use super::{DnsHeader, ParseError, Question, ResourceRecord};

/// A fully decoded DNS message. Used both for inbound queries and for the
/// resolver's answer once the front-end needs to look inside it for reply
/// post-processing (§4.5.1).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DnsMessage {
    pub header: DnsHeader,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl DnsMessage {
    pub fn parse(buf: &[u8]) -> Result<DnsMessage, ParseError> {
        let header = DnsHeader::read(buf)?;
        let mut cursor = DnsHeader::WIRE_LEN;

        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            let (q, next) = Question::read(buf, cursor)?;
            questions.push(q);
            cursor = next;
        }

        let mut answers = Vec::with_capacity(header.ancount as usize);
        for _ in 0..header.ancount {
            let (rr, next) = ResourceRecord::read(buf, cursor)?;
            answers.push(rr);
            cursor = next;
        }

        let mut authorities = Vec::with_capacity(header.nscount as usize);
        for _ in 0..header.nscount {
            let (rr, next) = ResourceRecord::read(buf, cursor)?;
            authorities.push(rr);
            cursor = next;
        }

        let mut additional = Vec::with_capacity(header.arcount as usize);
        for _ in 0..header.arcount {
            let (rr, next) = ResourceRecord::read(buf, cursor)?;
            additional.push(rr);
            cursor = next;
        }

        Ok(DnsMessage {
            header,
            questions,
            answers,
            authorities,
            additional,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(512);
        let mut header = self.header;
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.additional.len() as u16;
        header.write(&mut out);
        for q in &self.questions {
            q.write(&mut out);
        }
        for rr in &self.answers {
            rr.write(&mut out);
        }
        for rr in &self.authorities {
            rr.write(&mut out);
        }
        for rr in &self.additional {
            rr.write(&mut out);
        }
        out
    }
}
