use super::{Name, ParseError, QClass, QType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub qname: Name,
    pub qtype: QType,
    pub qclass: QClass,
}

impl Question {
    pub fn read(buf: &[u8], offset: usize) -> Result<(Question, usize), ParseError> {
        let (qname, mut cursor) = Name::read(buf, offset)?;
        let qtype = u16::from_be_bytes(
            buf.get(cursor..cursor + 2)
                .ok_or(ParseError::Truncated)?
                .try_into()
                .unwrap(),
        );
        cursor += 2;
        let qclass = u16::from_be_bytes(
            buf.get(cursor..cursor + 2)
                .ok_or(ParseError::Truncated)?
                .try_into()
                .unwrap(),
        );
        cursor += 2;
        Ok((
            Question {
                qname,
                qtype: QType(qtype),
                qclass: QClass(qclass),
            },
            cursor,
        ))
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        self.qname.write(out);
        out.extend_from_slice(&self.qtype.0.to_be_bytes());
        out.extend_from_slice(&self.qclass.0.to_be_bytes());
    }
}
