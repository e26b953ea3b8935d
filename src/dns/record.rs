use super::{Name, ParseError, QClass, QType};

/// A resource record kept in its opaque wire form. The front-end never
/// needs to interpret rdata (the resolver owns actual record semantics), so
/// names inside rdata are left exactly as received rather than decompressed
/// — grounded on the teacher's zero-copy `ResourceView`, which takes the
/// same "don't touch rdata" stance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: Name,
    pub rtype: QType,
    pub rclass: QClass,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl ResourceRecord {
    pub fn read(buf: &[u8], offset: usize) -> Result<(ResourceRecord, usize), ParseError> {
        let (name, mut cursor) = Name::read(buf, offset)?;
        let rtype = read_u16(buf, &mut cursor)?;
        let rclass = read_u16(buf, &mut cursor)?;
        let ttl = read_u32(buf, &mut cursor)?;
        let rdlength = read_u16(buf, &mut cursor)? as usize;
        let rdata = buf
            .get(cursor..cursor + rdlength)
            .ok_or(ParseError::Truncated)?
            .to_vec();
        cursor += rdlength;
        Ok((
            ResourceRecord {
                name,
                rtype: QType(rtype),
                rclass: QClass(rclass),
                ttl,
                rdata,
            },
            cursor,
        ))
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        self.name.write(out);
        out.extend_from_slice(&self.rtype.0.to_be_bytes());
        out.extend_from_slice(&self.rclass.0.to_be_bytes());
        out.extend_from_slice(&self.ttl.to_be_bytes());
        out.extend_from_slice(&(self.rdata.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.rdata);
    }
}

fn read_u16(buf: &[u8], cursor: &mut usize) -> Result<u16, ParseError> {
    let v = u16::from_be_bytes(
        buf.get(*cursor..*cursor + 2)
            .ok_or(ParseError::Truncated)?
            .try_into()
            .unwrap(),
    );
    *cursor += 2;
    Ok(v)
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32, ParseError> {
    let v = u32::from_be_bytes(
        buf.get(*cursor..*cursor + 4)
            .ok_or(ParseError::Truncated)?
            .try_into()
            .unwrap(),
    );
    *cursor += 4;
    Ok(v)
}
