use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use super::name::ParseError;

/// The 12-byte DNS header, RFC 1035 §4.1.1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub cd: bool,
    pub ad: bool,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    pub const WIRE_LEN: usize = 12;

    pub fn read(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < Self::WIRE_LEN {
            return Err(ParseError::TooShort);
        }
        let mut reader = BitReader::endian(&buf[..Self::WIRE_LEN], BigEndian);
        let mut h = DnsHeader::default();
        h.id = reader.read_var(16).map_err(|_| ParseError::Truncated)?;
        h.qr = reader.read_bit().map_err(|_| ParseError::Truncated)?;
        h.opcode = reader.read_var(4).map_err(|_| ParseError::Truncated)?;
        h.aa = reader.read_bit().map_err(|_| ParseError::Truncated)?;
        h.tc = reader.read_bit().map_err(|_| ParseError::Truncated)?;
        h.rd = reader.read_bit().map_err(|_| ParseError::Truncated)?;
        h.ra = reader.read_bit().map_err(|_| ParseError::Truncated)?;
        h.z = reader.read_var(1).map_err(|_| ParseError::Truncated)?;
        h.ad = reader.read_bit().map_err(|_| ParseError::Truncated)?;
        h.cd = reader.read_bit().map_err(|_| ParseError::Truncated)?;
        h.rcode = reader.read_var(4).map_err(|_| ParseError::Truncated)?;
        h.qdcount = reader.read_var(16).map_err(|_| ParseError::Truncated)?;
        h.ancount = reader.read_var(16).map_err(|_| ParseError::Truncated)?;
        h.nscount = reader.read_var(16).map_err(|_| ParseError::Truncated)?;
        h.arcount = reader.read_var(16).map_err(|_| ParseError::Truncated)?;
        Ok(h)
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let mut writer = BitWriter::endian(Vec::new(), BigEndian);
        writer.write_var(16, self.id as u32).unwrap();
        writer.write_bit(self.qr).unwrap();
        writer.write_var(4, self.opcode as u32).unwrap();
        writer.write_bit(self.aa).unwrap();
        writer.write_bit(self.tc).unwrap();
        writer.write_bit(self.rd).unwrap();
        writer.write_bit(self.ra).unwrap();
        writer.write_var(1, self.z as u32).unwrap();
        writer.write_bit(self.ad).unwrap();
        writer.write_bit(self.cd).unwrap();
        writer.write_var(4, self.rcode as u32).unwrap();
        writer.write_var(16, self.qdcount as u32).unwrap();
        writer.write_var(16, self.ancount as u32).unwrap();
        writer.write_var(16, self.nscount as u32).unwrap();
        writer.write_var(16, self.arcount as u32).unwrap();
        out.extend_from_slice(writer.into_writer().as_slice());
    }
}
