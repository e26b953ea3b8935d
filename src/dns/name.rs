/// Errors raised while decoding the wire format. Kept small and specific so
/// the guards in `guard::check_query` can map each one to the right rcode
/// without string matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("packet shorter than a DNS header")]
    TooShort,
    #[error("label exceeds 63 bytes")]
    LabelTooLong,
    #[error("domain name exceeds 255 bytes")]
    NameTooLong,
    #[error("compression pointer out of bounds")]
    BadPointer,
    #[error("too many compression jumps")]
    CompressionLoop,
    #[error("truncated record")]
    Truncated,
    #[error("rdata length does not match declared length")]
    RdataLengthMismatch,
}

/// A fully-qualified domain name, stored as its rendered dotted form.
///
/// Wire names are either literal labels or compression pointers into
/// earlier packet bytes; this type is the decoded, allocation-owning result
/// of following those pointers, so the rest of the crate never has to think
/// about compression again.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Name(String);

const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
const MAX_COMPRESSION_JUMPS: usize = 128;

impl Name {
    pub fn root() -> Self {
        Name(".".to_string())
    }

    /// Render as the dot-terminated FQDN form used for blocklist lookups
    /// and question-section comparisons.
    pub fn as_fqdn(&self) -> &str {
        &self.0
    }

    pub fn from_fqdn(s: &str) -> Self {
        let mut owned = s.to_string();
        if !owned.ends_with('.') {
            owned.push('.');
        }
        Name(owned)
    }

    /// Decode a name starting at `offset` in `buf`, following compression
    /// pointers as needed. Returns the name and the offset immediately past
    /// the (possibly pointer-terminated) name in the original stream.
    pub fn read(buf: &[u8], offset: usize) -> Result<(Name, usize), ParseError> {
        let mut labels: Vec<String> = Vec::new();
        let mut cursor = offset;
        let mut jumps = 0usize;
        let mut end_of_name: Option<usize> = None;
        let mut total_len = 0usize;

        loop {
            let len_byte = *buf.get(cursor).ok_or(ParseError::Truncated)?;

            if len_byte == 0 {
                cursor += 1;
                if end_of_name.is_none() {
                    end_of_name = Some(cursor);
                }
                break;
            }

            if len_byte & 0xC0 == 0xC0 {
                jumps += 1;
                if jumps > MAX_COMPRESSION_JUMPS {
                    return Err(ParseError::CompressionLoop);
                }
                let hi = (len_byte & 0x3F) as usize;
                let lo = *buf.get(cursor + 1).ok_or(ParseError::Truncated)? as usize;
                let pointer = (hi << 8) | lo;
                if pointer >= cursor {
                    // Forward or self pointers can never terminate; reject
                    // rather than loop.
                    return Err(ParseError::BadPointer);
                }
                if end_of_name.is_none() {
                    end_of_name = Some(cursor + 2);
                }
                cursor = pointer;
                continue;
            }

            if len_byte & 0xC0 != 0 {
                return Err(ParseError::BadPointer);
            }

            let label_len = len_byte as usize;
            if label_len > MAX_LABEL_LEN {
                return Err(ParseError::LabelTooLong);
            }
            let start = cursor + 1;
            let end = start + label_len;
            let label_bytes = buf.get(start..end).ok_or(ParseError::Truncated)?;
            let label = String::from_utf8_lossy(label_bytes).into_owned();
            total_len += label_len + 1;
            if total_len > MAX_NAME_LEN {
                return Err(ParseError::NameTooLong);
            }
            labels.push(label);
            cursor = end;
        }

        let rendered = if labels.is_empty() {
            ".".to_string()
        } else {
            let mut s = labels.join(".");
            s.push('.');
            s
        };

        Ok((Name(rendered), end_of_name.unwrap()))
    }

    /// Encode without compression. The front-end only ever re-encodes names
    /// it already validated on the way in (the client's qname) or short,
    /// fixed literals (`version.bind.`), so skipping compression keeps the
    /// encoder simple without costing meaningful bytes.
    pub fn write(&self, out: &mut Vec<u8>) {
        if self.0 == "." {
            out.push(0);
            return;
        }
        for label in self.0.trim_end_matches('.').split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_name() {
        let mut buf = Vec::new();
        Name::from_fqdn("example.com.").write(&mut buf);
        let (name, consumed) = Name::read(&buf, 0).unwrap();
        assert_eq!(name.as_fqdn(), "example.com.");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn follows_compression_pointer() {
        let mut buf = Vec::new();
        Name::from_fqdn("example.com.").write(&mut buf); // offset 0
        let pointer_offset = buf.len();
        buf.push(0xC0);
        buf.push(0x00);
        let (name, consumed) = Name::read(&buf, pointer_offset).unwrap();
        assert_eq!(name.as_fqdn(), "example.com.");
        assert_eq!(consumed, pointer_offset + 2);
    }

    #[test]
    fn rejects_pointer_loop() {
        let mut buf = vec![0xC0, 0x00];
        buf[1] = 0x00;
        // Pointer at offset 0 points to itself (offset 0 >= cursor 0), must
        // be rejected rather than looping forever.
        let err = Name::read(&buf, 0).unwrap_err();
        assert_eq!(err, ParseError::BadPointer);
    }

    #[test]
    fn rejects_oversized_label() {
        let mut buf = vec![64u8];
        buf.extend(std::iter::repeat(b'a').take(64));
        let err = Name::read(&buf, 0).unwrap_err();
        assert_eq!(err, ParseError::LabelTooLong);
    }
}
