use super::{Name, QClass, QType, ResourceRecord};

/// Decoded EDNS(0) pseudo-OPT information (RFC 6891), flattened into the
/// handful of fields the front-end's guards and re-encoder actually need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdnsInfo {
    pub present: bool,
    pub udp_size: u16,
    pub do_bit: bool,
    pub version: u8,
    pub ext_rcode: u8,
}

pub const DEFAULT_UDP_SIZE: u16 = 512;

impl Default for EdnsInfo {
    fn default() -> Self {
        EdnsInfo {
            present: false,
            udp_size: DEFAULT_UDP_SIZE,
            do_bit: false,
            version: 0,
            ext_rcode: 0,
        }
    }
}

impl EdnsInfo {
    /// Look for an OPT record in the additional section and decode it.
    pub fn from_additional(additional: &[ResourceRecord]) -> EdnsInfo {
        for rr in additional {
            if rr.rtype == QType::OPT {
                let udp_size = rr.rclass.0;
                let ext_rcode = (rr.ttl >> 24) as u8;
                let version = ((rr.ttl >> 16) & 0xFF) as u8;
                let do_bit = (rr.ttl & 0x8000) != 0;
                return EdnsInfo {
                    present: true,
                    udp_size: if udp_size == 0 {
                        DEFAULT_UDP_SIZE
                    } else {
                        udp_size
                    },
                    do_bit,
                    version,
                    ext_rcode,
                };
            }
        }
        EdnsInfo::default()
    }

    /// Effective UDP response size budget: the client's advertised size, or
    /// 512 when EDNS is absent.
    pub fn udp_budget(&self) -> u16 {
        if self.present { self.udp_size } else { DEFAULT_UDP_SIZE }
    }

    /// Build the OPT pseudo-record to append when echoing EDNS back.
    pub fn to_opt_record(&self, advertised_udp_size: u16) -> ResourceRecord {
        let ttl = ((self.ext_rcode as u32) << 24)
            | ((self.version as u32) << 16)
            | (if self.do_bit { 0x8000 } else { 0 });
        ResourceRecord {
            name: Name::root(),
            rtype: QType::OPT,
            rclass: QClass(advertised_udp_size),
            ttl,
            rdata: Vec::new(),
        }
    }
}
