/// Query/RR type, kept as a numeric newtype with named constants rather than
/// an exhaustive enum: the front-end's guards only ever compare against a
/// small named set (AXFR/IXFR, OPT/TSIG/TKEY/MAILA/MAILB and the 128..248
/// meta-type range) and otherwise pass the value through opaquely to the
/// resolver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct QType(pub u16);

impl QType {
    pub const A: QType = QType(1);
    pub const NS: QType = QType(2);
    pub const CNAME: QType = QType(5);
    pub const SOA: QType = QType(6);
    pub const PTR: QType = QType(12);
    pub const MX: QType = QType(15);
    pub const TXT: QType = QType(16);
    pub const AAAA: QType = QType(28);
    pub const SRV: QType = QType(33);
    pub const OPT: QType = QType(41);
    pub const DS: QType = QType(43);
    pub const RRSIG: QType = QType(46);
    pub const NSEC: QType = QType(47);
    pub const DNSKEY: QType = QType(48);
    pub const TKEY: QType = QType(249);
    pub const TSIG: QType = QType(250);
    pub const IXFR: QType = QType(251);
    pub const AXFR: QType = QType(252);
    pub const MAILB: QType = QType(253);
    pub const MAILA: QType = QType(254);
    pub const ANY: QType = QType(255);

    /// True for the meta-type range 128..=248, which §4.1 screens out as
    /// FORMERR regardless of whether it carries a named constant above.
    pub fn is_meta_range(self) -> bool {
        (128..=248).contains(&self.0)
    }
}

impl std::fmt::Display for QType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
