/// Query/RR class. Only IN and CH ever matter to this front-end.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct QClass(pub u16);

impl QClass {
    pub const IN: QClass = QClass(1);
    pub const CH: QClass = QClass(3);
    pub const ANY: QClass = QClass(255);
}

impl std::fmt::Display for QClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
