//! DNS wire protocol support.
//!
//! This module is the "library" the rest of the front-end treats as an
//! external collaborator: callers never poke at header bits or label
//! encoding directly, they go through [`wire::parse_query`],
//! [`wire::parse_reply`], [`wire::encode_reply`], and [`wire::encode_error`].

mod edns;
mod header;
mod name;
mod opcode;
mod packet;
mod question;
mod rcode;
mod record;
mod qclass;
mod qtype;
pub mod wire;

pub use edns::EdnsInfo;
pub use header::DnsHeader;
pub use name::{Name, ParseError};
pub use opcode::Opcode;
pub use packet::DnsMessage;
pub use qclass::QClass;
pub use question::Question;
pub use rcode::Rcode;
pub use record::ResourceRecord;
pub use qtype::QType;
