//! Client-facing transports (§4.3, §4.4): UDP is a single bind-and-loop
//! socket, TCP is an accept loop plus one length-prefixed framing state
//! machine per connection. Both hand well-formed queries up to the event
//! loop rather than talking to the resolver directly.

pub mod tcp;
pub mod udp;

pub use tcp::{TcpConnection, TcpServer};
pub use udp::UdpSession;
