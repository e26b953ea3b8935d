//! Routing-socket watcher (§4.9): a raw `PF_ROUTE` socket delivers
//! `rt_msghdr`-framed notifications whenever an interface appears,
//! disappears, changes state, or the system's default-resolver proposal
//! changes. This front-end doesn't interpret full route entries — it only
//! cares whether something worth telling the resolver about happened, so it
//! classifies each message's type byte and drops the rest.
//!
//! `PF_ROUTE` only exists on BSD-derived kernels; on everything else this
//! module compiles to a watcher that never fires, so the event loop can
//! select over it unconditionally regardless of target.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    /// RTM_IFINFO: an interface's flags or link state changed.
    NetworkChanged,
    /// RTM_IFANNOUNCE with `what != IFAN_ARRIVAL`: an interface departed.
    InterfaceDeparted { if_index: u32 },
    /// RTM_PROPOSAL carrying an RTAX_DNS sockaddr: the system's default
    /// resolver addresses for `if_index` changed. `rtdns` is the raw,
    /// back-to-back address bytes (4 bytes per entry for AF_INET, 16 for
    /// AF_INET6); `family` is the address family those entries are in.
    DnsProposal {
        if_index: u32,
        family: u8,
        rtdns: Vec<u8>,
    },
}

#[cfg(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
))]
pub use bsd::RouteSocket;

#[cfg(not(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
)))]
pub use stub::RouteSocket;

#[cfg(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
))]
mod bsd {
    use std::os::fd::RawFd;

    use tokio::io::unix::AsyncFd;
    use tracing::{debug, trace, warn};

    use super::RouteEvent;
    use crate::error::Result;
    use crate::sandbox::require_unsandboxed;

    // From <net/route.h> / <net/if.h>, stable across BSD-derived routing
    // socket implementations.
    const RTM_IFINFO: u8 = 0x0e;
    const RTM_IFANNOUNCE: u8 = 0x0f;
    const RTM_PROPOSAL: u8 = 0x1a;

    const IFAN_ARRIVAL: u16 = 0;

    // Bit position of RTAX_DNS in rtm_addrs.
    const RTA_DNS: i32 = 1 << 15;

    const AF_INET: u8 = 2;
    const AF_INET6: u8 = 30;

    const READ_BUF_LEN: usize = 16 * 1024;

    /// `rtm_index`/`ifm_index`/`ifan_index` all sit at this offset: a u16
    /// right after the common `rtm_msglen`/`rtm_version`/`rtm_type`/
    /// `rtm_hdrlen` fields shared by every message type on this socket.
    const IDX_OFFSET: usize = 6;
    /// `rtm_hdrlen`: length of the fixed header preceding any trailing
    /// sockaddrs, as a u16.
    const HDRLEN_OFFSET: usize = 4;
    /// `rtm_addrs`: bitmask of which RTAX_* sockaddrs follow the header, as
    /// an i32. Only present on `rt_msghdr` (RTM_PROPOSAL uses this shape).
    const ADDRS_OFFSET: usize = 16;
    /// `ifan_what` on `if_announcemsghdr`: the u16 right after the 16-byte
    /// `ifan_name` that follows the common header fields.
    const IFAN_WHAT_OFFSET: usize = IDX_OFFSET + 2 + 16;

    fn read_u16(buf: &[u8], at: usize) -> Option<u16> {
        buf.get(at..at + 2).map(|b| u16::from_ne_bytes([b[0], b[1]]))
    }

    fn read_i32(buf: &[u8], at: usize) -> Option<i32> {
        buf.get(at..at + 4)
            .map(|b| i32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Parse the `sockaddr_rtdns` that follows the `rt_msghdr` when
    /// `RTA_DNS` is set: `sr_len` (u8), `sr_family` (u8), then `sr_len - 2`
    /// bytes of back-to-back raw addresses.
    fn parse_rtdns(buf: &[u8], at: usize) -> Option<(u8, Vec<u8>)> {
        let sr_len = *buf.get(at)? as usize;
        let sr_family = *buf.get(at + 1)?;
        let start = at + 2;
        let end = at.checked_add(sr_len)?;
        let data = buf.get(start..end)?;
        Some((sr_family, data.to_vec()))
    }

    fn family_stride(family: u8) -> Option<usize> {
        match family {
            AF_INET => Some(4),
            AF_INET6 => Some(16),
            _ => None,
        }
    }

    pub struct RouteSocket {
        inner: AsyncFd<RawRouteSocket>,
    }

    struct RawRouteSocket(RawFd);

    impl std::os::fd::AsRawFd for RawRouteSocket {
        fn as_raw_fd(&self) -> RawFd {
            self.0
        }
    }

    impl Drop for RawRouteSocket {
        fn drop(&mut self) {
            // SAFETY: `self.0` is an owned fd created by `RouteSocket::open`
            // and never duplicated or otherwise shared.
            unsafe {
                libc::close(self.0);
            }
        }
    }

    impl RouteSocket {
        /// Open a `PF_ROUTE`/`AF_UNSPEC` socket and register it with the
        /// current tokio reactor. Requires the capability to create raw
        /// sockets, which must be granted before this process drops
        /// privileges (see `sandbox`).
        pub fn open() -> Result<Self> {
            require_unsandboxed("routing socket open")?;
            // SAFETY: a plain socket(2) call with no pointers involved; the
            // returned fd is checked for failure before use.
            let fd = unsafe { libc::socket(libc::PF_ROUTE, libc::SOCK_RAW, libc::AF_UNSPEC) };
            if fd < 0 {
                return Err(std::io::Error::last_os_error().into());
            }
            set_nonblocking(fd)?;
            let inner = AsyncFd::new(RawRouteSocket(fd))?;
            Ok(RouteSocket { inner })
        }

        pub async fn next_event(&mut self) -> Result<Option<RouteEvent>> {
            loop {
                let mut guard = self.inner.readable_mut().await?;
                let mut buf = [0u8; READ_BUF_LEN];
                let result = guard.try_io(|inner| {
                    // SAFETY: `buf` is large enough for any single routing
                    // message (kernel-bounded) and remains valid for the call.
                    let n = unsafe {
                        libc::read(
                            inner.get_ref().0,
                            buf.as_mut_ptr() as *mut libc::c_void,
                            buf.len(),
                        )
                    };
                    if n < 0 {
                        Err(std::io::Error::last_os_error())
                    } else {
                        Ok(n as usize)
                    }
                });

                let n = match result {
                    Ok(Ok(n)) => n,
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_would_block) => continue,
                };

                if n < 4 {
                    trace!(len = n, "routing socket message too short to classify");
                    continue;
                }

                // rt_msghdr's type byte sits at offset 3 on every
                // BSD-derived layout (after the u16 length and u8 version
                // fields).
                let rtm_type = buf[3];
                let msg = &buf[..n];
                let event = match rtm_type {
                    RTM_IFINFO => Some(RouteEvent::NetworkChanged),
                    RTM_IFANNOUNCE => {
                        let Some(if_index) = read_u16(msg, IDX_OFFSET) else {
                            continue;
                        };
                        let what = read_u16(msg, IFAN_WHAT_OFFSET).unwrap_or(IFAN_ARRIVAL);
                        if what == IFAN_ARRIVAL {
                            None
                        } else {
                            Some(RouteEvent::InterfaceDeparted {
                                if_index: if_index as u32,
                            })
                        }
                    }
                    RTM_PROPOSAL => {
                        let (Some(if_index), Some(hdrlen), Some(addrs)) = (
                            read_u16(msg, IDX_OFFSET),
                            read_u16(msg, HDRLEN_OFFSET),
                            read_i32(msg, ADDRS_OFFSET),
                        ) else {
                            continue;
                        };
                        if addrs & RTA_DNS == 0 {
                            None
                        } else {
                            match parse_rtdns(msg, hdrlen as usize) {
                                Some((family, rtdns)) => match family_stride(family) {
                                    Some(stride) if rtdns.len() % stride == 0 => Some(RouteEvent::DnsProposal {
                                        if_index: if_index as u32,
                                        family,
                                        rtdns,
                                    }),
                                    _ => {
                                        warn!(family, len = rtdns.len(), "dropping RTA_DNS proposal with misaligned payload");
                                        None
                                    }
                                },
                                None => {
                                    warn!("dropping truncated RTA_DNS proposal");
                                    None
                                }
                            }
                        }
                    }
                    other => {
                        debug!(rtm_type = other, "ignoring uninteresting routing message");
                        None
                    }
                };

                if let Some(event) = event {
                    return Ok(Some(event));
                }
            }
        }
    }

    fn set_nonblocking(fd: RawFd) -> Result<()> {
        // SAFETY: `fd` is a valid, just-created socket fd.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
        if flags < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        // SAFETY: see above.
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn classifies_known_message_types() {
            assert_eq!(RTM_IFINFO, 0x0e);
            assert_eq!(RTM_IFANNOUNCE, 0x0f);
            assert_eq!(RTM_PROPOSAL, 0x1a);
        }

        #[test]
        fn parses_rtdns_sockaddr() {
            // sr_len=6, sr_family=AF_INET, then one IPv4 address.
            let mut buf = vec![0u8; 16];
            buf.extend_from_slice(&[6, AF_INET, 192, 0, 2, 1]);
            let (family, rtdns) = parse_rtdns(&buf, 16).expect("parses");
            assert_eq!(family, AF_INET);
            assert_eq!(rtdns, vec![192, 0, 2, 1]);
            assert_eq!(family_stride(family), Some(4));
        }

        #[test]
        fn rejects_misaligned_rtdns_payload() {
            let mut buf = vec![0u8; 16];
            buf[0] = 5; // sr_len: 3 payload bytes, not a multiple of 4
            buf[1] = AF_INET;
            buf.extend_from_slice(&[1, 2, 3]);
            let (family, rtdns) = parse_rtdns(&buf, 0).expect("parses");
            assert_eq!(family_stride(family), Some(4));
            assert_ne!(rtdns.len() % 4, 0);
        }
    }
}

#[cfg(not(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
)))]
mod stub {
    use super::RouteEvent;
    use crate::error::Result;
    use crate::sandbox::require_unsandboxed;

    /// No routing socket exists on this target; `next_event` simply never
    /// resolves so selecting over it in the event loop is a correct no-op
    /// rather than a busy loop.
    pub struct RouteSocket;

    impl RouteSocket {
        pub fn open() -> Result<Self> {
            require_unsandboxed("routing socket open")?;
            Ok(RouteSocket)
        }

        pub async fn next_event(&mut self) -> Result<Option<RouteEvent>> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }
}
