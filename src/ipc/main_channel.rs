//! The channel to the privileged parent/monitor process (§4.6). The parent
//! is the only process allowed to open listening sockets and read
//! configuration files; it hands this process ready-made fds and staged
//! configuration updates instead.
//!
//! Configuration arrives as a burst of `Reconf*` messages bracketed by
//! `ReconfStart`/`ReconfEnd` — nothing is applied until `ReconfEnd`, so a
//! reconfiguration that the parent aborts partway through never leaves the
//! front-end with a half-updated blocklist or forwarder set.

use std::os::fd::{FromRawFd, RawFd};

use serde::{Deserialize, Serialize};
use tokio::net::{UdpSocket, UnixStream};

use super::framing::{read_message, recv_fd, write_message};
use crate::error::{FrontendError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MainMessage {
    /// A freshly opened UDP listening socket follows as an attached fd.
    NewUdpListener,
    /// A freshly opened TCP listening socket follows as an attached fd.
    NewTcpListener,
    /// Begin a reconfiguration burst; nothing before the matching
    /// `ReconfEnd` should be treated as committed.
    ReconfStart,
    ReconfForwarders { forwarders: Vec<String> },
    ReconfBlocklist { names: Vec<String> },
    ReconfTrustAnchors { anchors: Vec<String> },
    /// Commit everything staged since `ReconfStart`.
    ReconfEnd,
    /// A relevant routing-socket change the parent wants relayed onward.
    NetworkChanged,
}

/// What a fully committed reconfiguration burst changed, handed back to the
/// event loop to apply atomically.
#[derive(Debug, Clone, Default)]
pub struct StagedConfig {
    pub forwarders: Option<Vec<String>>,
    pub blocklist: Option<Vec<String>>,
    pub trust_anchors: Option<Vec<String>>,
}

/// What the event loop should do in response to one message off the main
/// channel.
pub enum MainEvent {
    NewUdpListener(UdpSocket),
    NewTcpListener(std::net::TcpListener),
    ReconfCommitted(StagedConfig),
    NetworkChanged,
}

pub struct MainChannel {
    stream: UnixStream,
    staging: Option<StagedConfig>,
}

impl MainChannel {
    pub fn new(stream: UnixStream) -> Self {
        MainChannel {
            stream,
            staging: None,
        }
    }

    /// Read and act on the next message, looping internally over
    /// `ReconfStart`/`Reconf*` messages (which produce no event on their
    /// own) until something the event loop needs to react to arrives.
    pub async fn next_event(&mut self) -> Result<MainEvent> {
        loop {
            let (message, _payload): (MainMessage, Vec<u8>) = read_message(&mut self.stream).await?;
            match message {
                MainMessage::NewUdpListener => {
                    let fd = recv_fd(&self.stream).await?;
                    let socket = udp_socket_from_fd(fd)?;
                    return Ok(MainEvent::NewUdpListener(socket));
                }
                MainMessage::NewTcpListener => {
                    let fd = recv_fd(&self.stream).await?;
                    let listener = tcp_listener_from_fd(fd)?;
                    return Ok(MainEvent::NewTcpListener(listener));
                }
                MainMessage::ReconfStart => {
                    if self.staging.is_some() {
                        return Err(FrontendError::DuplicateSetup("ReconfStart"));
                    }
                    self.staging = Some(StagedConfig::default());
                }
                MainMessage::ReconfForwarders { forwarders } => {
                    self.stage(|s| s.forwarders = Some(forwarders))?;
                }
                MainMessage::ReconfBlocklist { names } => {
                    self.stage(|s| s.blocklist = Some(names))?;
                }
                MainMessage::ReconfTrustAnchors { anchors } => {
                    self.stage(|s| s.trust_anchors = Some(anchors))?;
                }
                MainMessage::ReconfEnd => {
                    let staged = self.staging.take().ok_or(FrontendError::Config(
                        "ReconfEnd without matching ReconfStart".into(),
                    ))?;
                    return Ok(MainEvent::ReconfCommitted(staged));
                }
                MainMessage::NetworkChanged => return Ok(MainEvent::NetworkChanged),
            }
        }
    }

    fn stage(&mut self, apply: impl FnOnce(&mut StagedConfig)) -> Result<()> {
        match &mut self.staging {
            Some(staged) => {
                apply(staged);
                Ok(())
            }
            None => Err(FrontendError::Config(
                "reconf message outside of ReconfStart/ReconfEnd".into(),
            )),
        }
    }

    /// Report a status line back to the parent, e.g. the outcome of a
    /// trust-anchor rollover.
    pub async fn send_status(&mut self, message: impl Into<String>) -> Result<()> {
        write_message(
            &mut self.stream,
            &StatusReport {
                message: message.into(),
            },
            &[],
        )
        .await
    }
}

#[derive(Serialize)]
struct StatusReport {
    message: String,
}

fn udp_socket_from_fd(fd: RawFd) -> Result<UdpSocket> {
    // SAFETY: `fd` was just received over SCM_RIGHTS from the parent, which
    // guarantees exclusive ownership; it is consumed exactly once here.
    let std_socket = unsafe { std::net::UdpSocket::from_raw_fd(fd) };
    std_socket.set_nonblocking(true)?;
    Ok(UdpSocket::from_std(std_socket)?)
}

fn tcp_listener_from_fd(fd: RawFd) -> Result<std::net::TcpListener> {
    // SAFETY: see `udp_socket_from_fd`.
    let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
    std_listener.set_nonblocking(true)?;
    Ok(std_listener)
}
