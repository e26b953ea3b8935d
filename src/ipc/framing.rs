//! Wire framing shared by both IPC channels.
//!
//! A message is a 4-byte big-endian JSON-header length, the JSON header
//! itself, a 4-byte big-endian payload length, and the raw payload bytes
//! (DNS wire data, mostly — kept outside the JSON so it's never re-encoded).
//! File descriptors ride alongside a message as an `SCM_RIGHTS` ancillary
//! message on the same `sendmsg`/`recvmsg` call, which is the only way unix
//! domain sockets pass fds between processes.

use std::os::fd::{AsRawFd, RawFd};

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::io::Interest;
use tokio::net::UnixStream;

use crate::error::{FrontendError, Result};

const MAX_HEADER_LEN: u32 = 1 << 20;
const MAX_PAYLOAD_LEN: u32 = 1 << 20;

pub async fn write_message<H: Serialize>(
    stream: &mut UnixStream,
    header: &H,
    payload: &[u8],
) -> Result<()> {
    let header_bytes =
        serde_json::to_vec(header).map_err(|e| FrontendError::Parse(e.to_string()))?;
    stream.write_u32(header_bytes.len() as u32).await?;
    stream.write_all(&header_bytes).await?;
    stream.write_u32(payload.len() as u32).await?;
    stream.write_all(payload).await?;
    Ok(())
}

pub async fn read_message<H: DeserializeOwned>(stream: &mut UnixStream) -> Result<(H, Vec<u8>)> {
    let header_len = stream.read_u32().await?;
    if header_len > MAX_HEADER_LEN {
        return Err(FrontendError::Parse("ipc header too large".into()));
    }
    let mut header_buf = vec![0u8; header_len as usize];
    stream.read_exact(&mut header_buf).await?;
    let header: H =
        serde_json::from_slice(&header_buf).map_err(|e| FrontendError::Parse(e.to_string()))?;

    let payload_len = stream.read_u32().await?;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(FrontendError::Parse("ipc payload too large".into()));
    }
    let mut payload = vec![0u8; payload_len as usize];
    stream.read_exact(&mut payload).await?;

    Ok((header, payload))
}

/// Send a single-byte marker message with `fd` attached as an `SCM_RIGHTS`
/// ancillary message.
pub async fn send_fd(stream: &UnixStream, fd: RawFd) -> Result<()> {
    loop {
        stream.writable().await?;
        match stream.try_io(Interest::WRITABLE, || send_fd_once(stream.as_raw_fd(), fd)) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Receive a marker message carrying one `SCM_RIGHTS` fd.
pub async fn recv_fd(stream: &UnixStream) -> Result<RawFd> {
    loop {
        stream.readable().await?;
        match stream.try_io(Interest::READABLE, || recv_fd_once(stream.as_raw_fd())) {
            Ok(fd) => return Ok(fd),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn send_fd_once(socket_fd: RawFd, fd: RawFd) -> std::io::Result<()> {
    let marker = [0u8; 1];
    let iov = libc::iovec {
        iov_base: marker.as_ptr() as *mut libc::c_void,
        iov_len: marker.len(),
    };

    let mut cmsg_buf = vec![0u8; unsafe { libc::CMSG_SPACE(std::mem::size_of::<RawFd>() as u32) } as usize];

    // SAFETY: `msg` is a plain-old-data struct zero-initialized and then
    // populated field by field before being passed to `sendmsg`; the
    // pointers it holds (`iov`, `cmsg_buf`) outlive the call.
    unsafe {
        let mut msg: libc::msghdr = std::mem::zeroed();
        msg.msg_iov = &iov as *const _ as *mut _;
        msg.msg_iovlen = 1;
        msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = cmsg_buf.len() as _;

        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null() {
            return Err(std::io::Error::other("cmsg buffer too small"));
        }
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(std::mem::size_of::<RawFd>() as u32) as _;
        std::ptr::write(libc::CMSG_DATA(cmsg) as *mut RawFd, fd);

        let n = libc::sendmsg(socket_fd, &msg, 0);
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn recv_fd_once(socket_fd: RawFd) -> std::io::Result<RawFd> {
    let mut marker = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: marker.as_mut_ptr() as *mut libc::c_void,
        iov_len: marker.len(),
    };

    let mut cmsg_buf = vec![0u8; unsafe { libc::CMSG_SPACE(std::mem::size_of::<RawFd>() as u32) } as usize];

    // SAFETY: see `send_fd_once`; `recvmsg` only writes into buffers we own
    // for the duration of the call.
    unsafe {
        let mut msg: libc::msghdr = std::mem::zeroed();
        msg.msg_iov = &mut iov as *mut _;
        msg.msg_iovlen = 1;
        msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = cmsg_buf.len() as _;

        let n = libc::recvmsg(socket_fd, &mut msg, 0);
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null() || (*cmsg).cmsg_type != libc::SCM_RIGHTS {
            return Err(std::io::Error::other("no fd attached to ipc message"));
        }
        let fd = std::ptr::read(libc::CMSG_DATA(cmsg) as *const RawFd);
        Ok(fd)
    }
}
