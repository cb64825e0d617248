//! Thin safe wrappers over the system resolver.
//!
//! `getaddrinfo` is used instead of `ToSocketAddrs` because services may be
//! given by name (`"localhost http"`) and listening needs the passive wildcard
//! addresses for every family the host supports.

use std::ffi::{CStr, CString};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use socket2::SockAddr;

const HOST_BUF_LEN: usize = 1025;
const SERVICE_BUF_LEN: usize = 80;
const HOSTNAME_BUF_LEN: usize = 256;

/// Resolve `host`/`service` into stream-socket addresses, in resolver order.
///
/// With `passive` set and no host, the wildcard addresses suitable for binding
/// are returned (typically `0.0.0.0` and `::`).
pub fn resolve(host: Option<&str>, service: &str, passive: bool) -> io::Result<Vec<SocketAddr>> {
    let host = host.map(c_string).transpose()?;
    let service = c_string(service)?;

    // SAFETY: an all-zero `addrinfo` is the documented "no hints" value; the
    // fields we need are set below.
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_STREAM;
    if passive {
        hints.ai_flags = libc::AI_PASSIVE;
    }

    let mut head: *mut libc::addrinfo = std::ptr::null_mut();
    // SAFETY: host/service are valid NUL-terminated strings (or null for the
    // host), `hints` is initialized and `head` is a valid out-pointer.
    let rc = unsafe {
        libc::getaddrinfo(
            host.as_ref().map_or(std::ptr::null(), |h| h.as_ptr()),
            service.as_ptr(),
            &hints,
            &mut head,
        )
    };
    if rc != 0 {
        return Err(gai_error(rc));
    }

    let mut addrs = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` walks the list returned by a successful getaddrinfo
        // call, which stays valid until freeaddrinfo below.
        let info = unsafe { &*cursor };
        // SAFETY: `ai_addr` points at `ai_addrlen` bytes owned by the list.
        if let Some(addr) = unsafe { sockaddr_to_std(info.ai_addr, info.ai_addrlen) } {
            if !addrs.contains(&addr) {
                addrs.push(addr);
            }
        }
        cursor = info.ai_next;
    }
    // SAFETY: `head` came from getaddrinfo and is freed exactly once.
    unsafe { libc::freeaddrinfo(head) };

    Ok(addrs)
}

/// Reverse-resolve a socket address into `(host, service)` text.
pub fn name_info(addr: &SocketAddr, numeric: bool) -> io::Result<(String, String)> {
    let sock_addr = SockAddr::from(*addr);
    let mut host = [0 as libc::c_char; HOST_BUF_LEN];
    let mut service = [0 as libc::c_char; SERVICE_BUF_LEN];
    let flags = if numeric {
        libc::NI_NUMERICHOST | libc::NI_NUMERICSERV
    } else {
        0
    };

    // SAFETY: `sock_addr` is a valid socket address of `len()` bytes and both
    // output buffers are writable for the lengths passed.
    let rc = unsafe {
        libc::getnameinfo(
            sock_addr.as_ptr(),
            sock_addr.len(),
            host.as_mut_ptr(),
            HOST_BUF_LEN as libc::socklen_t,
            service.as_mut_ptr(),
            SERVICE_BUF_LEN as libc::socklen_t,
            flags,
        )
    };
    if rc != 0 {
        return Err(gai_error(rc));
    }

    // SAFETY: getnameinfo NUL-terminates both buffers on success.
    let (host, service) = unsafe {
        (
            CStr::from_ptr(host.as_ptr()).to_string_lossy().into_owned(),
            CStr::from_ptr(service.as_ptr()).to_string_lossy().into_owned(),
        )
    };
    Ok((host, service))
}

/// The name of the local host.
pub fn hostname() -> io::Result<String> {
    let mut buf = [0u8; HOSTNAME_BUF_LEN];
    // SAFETY: `buf` is writable for `buf.len()` bytes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

fn c_string(value: &str) -> io::Result<CString> {
    CString::new(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains a NUL byte"))
}

fn gai_error(rc: libc::c_int) -> io::Error {
    if rc == libc::EAI_SYSTEM {
        return io::Error::last_os_error();
    }
    // SAFETY: gai_strerror returns a pointer to a static NUL-terminated string.
    let message = unsafe { CStr::from_ptr(libc::gai_strerror(rc)) };
    io::Error::other(format!("resolver: {}", message.to_string_lossy()))
}

/// # Safety
///
/// `addr` must be null or point at `len` readable bytes of a socket address.
unsafe fn sockaddr_to_std(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<SocketAddr> {
    if addr.is_null() {
        return None;
    }
    let len = len as usize;
    match i32::from((*addr).sa_family) {
        libc::AF_INET if len >= std::mem::size_of::<libc::sockaddr_in>() => {
            let sin = std::ptr::read_unaligned(addr.cast::<libc::sockaddr_in>());
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        libc::AF_INET6 if len >= std::mem::size_of::<libc::sockaddr_in6>() => {
            let sin6 = std::ptr::read_unaligned(addr.cast::<libc::sockaddr_in6>());
            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}
