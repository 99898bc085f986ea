// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bounded, non-blocking socket primitives used by the session worker (spec
//! §5 "Suspension points"): every read and write is attempted in 20ms
//! slices against a total deadline rather than blocking indefinitely, so
//! the worker can keep observing `terminating` and the request queue.

use std::{
    io::{self, Read, Write},
    net::TcpStream,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, bail};

/// Fallback slice to sleep between non-blocking I/O attempts when no
/// configured `RuntimeConfig::poll_slice` is at hand, e.g. in this module's
/// own tests (spec §5).
pub const POLL_SLICE: Duration = Duration::from_millis(20);

/// Connects to `addr`, bounded by `timeout`, and puts the resulting socket
/// into non-blocking mode for the rest of its life (spec §4.2 step 1-2).
pub fn connect(addr: std::net::SocketAddr, timeout: Duration) -> Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Writes the whole of `buf` to `stream`, retrying `WouldBlock` in
/// `poll_slice` increments until either the write completes or `deadline`
/// has passed.
pub fn write_all_bounded(
    stream: &mut TcpStream,
    buf: &[u8],
    timeout: Duration,
    poll_slice: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut written = 0usize;

    while written < buf.len() {
        match stream.write(&buf[written..]) {
            Ok(0) => bail!("connection closed during write"),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    bail!("write timed out");
                }
                thread::sleep(poll_slice);
            },
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Reads exactly `buf.len()` bytes from `stream`, retrying `WouldBlock` in
/// `poll_slice` increments until the buffer fills or `deadline` has passed.
pub fn read_exact_bounded(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Duration,
    poll_slice: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut read = 0usize;

    while read < buf.len() {
        match stream.read(&mut buf[read..]) {
            Ok(0) => bail!("connection closed during read"),
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    bail!("read timed out");
                }
                thread::sleep(poll_slice);
            },
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
