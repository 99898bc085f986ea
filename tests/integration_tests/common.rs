// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Loopback mock-PLC helpers.
//!
//! The teacher's integration tests (`tests/integration_tests/common.rs`)
//! dial a real external target over `tokio`. A [`crate::session::Session`]
//! here is a blocking worker thread with no async runtime and no live PLC to
//! reach, so these helpers script the other end of the TCP connection on a
//! plain [`std::thread`] instead: bind an ephemeral port, accept exactly one
//! connection, and hand it to a scripted handler that reads/writes raw EIP
//! frames.

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    thread::{self, JoinHandle},
};

use eip_client_rs::{
    cfg::{
        config::{AUTO_DISCONNECT_NEVER, Attributes, RuntimeConfig},
        enums::{AutoBool, PlcKind},
    },
    wire::{cip, cpf, encap},
};

/// Binds an ephemeral loopback port, accepts exactly one connection, and
/// runs `handler` against it on a dedicated thread. Returns the address to
/// dial plus a handle the test can join once it is done driving its Session.
pub fn spawn_mock_plc<F>(handler: F) -> (String, JoinHandle<()>)
where F: FnOnce(TcpStream) + Send + 'static {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock PLC listener");
    let addr = listener.local_addr().expect("mock PLC local addr");

    let join = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("mock PLC accept");
        stream.set_nodelay(true).ok();
        handler(stream);
    });

    (addr.to_string(), join)
}

/// Reads one EIP encapsulation frame (header + body) off `stream`.
pub fn read_frame(stream: &mut TcpStream) -> (encap::EncapHeader, Vec<u8>) {
    let mut header_buf = [0u8; encap::ENCAP_HEADER_LEN];
    stream.read_exact(&mut header_buf).expect("read EIP header");
    let header = encap::EncapHeader::from_bytes(&header_buf).expect("parse EIP header");
    let mut body = vec![0u8; header.length.get() as usize];
    stream.read_exact(&mut body).expect("read EIP body");
    (header, body)
}

/// Writes one EIP encapsulation frame wrapping `body`.
pub fn write_frame(
    stream: &mut TcpStream,
    command: encap::Command,
    session_handle: u32,
    sender_context: u64,
    body: &[u8],
) {
    let header = encap::EncapHeader::new(command, body.len() as u16, session_handle, sender_context);
    let mut wire = header.to_vec();
    wire.extend_from_slice(body);
    stream.write_all(&wire).expect("write EIP frame");
}

/// Reads a `RegisterSession` request and replies with `session_handle`
/// assigned, echoing the request body back (spec §4.2 step 3).
pub fn serve_register_session(stream: &mut TcpStream, session_handle: u32) {
    let (header, body) = read_frame(stream);
    assert_eq!(header.command(), Some(encap::Command::RegisterSession));
    write_frame(stream, encap::Command::RegisterSession, session_handle, 0, &body);
}

/// A decoded ForwardOpen request, enough of it to build a matching success
/// reply (spec §4.1 ForwardOpen body layout, common prefix shared by the
/// classic and extended forms).
pub struct DecodedForwardOpen {
    pub request_service: u8,
    pub orig_to_targ_connection_id: u32,
    pub connection_serial_number: u16,
    pub originator_vendor_id: u16,
    pub originator_serial: u32,
}

/// Reads one `SendRrData` frame carrying a ForwardOpen request and decodes
/// the fields a reply needs to echo.
pub fn read_forward_open(stream: &mut TcpStream) -> DecodedForwardOpen {
    let (header, body) = read_frame(stream);
    assert_eq!(header.command(), Some(encap::Command::SendRrData));
    let payload = cpf::decode_unconnected(&body).expect("decode ForwardOpen CPF");
    let cip_body = payload.cip_body;

    // Common prefix up to the connection path (always 0x20 0x06 0x24 0x01,
    // 4 bytes) is identical for 0x54 and 0x5B (spec §4.1).
    DecodedForwardOpen {
        request_service: cip_body[0],
        orig_to_targ_connection_id: u32::from_le_bytes(cip_body[8..12].try_into().unwrap()),
        connection_serial_number: u16::from_le_bytes(cip_body[16..18].try_into().unwrap()),
        originator_vendor_id: u16::from_le_bytes(cip_body[18..20].try_into().unwrap()),
        originator_serial: u32::from_le_bytes(cip_body[20..24].try_into().unwrap()),
    }
}

/// Builds a ForwardOpen success reply body (spec §4.1
/// `parse_forward_open_success` layout) and replies over `stream` as a
/// `SendRrData` frame.
pub fn reply_forward_open_success(
    stream: &mut TcpStream,
    session_handle: u32,
    fo: &DecodedForwardOpen,
    targ_to_orig_connection_id: u32,
) {
    let mut data = Vec::new();
    data.extend_from_slice(&fo.orig_to_targ_connection_id.to_le_bytes());
    data.extend_from_slice(&targ_to_orig_connection_id.to_le_bytes());
    data.extend_from_slice(&fo.connection_serial_number.to_le_bytes());
    data.extend_from_slice(&fo.originator_vendor_id.to_le_bytes());
    data.extend_from_slice(&fo.originator_serial.to_le_bytes());

    let cip_reply = cip_success_reply(fo.request_service, &data);
    let cpf_body = cpf::encode_unconnected(0, &cip_reply);
    write_frame(stream, encap::Command::SendRrData, session_handle, 0, &cpf_body);
}

/// Builds a ForwardOpen failure reply carrying an extended status (spec
/// §4.2 step 4), e.g. "invalid connection size" with the size the target
/// will accept.
pub fn reply_forward_open_extended_error(
    stream: &mut TcpStream,
    session_handle: u32,
    fo: &DecodedForwardOpen,
    extended_status: u16,
    trailing_word: u16,
) {
    let mut reply = vec![cip::reply_service(fo.request_service), 0x00, 0x01, 0x02];
    reply.extend_from_slice(&extended_status.to_le_bytes());
    reply.extend_from_slice(&trailing_word.to_le_bytes());

    let cpf_body = cpf::encode_unconnected(0, &reply);
    write_frame(stream, encap::Command::SendRrData, session_handle, 0, &cpf_body);
}

/// Builds a plain success CIP reply: reply service, status 0, no extended
/// status, `data` as the payload.
pub fn cip_success_reply(request_service: u8, data: &[u8]) -> Vec<u8> {
    let mut out = vec![cip::reply_service(request_service), 0x00, 0x00, 0x00];
    out.extend_from_slice(data);
    out
}

/// Reads one unconnected (`SendRrData`) request and returns its header plus
/// decoded CIP body.
pub fn read_unconnected_request(stream: &mut TcpStream) -> (encap::EncapHeader, Vec<u8>) {
    let (header, body) = read_frame(stream);
    assert_eq!(header.command(), Some(encap::Command::SendRrData));
    let payload = cpf::decode_unconnected(&body).expect("decode unconnected CPF");
    (header, payload.cip_body.to_vec())
}

/// Replies to an unconnected request, echoing the session handle and sender
/// context the in-flight request is matched against (spec §4.2
/// "Demultiplexing rule").
pub fn reply_unconnected(
    stream: &mut TcpStream,
    session_handle: u32,
    sender_context: u64,
    cip_reply: &[u8],
) {
    let cpf_body = cpf::encode_unconnected(0, cip_reply);
    write_frame(stream, encap::Command::SendRrData, session_handle, sender_context, &cpf_body);
}

/// Reads one unconnected request that is itself wrapped in an
/// `UnconnectedSend` envelope (spec §4.1), and returns the route path bytes
/// alongside the embedded CIP body.
pub fn read_unconnected_routed_request(stream: &mut TcpStream) -> (encap::EncapHeader, Vec<u8>) {
    let (header, body) = read_frame(stream);
    assert_eq!(header.command(), Some(encap::Command::SendRrData));
    let payload = cpf::decode_unconnected(&body).expect("decode unconnected CPF");
    assert_eq!(payload.cip_body[0], cip::SVC_UNCONNECTED_SEND);
    let path_words = payload.cip_body[1] as usize;
    let unconnected_send_body = &payload.cip_body[2 + path_words * 2..];
    let embedded = eip_client_rs::wire::unconnected_send::parse_embedded(unconnected_send_body)
        .expect("decode UnconnectedSend embedded body");
    (header, embedded.to_vec())
}

/// Reads one connected (`SendUnitData`) request and returns the connection
/// id it carried, the connection sequence number, and the decoded CIP body.
pub fn read_connected_request(stream: &mut TcpStream) -> (u32, u16, Vec<u8>) {
    let (header, body) = read_frame(stream);
    assert_eq!(header.command(), Some(encap::Command::SendUnitData));
    let payload = cpf::decode_connected(&body).expect("decode connected CPF");
    (payload.target_connection_id, payload.connection_seq, payload.cip_body.to_vec())
}

/// Replies to a connected request over the T->O connection id (spec §4.1 —
/// the Connected Address Item on an incoming reply carries the id the
/// target itself assigned during ForwardOpen).
pub fn reply_connected(
    stream: &mut TcpStream,
    session_handle: u32,
    targ_to_orig_connection_id: u32,
    connection_seq: u16,
    cip_reply: &[u8],
) {
    let cpf_body = cpf::encode_connected(targ_to_orig_connection_id, connection_seq, cip_reply);
    write_frame(stream, encap::Command::SendUnitData, session_handle, 0, &cpf_body);
}

/// `Attributes` for a Logix target that negotiates a CIP connection.
pub fn connected_attributes(gateway: &str) -> Attributes {
    Attributes {
        gateway: gateway.to_string(),
        path: "1,0".to_string(),
        connection_group_id: 0,
        use_connected_msg: AutoBool::Auto,
        share_session: false,
        auto_disconnect_ms: AUTO_DISCONNECT_NEVER,
        cpu: PlcKind::Logix,
    }
}

/// `Attributes` for a Micro800 target, which talks unconnected messaging by
/// default and needs no routing path.
pub fn unconnected_attributes(gateway: &str) -> Attributes {
    Attributes {
        gateway: gateway.to_string(),
        path: String::new(),
        connection_group_id: 0,
        use_connected_msg: AutoBool::Auto,
        share_session: false,
        auto_disconnect_ms: AUTO_DISCONNECT_NEVER,
        cpu: PlcKind::Micro800,
    }
}

/// `Attributes` for a Logix target reached through a backplane hop with
/// connected messaging forced off, so every request rides an
/// `UnconnectedSend` envelope addressed over `path` (spec §4.1).
pub fn unconnected_routed_attributes(gateway: &str) -> Attributes {
    Attributes {
        gateway: gateway.to_string(),
        path: "1,0".to_string(),
        connection_group_id: 0,
        use_connected_msg: AutoBool::No,
        share_session: false,
        auto_disconnect_ms: AUTO_DISCONNECT_NEVER,
        cpu: PlcKind::Logix,
    }
}

/// `Attributes` for a PLC-5 target, which talks PCCC envelopes but still
/// negotiates a CIP connection by default.
pub fn pccc_attributes(gateway: &str) -> Attributes {
    Attributes {
        gateway: gateway.to_string(),
        path: "1,0".to_string(),
        connection_group_id: 0,
        use_connected_msg: AutoBool::Auto,
        share_session: false,
        auto_disconnect_ms: AUTO_DISCONNECT_NEVER,
        cpu: PlcKind::Plc5,
    }
}

/// Runtime config with tight timeouts, so a test that expects a transport
/// failure does not sit around for the production defaults.
pub fn fast_runtime() -> RuntimeConfig {
    RuntimeConfig {
        max_sessions: 64,
        timeout_connect: std::time::Duration::from_millis(500),
        timeout_request: std::time::Duration::from_secs(2),
        timeout_forward_close: std::time::Duration::from_millis(150),
        poll_slice: std::time::Duration::from_millis(10),
        retry_wait: std::time::Duration::from_secs(1),
    }
}

/// Polls `handle.status()` until it is terminal or `attempts` have passed,
/// sleeping `step` between polls. Avoids a hard `thread::sleep` block while
/// still bounding how long a test can wait on the worker thread.
pub fn wait_for_terminal(
    handle: &eip_client_rs::request::RequestHandle,
    attempts: u32,
    step: std::time::Duration,
) -> eip_client_rs::request::RequestStatus {
    for _ in 0..attempts {
        let status = handle.status();
        if status.is_terminal() {
            return status;
        }
        thread::sleep(step);
    }
    handle.status()
}
