// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A PLC-5 target still negotiates a CIP connection (its `default_use_connected_msg`
//! is true) but carries a PCCC typed-read command inside `ExecutePCCC` rather
//! than a native CIP read (spec §4.4; scenario S4).

use std::time::Duration;

use eip_client_rs::{
    builders::pccc::{self as pccc_builder, PcccIdentity},
    request::RequestStatus,
    session::Session,
    wire::{cip, pccc},
};

use crate::integration_tests::common::*;

#[test]
fn pccc_typed_read_over_connected_session_completes() {
    let session_handle = 0x5ABC;
    let targ_to_orig_connection_id = 0xF00D_0004;

    let (addr, server) = spawn_mock_plc(move |mut stream| {
        serve_register_session(&mut stream, session_handle);

        let fo = read_forward_open(&mut stream);
        reply_forward_open_success(&mut stream, session_handle, &fo, targ_to_orig_connection_id);

        let (target_connection_id, connection_seq, cip_body) = read_connected_request(&mut stream);
        assert_eq!(target_connection_id, fo.orig_to_targ_connection_id);
        assert_eq!(cip_body[0], cip::SVC_EXECUTE_PCCC);

        let path = pccc_builder::pccc_object_path();
        let envelope = &cip_body[2 + path.len()..];
        assert_eq!(envelope[0], 7); // request-id size
        let vendor_id = u16::from_le_bytes([envelope[1], envelope[2]]);
        let sequence = u16::from_le_bytes([envelope[7], envelope[8]]);
        assert_eq!(vendor_id, 0x001E);
        assert_eq!(envelope[9], pccc::FN_TYPED_READ);

        let mut reply_envelope = vec![7u8];
        reply_envelope.extend_from_slice(&0x001Eu16.to_le_bytes());
        reply_envelope.extend_from_slice(&0xCAFE_BABEu32.to_le_bytes());
        reply_envelope.push(pccc::PCCC_COMMAND_EXECUTE);
        reply_envelope.push(0); // status: success
        reply_envelope.extend_from_slice(&sequence.to_le_bytes());
        reply_envelope.extend_from_slice(&321i16.to_le_bytes());

        let cip_reply = cip_success_reply(cip::SVC_EXECUTE_PCCC, &reply_envelope);
        reply_connected(&mut stream, session_handle, targ_to_orig_connection_id, connection_seq, &cip_reply);
    });

    let session = Session::spawn(pccc_attributes(&addr), fast_runtime()).unwrap();

    let identity = PcccIdentity { vendor_id: 0x001E, vendor_serial: 0xCAFE_BABE, sequence: 1 };
    let body = pccc_builder::build_typed_read(identity, None, b"N7:10", 1).unwrap();
    let handle = session.create_request(1, body, false);
    session.add_request(&handle).unwrap();

    let status = wait_for_terminal(&handle, 200, Duration::from_millis(20));
    assert_eq!(status, RequestStatus::Complete);

    let reply = handle.body();
    let header = cip::parse_reply_header(&reply).unwrap();
    let parsed = pccc::parse_reply(header.data).unwrap();
    assert_eq!(parsed.status, 0);
    assert_eq!(parsed.data, &321i16.to_le_bytes());

    session.shutdown();
    server.join().unwrap();
}
