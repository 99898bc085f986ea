// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A Logix target negotiates a CIP connection before its first request
//! (spec §4.2 steps 3-4; scenario S1): RegisterSession, ForwardOpen, then a
//! connected read over `SendUnitData`.

use std::time::Duration;

use eip_client_rs::{builders::cip as cip_builder, request::RequestStatus, session::Session, wire::cip};

use crate::integration_tests::common::*;

#[test]
fn forward_open_then_connected_read_completes() {
    let session_handle = 0x7171;
    let targ_to_orig_connection_id = 0xBEEF_0001;

    let (addr, server) = spawn_mock_plc(move |mut stream| {
        serve_register_session(&mut stream, session_handle);

        let fo = read_forward_open(&mut stream);
        reply_forward_open_success(&mut stream, session_handle, &fo, targ_to_orig_connection_id);

        let (target_connection_id, connection_seq, cip_body) = read_connected_request(&mut stream);
        assert_eq!(target_connection_id, fo.orig_to_targ_connection_id);
        assert_eq!(connection_seq, 1);
        assert_eq!(cip_body[0], cip::SVC_CIP_READ_FRAG);

        let mut data = vec![0xC4, 0x00]; // DINT type descriptor
        data.extend_from_slice(&99i32.to_le_bytes());
        let cip_reply = cip_success_reply(cip::SVC_CIP_READ_FRAG, &data);
        reply_connected(&mut stream, session_handle, targ_to_orig_connection_id, connection_seq, &cip_reply);
    });

    let session = Session::spawn(connected_attributes(&addr), fast_runtime()).unwrap();

    let path = vec![0x91, 0x06, b'C', b'o', b'u', b'n', b't', b'r'];
    let body = cip_builder::build_read_frag(&path, 1, 0).unwrap();
    let handle = session.create_request(1, body, false);
    session.add_request(&handle).unwrap();

    let status = wait_for_terminal(&handle, 200, Duration::from_millis(20));
    assert_eq!(status, RequestStatus::Complete);

    let reply = handle.body();
    let frag = cip_builder::parse_read_reply(&cip::parse_reply_header(&reply).unwrap(), true).unwrap();
    assert_eq!(frag.data, &99i32.to_le_bytes());

    session.shutdown();
    server.join().unwrap();
}
