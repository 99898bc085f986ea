// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A Micro800 target never negotiates a CIP connection by default (spec
//! §6): every request rides an unconnected `SendRrData` envelope straight
//! from `Registering` to `Idle`.

use std::time::Duration;

use eip_client_rs::{builders::cip as cip_builder, request::RequestStatus, session::Session, wire::cip};

use crate::integration_tests::common::*;

#[test]
fn single_unconnected_read_completes() {
    let session_handle = 0x4242;

    let (addr, server) = spawn_mock_plc(move |mut stream| {
        serve_register_session(&mut stream, session_handle);

        let (header, cip_body) = read_unconnected_request(&mut stream);
        assert_eq!(cip_body[0], cip::SVC_CIP_READ_FRAG);

        let mut data = vec![0xC4, 0x00]; // DINT type descriptor
        data.extend_from_slice(&7i32.to_le_bytes());
        let cip_reply = cip_success_reply(cip::SVC_CIP_READ_FRAG, &data);
        reply_unconnected(&mut stream, session_handle, header.sender_context.get(), &cip_reply);
    });

    let session = Session::spawn(unconnected_attributes(&addr), fast_runtime()).unwrap();

    let path = vec![0x91, 0x04, b'T', b'a', b'g', 0x00];
    let body = cip_builder::build_read_frag(&path, 1, 0).unwrap();
    let handle = session.create_request(1, body, false);
    session.add_request(&handle).unwrap();

    let status = wait_for_terminal(&handle, 200, Duration::from_millis(20));
    assert_eq!(status, RequestStatus::Complete);

    let reply = handle.body();
    assert_eq!(reply[0], cip::reply_service(cip::SVC_CIP_READ_FRAG));
    let frag = cip_builder::parse_read_reply(&cip::parse_reply_header(&reply).unwrap(), true).unwrap();
    assert_eq!(frag.data, &7i32.to_le_bytes());

    session.shutdown();
    server.join().unwrap();
}
