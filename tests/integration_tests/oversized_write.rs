// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A write too large for one packet goes out as two `CipWriteFrag` requests
//! (spec §4.4 "CIP write"; scenario S3). Each fragment is its own
//! `Session` request — continuation is the caller's job, driven by the
//! `0x06` (fragmented transfer in progress) general status on the first
//! reply.

use std::time::Duration;

use eip_client_rs::{
    builders::cip::{self as cip_builder, TypeDescriptor},
    request::RequestStatus,
    session::Session,
    wire::cip,
};

use crate::integration_tests::common::*;

#[test]
fn write_frag_continues_after_fragmented_status() {
    let session_handle = 0x9191;
    let targ_to_orig_connection_id = 0xABCD_0005;

    let (addr, server) = spawn_mock_plc(move |mut stream| {
        serve_register_session(&mut stream, session_handle);

        let fo = read_forward_open(&mut stream);
        reply_forward_open_success(&mut stream, session_handle, &fo, targ_to_orig_connection_id);

        let (_, connection_seq, first) = read_connected_request(&mut stream);
        assert_eq!(first[0], cip::SVC_CIP_WRITE_FRAG);
        let reply = vec![cip::reply_service(cip::SVC_CIP_WRITE_FRAG), 0x00, cip::STATUS_FRAGMENTED, 0x00];
        reply_connected(&mut stream, session_handle, targ_to_orig_connection_id, connection_seq, &reply);

        let (_, connection_seq, second) = read_connected_request(&mut stream);
        assert_eq!(second[0], cip::SVC_CIP_WRITE_FRAG);
        // Byte offset follows service/path-size/path/type-descriptor/element-count.
        let path_len = second[1] as usize * 2;
        let offset_start = 2 + path_len + 2 + 2;
        let offset = u32::from_le_bytes(second[offset_start..offset_start + 4].try_into().unwrap());
        assert_eq!(offset, 200, "second fragment must resume at the first fragment's byte offset");
        let reply = cip_success_reply(cip::SVC_CIP_WRITE_FRAG, &[]);
        reply_connected(&mut stream, session_handle, targ_to_orig_connection_id, connection_seq, &reply);
    });

    let session = Session::spawn(connected_attributes(&addr), fast_runtime()).unwrap();

    let path = vec![0x91, 0x08, b'B', b'i', b'g', b'T', b'a', b'g', 0, 0];
    let descriptor = TypeDescriptor::Atomic(0xC4);
    let data = vec![0xAAu8; 400];

    let first_chunk = &data[..200];
    let body_a = cip_builder::build_write_frag(&path, &descriptor, 100, 0, first_chunk).unwrap();
    let handle_a = session.create_request(1, body_a, false);
    session.add_request(&handle_a).unwrap();
    let status_a = wait_for_terminal(&handle_a, 200, Duration::from_millis(20));
    assert_eq!(status_a, RequestStatus::Complete);
    let reply_a = handle_a.body();
    assert_eq!(cip::parse_reply_header(&reply_a).unwrap().general_status, cip::STATUS_FRAGMENTED);

    let second_chunk = &data[200..];
    let body_b = cip_builder::build_write_frag(&path, &descriptor, 100, 200, second_chunk).unwrap();
    let handle_b = session.create_request(2, body_b, false);
    session.add_request(&handle_b).unwrap();
    let status_b = wait_for_terminal(&handle_b, 200, Duration::from_millis(20));
    assert_eq!(status_b, RequestStatus::Complete);
    let reply_b = handle_b.body();
    assert_eq!(cip::parse_reply_header(&reply_b).unwrap().general_status, 0);

    session.shutdown();
    server.join().unwrap();
}
