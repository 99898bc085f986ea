// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Two requests queued before the worker ever reaches `ProcessRequests` are
//! combined into one `MultipleServicePacket` (spec §4.3; scenario S2).

use std::time::Duration;

use eip_client_rs::{
    builders::cip as cip_builder,
    request::RequestStatus,
    session::Session,
    wire::{cip, pdu::ReplyView},
};

use crate::integration_tests::common::*;

#[test]
fn two_packable_reads_are_sent_as_one_multiple_service_packet() {
    let session_handle = 0x9000;
    let targ_to_orig_connection_id = 0xCAFE_0002;

    let (addr, server) = spawn_mock_plc(move |mut stream| {
        serve_register_session(&mut stream, session_handle);

        let fo = read_forward_open(&mut stream);
        reply_forward_open_success(&mut stream, session_handle, &fo, targ_to_orig_connection_id);

        let (target_connection_id, connection_seq, cip_body) = read_connected_request(&mut stream);
        assert_eq!(target_connection_id, fo.orig_to_targ_connection_id);
        assert_eq!(cip_body[0], cip::SVC_MULTIPLE_SERVICE_PACKET);

        let pdu = eip_client_rs::wire::pdu::ReplyPdu::parse(&cip::parse_reply_header(&{
            // The MultipleServicePacket request body itself has no CIP reply
            // framing; re-wrap it as one so `ReplyPdu::parse` can walk the
            // same offset table logic used to *build* it, for the purpose
            // of locating the two sub-request bodies we must answer.
            let mut framed = vec![cip::reply_service(cip::SVC_MULTIPLE_SERVICE_PACKET), 0, 0, 0];
            let path_len = cip_body[1] as usize * 2;
            framed.extend_from_slice(&cip_body[2 + path_len..]);
            framed
        })
        .unwrap())
        .unwrap();
        let sub_bodies = match &pdu {
            eip_client_rs::wire::pdu::ReplyPdu::MultipleService(m) => {
                eip_client_rs::session::packer::unpack(m.sub_response_count, &m.offsets, m.data()).unwrap()
            },
            other => panic!("expected MultipleService framing, got {other:?}"),
        };
        assert_eq!(sub_bodies.len(), 2);
        assert_eq!(sub_bodies[0][0], cip::SVC_CIP_READ_FRAG);
        assert_eq!(sub_bodies[1][0], cip::SVC_CIP_READ_FRAG);

        let mut reply_a = vec![0xC4, 0x00];
        reply_a.extend_from_slice(&1i32.to_le_bytes());
        let mut reply_b = vec![0xC4, 0x00];
        reply_b.extend_from_slice(&2i32.to_le_bytes());
        let sub_a = cip_success_reply(cip::SVC_CIP_READ_FRAG, &reply_a);
        let sub_b = cip_success_reply(cip::SVC_CIP_READ_FRAG, &reply_b);
        let packed = eip_client_rs::session::packer::build(&[&sub_a, &sub_b]).unwrap();
        // `packer::build` returns a full CIP request header; the reply only
        // needs the MultipleServicePacket body (count + offsets + subs).
        let path_len = packed[1] as usize * 2;
        let packed_body = &packed[2 + path_len..];
        let cip_reply = cip_success_reply(cip::SVC_MULTIPLE_SERVICE_PACKET, packed_body);

        reply_connected(&mut stream, session_handle, targ_to_orig_connection_id, connection_seq, &cip_reply);
    });

    let session = Session::spawn(connected_attributes(&addr), fast_runtime()).unwrap();

    let path_a = vec![0x91, 0x02, b'T', b'1'];
    let path_b = vec![0x91, 0x02, b'T', b'2'];
    let body_a = cip_builder::build_read_frag(&path_a, 1, 0).unwrap();
    let body_b = cip_builder::build_read_frag(&path_b, 1, 0).unwrap();

    let handle_a = session.create_request(1, body_a, true);
    let handle_b = session.create_request(2, body_b, true);
    session.add_request(&handle_a).unwrap();
    session.add_request(&handle_b).unwrap();

    let status_a = wait_for_terminal(&handle_a, 200, Duration::from_millis(20));
    let status_b = wait_for_terminal(&handle_b, 200, Duration::from_millis(20));
    assert_eq!(status_a, RequestStatus::Complete);
    assert_eq!(status_b, RequestStatus::Complete);

    let reply_a = handle_a.body();
    let reply_b = handle_b.body();
    let frag_a = cip_builder::parse_read_reply(&cip::parse_reply_header(&reply_a).unwrap(), true).unwrap();
    let frag_b = cip_builder::parse_read_reply(&cip::parse_reply_header(&reply_b).unwrap(), true).unwrap();
    assert_eq!(frag_a.data, &1i32.to_le_bytes());
    assert_eq!(frag_b.data, &2i32.to_le_bytes());

    session.shutdown();
    server.join().unwrap();
}
