// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `session::packer` is tested against hand-rolled byte slices in its own
//! module; this exercises it against real builder output end to end,
//! dispatched through `ReplyPdu` the way `session::mod` itself does.

use eip_client_rs::{
    builders::cip as cip_builder,
    session::packer,
    wire::{
        cip,
        pdu::{ReplyPdu, ReplyView},
    },
};

#[test]
fn two_builder_requests_pack_and_unpack_through_reply_pdu() {
    let read_path = vec![0x91, 0x02, b'T', b'1'];
    let write_path = vec![0x91, 0x02, b'T', b'2'];

    let read_body = cip_builder::build_read_frag(&read_path, 1, 0).unwrap();
    let write_body = cip_builder::build_write(
        &write_path,
        &cip_builder::TypeDescriptor::Atomic(0xC4),
        1,
        &42i32.to_le_bytes(),
    )
    .unwrap();

    let packed_request = packer::build(&[&read_body, &write_body]).unwrap();
    assert_eq!(packed_request[0], cip::SVC_MULTIPLE_SERVICE_PACKET);

    let path_len = packed_request[1] as usize * 2;
    let packed_request_body = &packed_request[2 + path_len..];

    let mut read_reply_data = vec![0xC4, 0x00];
    read_reply_data.extend_from_slice(&7i32.to_le_bytes());
    let read_reply = [&[cip::reply_service(cip::SVC_CIP_READ_FRAG), 0, 0, 0][..], &read_reply_data].concat();
    let write_reply = vec![cip::reply_service(cip::SVC_CIP_WRITE), 0, 0, 0];

    let packed_reply_body = packer::build(&[&read_reply, &write_reply]).unwrap();
    let packed_reply_path_len = packed_reply_body[1] as usize * 2;
    let mut full_reply = vec![cip::reply_service(cip::SVC_MULTIPLE_SERVICE_PACKET), 0, 0, 0];
    full_reply.extend_from_slice(&packed_reply_body[2 + packed_reply_path_len..]);

    // The request side just confirms the packer produced a well-formed
    // MultipleServicePacket body; the reply side is what a real session
    // worker dispatches sub-replies from.
    assert!(!packed_request_body.is_empty());

    let pdu = ReplyPdu::parse(&full_reply).unwrap();
    let ReplyPdu::MultipleService(m) = &pdu else {
        panic!("expected a MultipleService reply, got {pdu:?}");
    };
    let subs = packer::unpack(m.sub_response_count, &m.offsets, m.data()).unwrap();
    assert_eq!(subs.len(), 2);

    let read_header = cip::parse_reply_header(subs[0]).unwrap();
    let frag = cip_builder::parse_read_reply(&read_header, true).unwrap();
    assert_eq!(frag.data, &7i32.to_le_bytes());

    let write_header = cip::parse_reply_header(subs[1]).unwrap();
    assert!(write_header.status().is_ok());
}
