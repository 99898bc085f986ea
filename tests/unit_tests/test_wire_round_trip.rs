// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A `CipReadFrag` request built by `builders::cip`, wrapped in an
//! unconnected EIP frame, parsed back out the other end the way a real
//! wire capture would be, and its matching reply parsed back into a
//! `ReadFragment` (spec §4.1 + §4.4 combined, which no single module's own
//! tests exercise end to end).

use eip_client_rs::{
    builders::cip as cip_builder,
    wire::{cip, cpf, encap},
};

#[test]
fn read_frag_request_and_reply_round_trip_through_the_wire() {
    let path = vec![0x91, 0x04, b'T', b'a', b'g', 0x00];
    let body = cip_builder::build_read_frag(&path, 5, 0).unwrap();

    let cpf_body = cpf::encode_unconnected(0, &body);
    let header = encap::EncapHeader::new(encap::Command::SendRrData, cpf_body.len() as u16, 0x1001, 7);
    let mut wire = header.to_vec();
    wire.extend_from_slice(&cpf_body);

    let (header_bytes, rest) = wire.split_at(encap::ENCAP_HEADER_LEN);
    let parsed_header = encap::EncapHeader::from_bytes(header_bytes).unwrap();
    assert_eq!(parsed_header.command(), Some(encap::Command::SendRrData));
    assert_eq!(parsed_header.length.get() as usize, rest.len());

    let payload = cpf::decode_unconnected(rest).unwrap();
    assert_eq!(payload.cip_body, &body[..]);
    assert_eq!(payload.cip_body[0], cip::SVC_CIP_READ_FRAG);

    let mut reply_data = vec![0xC4, 0x00];
    reply_data.extend_from_slice(&1234i32.to_le_bytes());
    let reply = [&[cip::reply_service(cip::SVC_CIP_READ_FRAG), 0x00, 0x00, 0x00][..], &reply_data].concat();

    let reply_header = cip::parse_reply_header(&reply).unwrap();
    let frag = cip_builder::parse_read_reply(&reply_header, true).unwrap();
    assert!(frag.complete);
    assert_eq!(frag.data, &1234i32.to_le_bytes());
}
