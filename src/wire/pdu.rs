// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Dispatches a parsed CIP reply to a typed view keyed by reply service
//! code, the way the teacher's `models::parse::Pdu` dispatches an iSCSI BHS
//! by opcode byte.

use anyhow::{Result, bail};
use enum_dispatch::enum_dispatch;

use crate::error::ForwardOpenExtendedStatus;
use crate::wire::{
    cip::{self, CipReplyHeader, parse_reply_header},
    forward_open::{self, ForwardOpenReply},
};

/// Common accessors every reply view exposes regardless of which service it
/// answers.
#[enum_dispatch]
pub trait ReplyView {
    fn reply_service(&self) -> u8;
    fn general_status(&self) -> u8;
    fn extended_status_word(&self) -> Option<u16>;
    fn extended_status_trailing_word(&self) -> Option<u16>;
    fn data(&self) -> &[u8];
}

macro_rules! plain_reply_view {
    ($name:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name<'a> {
            header: CipReplyHeader<'a>,
        }

        impl<'a> ReplyView for $name<'a> {
            fn reply_service(&self) -> u8 {
                self.header.reply_service
            }

            fn general_status(&self) -> u8 {
                self.header.general_status
            }

            fn extended_status_word(&self) -> Option<u16> {
                self.header.extended_status_word()
            }

            fn extended_status_trailing_word(&self) -> Option<u16> {
                self.header.extended_status_trailing_word()
            }

            fn data(&self) -> &[u8] {
                self.header.data
            }
        }
    };
}

plain_reply_view!(CipReadReplyPdu);
plain_reply_view!(CipWriteReplyPdu);
plain_reply_view!(PcccReplyPdu);
plain_reply_view!(TagListReplyPdu);
plain_reply_view!(GenericReplyPdu);

/// ForwardOpen reply: success case carries the assigned connection ids,
/// failure case is interpreted structurally via the extended status (spec
/// §4.2 step 4).
#[derive(Debug, Clone)]
pub struct ForwardOpenReplyPdu<'a> {
    header: CipReplyHeader<'a>,
    pub success: Option<ForwardOpenReply>,
}

impl<'a> ReplyView for ForwardOpenReplyPdu<'a> {
    fn reply_service(&self) -> u8 {
        self.header.reply_service
    }

    fn general_status(&self) -> u8 {
        self.header.general_status
    }

    fn extended_status_word(&self) -> Option<u16> {
        self.header.extended_status_word()
    }

    fn extended_status_trailing_word(&self) -> Option<u16> {
        self.header.extended_status_trailing_word()
    }

    fn data(&self) -> &[u8] {
        self.header.data
    }
}

impl<'a> ForwardOpenReplyPdu<'a> {
    /// Interprets the extended status for a failed ForwardOpen, deciding
    /// whether the Session should retry with different parameters (spec
    /// §4.2 step 4).
    pub fn decode_extended_status(&self) -> ForwardOpenExtendedStatus {
        ForwardOpenExtendedStatus::decode(
            self.extended_status_word().unwrap_or(0),
            self.extended_status_trailing_word(),
        )
    }
}

/// MultipleServicePacket reply: sub-response count plus per-sub-response
/// offsets (measured from the start of the count field, spec §4.3).
#[derive(Debug, Clone)]
pub struct MultipleServiceReplyPdu<'a> {
    header: CipReplyHeader<'a>,
    pub sub_response_count: u16,
    pub offsets: Vec<u16>,
}

impl<'a> ReplyView for MultipleServiceReplyPdu<'a> {
    fn reply_service(&self) -> u8 {
        self.header.reply_service
    }

    fn general_status(&self) -> u8 {
        self.header.general_status
    }

    fn extended_status_word(&self) -> Option<u16> {
        self.header.extended_status_word()
    }

    fn extended_status_trailing_word(&self) -> Option<u16> {
        self.header.extended_status_trailing_word()
    }

    fn data(&self) -> &[u8] {
        self.header.data
    }
}

/// Reply PDU dispatched by reply service code.
#[enum_dispatch(ReplyView)]
#[derive(Debug, Clone)]
pub enum ReplyPdu<'a> {
    CipRead(CipReadReplyPdu<'a>),
    CipWrite(CipWriteReplyPdu<'a>),
    Pccc(PcccReplyPdu<'a>),
    TagList(TagListReplyPdu<'a>),
    ForwardOpen(ForwardOpenReplyPdu<'a>),
    MultipleService(MultipleServiceReplyPdu<'a>),
    Generic(GenericReplyPdu<'a>),
}

impl<'a> ReplyPdu<'a> {
    /// Parses `buf` (a CIP reply: service byte onward) and dispatches on
    /// the request service embedded in the reply-service byte
    /// (`reply_service & !REPLY_MASK`).
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let header = parse_reply_header(buf)?;
        let request_service = header.reply_service & !cip::REPLY_MASK;

        Ok(match request_service {
            cip::SVC_CIP_READ | cip::SVC_CIP_READ_FRAG => {
                ReplyPdu::CipRead(CipReadReplyPdu { header })
            },
            cip::SVC_CIP_WRITE | cip::SVC_CIP_WRITE_FRAG => {
                ReplyPdu::CipWrite(CipWriteReplyPdu { header })
            },
            cip::SVC_EXECUTE_PCCC => ReplyPdu::Pccc(PcccReplyPdu { header }),
            cip::SVC_CIP_LIST_TAGS => ReplyPdu::TagList(TagListReplyPdu { header }),
            cip::SVC_FORWARD_OPEN | cip::SVC_FORWARD_OPEN_EX => {
                let success = if header.general_status == 0 {
                    Some(forward_open::parse_forward_open_success(header.data)?)
                } else {
                    None
                };
                ReplyPdu::ForwardOpen(ForwardOpenReplyPdu { header, success })
            },
            cip::SVC_MULTIPLE_SERVICE_PACKET => {
                if header.data.len() < 2 {
                    bail!("MultipleServicePacket reply truncated");
                }
                let sub_response_count = u16::from_le_bytes([header.data[0], header.data[1]]);
                let mut offsets = Vec::with_capacity(sub_response_count as usize);
                for i in 0..sub_response_count as usize {
                    let off = 2 + i * 2;
                    if header.data.len() < off + 2 {
                        bail!("MultipleServicePacket offset table truncated");
                    }
                    offsets.push(u16::from_le_bytes([header.data[off], header.data[off + 1]]));
                }
                ReplyPdu::MultipleService(MultipleServiceReplyPdu {
                    header,
                    sub_response_count,
                    offsets,
                })
            },
            _ => ReplyPdu::Generic(GenericReplyPdu { header }),
        })
    }
}
