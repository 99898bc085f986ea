// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The outbound/inbound packet buffer a tag hands to a [`crate::session`]
//! worker, and the small per-request lock that lets the tag layer poll
//! completion without taking the session mutex (spec §5).

use std::sync::{Arc, Mutex};

use bytes::BytesMut;

use crate::error::EipError;

/// Completion state of a [`Request`], observed by the tag layer through
/// [`RequestHandle::status`] without blocking the session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// Queued or in flight; not yet answered.
    Pending,
    /// Answered; the buffer holds the reply bytes.
    Complete,
    /// Removed from the queue because its abort flag was set.
    Aborted,
    /// Answered with an error; the buffer content is undefined.
    Failed(EipError),
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Fields the session worker stamps on a request while it is in flight, used
/// to demultiplex the matching reply (spec §4.2 "Demultiplexing rule").
#[derive(Debug, Clone, Copy, Default)]
pub struct InFlightTag {
    /// EIP sender context stamped for an unconnected send.
    pub sender_context: Option<u64>,
    /// CIP connection sequence number stamped for a connected send.
    pub connection_sequence: Option<u16>,
}

/// Mutable state guarded by [`Request`]'s own lock: everything the session
/// worker updates and the tag layer polls, kept separate from the session
/// mutex so polling a request's status never contends with the worker
/// servicing a different request.
#[derive(Debug)]
struct Shared {
    status: RequestStatus,
    abort: bool,
    buf: BytesMut,
    in_flight: InFlightTag,
}

/// One queued or in-flight wire transaction.
///
/// Owns a growable byte buffer that holds the outbound CIP service body on
/// the way in and the raw reply payload on the way out; the buffer may be
/// grown in place if a response exceeds its current capacity. A `Request`
/// belongs to exactly one [`crate::session::Session`] for its whole
/// lifetime: the session owns it while queued or in flight, and the tag
/// layer only ever sees a cloneable [`RequestHandle`] wrapping an `Arc`.
#[derive(Debug)]
pub struct Request {
    pub tag_id: u64,
    /// Set by the tag layer; the packer only combines requests that allow
    /// it (spec §4.3).
    pub allow_packing: bool,
    shared: Mutex<Shared>,
}

impl Request {
    pub fn new(tag_id: u64, body: Vec<u8>, allow_packing: bool) -> Self {
        Request {
            tag_id,
            allow_packing,
            shared: Mutex::new(Shared {
                status: RequestStatus::Pending,
                abort: false,
                buf: BytesMut::from(&body[..]),
                in_flight: InFlightTag::default(),
            }),
        }
    }

    /// Current outbound (or, once complete, inbound) buffer contents.
    pub fn body(&self) -> Vec<u8> {
        self.shared.lock().unwrap().buf.to_vec()
    }

    pub fn status(&self) -> RequestStatus {
        self.shared.lock().unwrap().status.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.lock().unwrap().abort
    }

    /// Called by the tag layer to cancel a pending request. The worker
    /// observes this on its next purge pass (spec §5 "Cancellation").
    pub fn abort(&self) {
        let mut s = self.shared.lock().unwrap();
        s.abort = true;
    }

    /// Stamps the sender context or connection sequence chosen when the
    /// request was sent, used later to match the reply.
    pub fn set_in_flight_tag(&self, tag: InFlightTag) {
        self.shared.lock().unwrap().in_flight = tag;
    }

    pub fn in_flight_tag(&self) -> InFlightTag {
        self.shared.lock().unwrap().in_flight
    }

    /// Grows the buffer if needed and replaces its contents with `data`,
    /// then marks the request complete (spec §4.2 step 6).
    pub fn complete_with(&self, data: &[u8]) {
        let mut s = self.shared.lock().unwrap();
        s.buf.clear();
        s.buf.extend_from_slice(data);
        s.status = RequestStatus::Complete;
    }

    pub fn complete_with_error(&self, err: EipError) {
        let mut s = self.shared.lock().unwrap();
        s.status = RequestStatus::Failed(err);
    }

    pub fn complete_aborted(&self) {
        let mut s = self.shared.lock().unwrap();
        s.status = RequestStatus::Aborted;
    }
}

/// A shared, read-only handle the tag layer holds onto a queued or
/// in-flight [`Request`]. Cloning is cheap (`Arc` bump); no handle outlives
/// its session, since session shutdown drains the queue and completes every
/// surviving request with [`EipError::Aborted`] before the worker exits.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    inner: Arc<Request>,
}

impl RequestHandle {
    pub fn new(request: Request) -> Self {
        RequestHandle { inner: Arc::new(request) }
    }

    pub fn status(&self) -> RequestStatus {
        self.inner.status()
    }

    pub fn body(&self) -> Vec<u8> {
        self.inner.body()
    }

    pub fn abort(&self) {
        self.inner.abort();
    }

    pub fn tag_id(&self) -> u64 {
        self.inner.tag_id
    }

    /// Shares the underlying `Arc` so the session's queue and the returned
    /// handle observe the same request.
    pub(crate) fn share(&self) -> Arc<Request> {
        self.inner.clone()
    }
}
