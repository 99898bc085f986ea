// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The session worker: one dedicated OS thread per [`Session`] driving the
//! eleven-state connection/transaction machine of spec §4.2, behind a
//! request queue and condition variable the tag layer touches from any
//! thread (spec §5).

pub mod io;
pub mod packer;
pub mod registry;
pub mod state;

use std::{
    collections::VecDeque,
    net::{TcpStream, ToSocketAddrs},
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::{
    cfg::{
        config::{Attributes, RuntimeConfig},
        enums::PlcKind,
    },
    error::{EipError, ForwardOpenExtendedStatus, cip_general_status_to_error},
    request::{InFlightTag, Request, RequestHandle},
    session::state::{ForwardOpenNegotiation, SessionState},
    wire::{
        cip, cpf, encap,
        forward_open::{self, ForwardOpenParams},
        pdu::{ReplyPdu, ReplyView},
        unconnected_send,
    },
};

/// Wraps `cip_body` in an UnconnectedSend envelope addressed over
/// `session`'s routing path when one is configured, so an unconnected
/// request (no CIP connection open) still reaches a device behind a
/// backplane/bridge hop (spec §4.1). A device addressed directly (no path)
/// needs no wrapper.
fn wrap_for_routing(session: &Session, cip_body: Vec<u8>) -> Result<Vec<u8>> {
    if session.attributes.path.trim().is_empty() {
        return Ok(cip_body);
    }
    let route_path = cip::encode_port_path(&session.attributes.path)?;
    let path = unconnected_send::connection_manager_path();
    let mut out = cip::build_request_header(cip::SVC_UNCONNECTED_SEND, &path)?;
    out.extend_from_slice(&unconnected_send::build(10, 5, &cip_body, &route_path)?);
    Ok(out)
}

const REGISTER_SESSION_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_WAIT_SLICE: Duration = Duration::from_millis(100);

/// Bookkeeping the mutex guards: the FIFO request queue plus the few
/// fields the tag layer is allowed to read without going through the
/// worker (spec §5 "Shared resource policy").
struct Shared {
    queue: VecDeque<Arc<Request>>,
    max_payload_size: u16,
    seq_id: u64,
    terminating: bool,
    on_list: bool,
}

/// One EtherNet/IP session: a TCP connection, optional CIP connection, and
/// the single worker thread that owns both for their whole lifetime.
pub struct Session {
    pub attributes: Attributes,
    runtime: RuntimeConfig,
    shared: Mutex<Shared>,
    condvar: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
    /// Set by [`registry::session_find_or_create`] when this session was
    /// registered for sharing, so [`Session::shutdown`] knows to evict it.
    registry_key: once_cell::sync::OnceCell<registry::SessionKey>,
}

impl Session {
    /// Builds a session and starts its worker thread immediately (spec §3
    /// "Lifecycle" — a Session's thread runs from creation, not from first
    /// request).
    pub fn spawn(attributes: Attributes, runtime: RuntimeConfig) -> Result<Arc<Session>> {
        let initial_guess = attributes.cpu.default_payload_guess(false);

        let session = Arc::new(Session {
            attributes,
            runtime,
            shared: Mutex::new(Shared {
                queue: VecDeque::new(),
                max_payload_size: initial_guess,
                seq_id: 0,
                terminating: false,
                on_list: true,
            }),
            condvar: Condvar::new(),
            thread: Mutex::new(None),
            registry_key: once_cell::sync::OnceCell::new(),
        });

        let worker_session = session.clone();
        let handle = thread::Builder::new()
            .name("eip-session".into())
            .spawn(move || run(worker_session))
            .context("failed to spawn session worker thread")?;
        *session.thread.lock().unwrap() = Some(handle);

        Ok(session)
    }

    pub fn use_connected_msg(&self) -> bool {
        self.attributes.resolve_use_connected_msg()
    }

    /// Records the key this session is registered under in the shared
    /// registry, so [`Session::shutdown`] can evict it (spec §6
    /// `session_find_or_create`). A session spawned outside the registry
    /// never calls this and tears down without touching it.
    pub(crate) fn set_registry_key(&self, key: registry::SessionKey) {
        let _ = self.registry_key.set(key);
    }

    /// Allocates a request sized to hold `body` (spec §6
    /// `session_create_request`).
    pub fn create_request(&self, tag_id: u64, body: Vec<u8>, allow_packing: bool) -> RequestHandle {
        RequestHandle::new(Request::new(tag_id, body, allow_packing))
    }

    /// Enqueues `handle` FIFO and wakes the worker (spec §6
    /// `session_add_request`).
    pub fn add_request(&self, handle: &RequestHandle) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.terminating {
            bail!("session is terminating, cannot accept new requests");
        }
        shared.queue.push_back(handle.share());
        self.condvar.notify_one();
        Ok(())
    }

    /// Reads the negotiated payload size under the mutex (spec §6
    /// `session_get_max_payload`).
    pub fn max_payload(&self) -> u16 {
        self.shared.lock().unwrap().max_payload_size
    }

    /// Monotonic counter under the mutex (spec §6 `session_get_new_seq_id`).
    pub fn new_seq_id(&self) -> u64 {
        let mut shared = self.shared.lock().unwrap();
        shared.seq_id = shared.seq_id.wrapping_add(1);
        shared.seq_id
    }

    pub fn pending_request_count(&self) -> usize {
        self.shared.lock().unwrap().queue.len()
    }

    /// Signals termination, wakes the worker, and joins its thread. The
    /// worker performs ForwardClose/Unregister/close-socket cleanup itself
    /// before exiting (spec §3 "Lifecycle").
    pub fn shutdown(&self) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.terminating = true;
            shared.on_list = false;
        }
        self.condvar.notify_all();

        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        if let Some(key) = self.registry_key.get() {
            registry::REGISTRY.remove(key);
        }
    }

    fn is_terminating(&self) -> bool {
        self.shared.lock().unwrap().terminating
    }

    fn set_max_payload(&self, size: u16) {
        self.shared.lock().unwrap().max_payload_size = size;
    }

    /// Removes every request whose abort flag is set and completes it
    /// (spec §4.2 process-requests step (a); spec §5 "Cancellation").
    fn purge_aborted(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.queue.retain(|req| {
            if req.is_aborted() {
                req.complete_aborted();
                false
            } else {
                true
            }
        });
    }

    /// Fails every queued request (aborted ones excluded — they are already
    /// completed by `purge_aborted`) with `err` (spec §4.5).
    fn fail_all_queued(&self, err: &EipError) {
        let mut shared = self.shared.lock().unwrap();
        for req in shared.queue.drain(..) {
            if !req.is_aborted() {
                req.complete_with_error(err.clone());
            } else {
                req.complete_aborted();
            }
        }
    }

    fn resolve_addr(&self) -> Result<std::net::SocketAddr> {
        let (host, port) = self.attributes.host_port()?;
        format!("{host}:{port}")
            .to_socket_addrs()
            .context("failed to resolve gateway address")?
            .next()
            .context("gateway address resolved to no candidates")
    }
}

/// The worker thread entry point: drives `session` through its lifecycle
/// states until termination (spec §4.2). All connection-scoped mutable
/// state (the socket, session handle, connection ids, sequence numbers)
/// lives here as plain locals, since only this thread ever touches it.
fn run(session: Arc<Session>) {
    let mut state = SessionState::OpeningSocket;
    let mut stream: Option<TcpStream> = None;
    let mut eip_session_handle: u32 = 0;
    let mut orig_to_targ_connection_id: u32 = rand::random();
    let mut targ_to_orig_connection_id: u32 = 0;
    let mut connection_serial_number: u16 = rand::random();
    let mut cip_connection_sequence: u16 = 0;
    let mut idle_since = Instant::now();

    loop {
        if session.is_terminating() && !matches!(state, SessionState::ForwardClosing) {
            state = if stream.is_some() && targ_to_orig_connection_id != 0 {
                SessionState::ForwardClosing
            } else if stream.is_some() {
                SessionState::Unregistering
            } else {
                break;
            };
        }

        state = match state {
            SessionState::OpeningSocket => {
                match session
                    .resolve_addr()
                    .and_then(|addr| io::connect(addr, session.runtime.timeout_connect))
                {
                    Ok(s) => {
                        stream = Some(s);
                        SessionState::SocketConnecting
                    },
                    Err(e) => {
                        warn!(error = %e, "failed to open socket");
                        SessionState::RetryWait
                    },
                }
            },

            // The blocking `connect_timeout` in `io::connect` already waits
            // for the handshake, so there is nothing left to poll here.
            SessionState::SocketConnecting => SessionState::Registering,

            SessionState::Registering => {
                let s = stream.as_mut().expect("socket present in Registering");
                match do_register_session(s, REGISTER_SESSION_TIMEOUT, session.runtime.poll_slice) {
                    Ok(handle) => {
                        eip_session_handle = handle;
                        if session.use_connected_msg() {
                            let guess = session
                                .attributes
                                .cpu
                                .default_payload_guess(false);
                            SessionState::ForwardOpening(ForwardOpenNegotiation::new(guess))
                        } else {
                            idle_since = Instant::now();
                            SessionState::Idle
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "RegisterSession failed");
                        SessionState::CloseSocket
                    },
                }
            },

            SessionState::ForwardOpening(mut nego) => {
                let s = stream.as_mut().expect("socket present in ForwardOpening");
                match do_forward_open(
                    &session,
                    s,
                    eip_session_handle,
                    &mut connection_serial_number,
                    orig_to_targ_connection_id,
                    &nego,
                ) {
                    Ok(ForwardOpenOutcome::Success { targ_to_orig, max_payload }) => {
                        targ_to_orig_connection_id = targ_to_orig;
                        session.set_max_payload(max_payload);
                        idle_since = Instant::now();
                        SessionState::Idle
                    },
                    Ok(ForwardOpenOutcome::RetrySmallerSize { supported_size }) => {
                        nego.max_payload_guess = supported_size;
                        nego.attempts += 1;
                        SessionState::ForwardOpening(nego)
                    },
                    Ok(ForwardOpenOutcome::RetryDuplicateConnection) => {
                        connection_serial_number = connection_serial_number.wrapping_add(1);
                        nego.attempts += 1;
                        SessionState::ForwardOpening(nego)
                    },
                    Ok(ForwardOpenOutcome::FallBackToClassic) => {
                        nego.only_use_old_forward_open = true;
                        nego.max_payload_guess = session.attributes.cpu.default_payload_guess(true);
                        nego.attempts += 1;
                        SessionState::ForwardOpening(nego)
                    },
                    Err(e) => {
                        warn!(error = %e, "ForwardOpen failed");
                        SessionState::Unregistering
                    },
                }
            },

            SessionState::Idle => {
                let mut shared = session.shared.lock().unwrap();
                if shared.queue.is_empty() && !shared.terminating {
                    let (guard, _timeout_result) =
                        session.condvar.wait_timeout(shared, IDLE_WAIT_SLICE).unwrap();
                    shared = guard;
                }
                let queue_has_work = !shared.queue.is_empty();
                let terminating = shared.terminating;
                drop(shared);

                if terminating {
                    SessionState::Idle // re-evaluated at top of loop
                } else if queue_has_work {
                    SessionState::ProcessRequests
                } else if let Some(limit) = session.attributes.auto_disconnect() {
                    if idle_since.elapsed() >= limit {
                        info!("auto-disconnect timeout reached, closing idle session");
                        if targ_to_orig_connection_id != 0 {
                            SessionState::ForwardClosing
                        } else {
                            SessionState::Unregistering
                        }
                    } else {
                        SessionState::Idle
                    }
                } else {
                    SessionState::Idle
                }
            },

            SessionState::ProcessRequests => {
                session.purge_aborted();
                let batch = {
                    let shared = session.shared.lock().unwrap();
                    shared.queue.iter().cloned().collect::<Vec<_>>()
                };

                if batch.is_empty() {
                    idle_since = Instant::now();
                    SessionState::Idle
                } else {
                    let s = stream.as_mut().expect("socket present in ProcessRequests");
                    match process_one_transaction(
                        &session,
                        s,
                        eip_session_handle,
                        targ_to_orig_connection_id,
                        orig_to_targ_connection_id,
                        &mut cip_connection_sequence,
                        &batch,
                    ) {
                        Ok(consumed) => {
                            let mut shared = session.shared.lock().unwrap();
                            for _ in 0..consumed {
                                shared.queue.pop_front();
                            }
                            drop(shared);
                            idle_since = Instant::now();
                            SessionState::Idle
                        },
                        Err(e) => {
                            warn!(error = %e, "transport error servicing request batch");
                            let eip_err = EipError::ConnectionLost;
                            session.fail_all_queued(&eip_err);
                            SessionState::CloseSocket
                        },
                    }
                }
            },

            SessionState::ForwardClosing => {
                if let Some(s) = stream.as_mut() {
                    if targ_to_orig_connection_id != 0 {
                        let _ = do_forward_close(
                            &session,
                            s,
                            connection_serial_number,
                        );
                    }
                }
                SessionState::Unregistering
            },

            SessionState::Unregistering => {
                if let Some(s) = stream.as_mut() {
                    let _ = do_unregister_session(s, eip_session_handle, session.runtime.poll_slice);
                }
                SessionState::CloseSocket
            },

            SessionState::CloseSocket => {
                stream = None;
                targ_to_orig_connection_id = 0;
                eip_session_handle = 0;

                if session.is_terminating() {
                    break;
                } else if session.pending_request_count() > 0 {
                    SessionState::RetryWait
                } else {
                    SessionState::ReconnectWait
                }
            },

            SessionState::RetryWait => {
                thread::sleep(session.runtime.retry_wait);
                if session.is_terminating() {
                    break;
                }
                SessionState::OpeningSocket
            },

            SessionState::ReconnectWait => {
                let shared = session.shared.lock().unwrap();
                if shared.queue.is_empty() && !shared.terminating {
                    let _ = session.condvar.wait_timeout(shared, IDLE_WAIT_SLICE).unwrap();
                } else {
                    drop(shared);
                }
                if session.is_terminating() {
                    break;
                } else if session.pending_request_count() > 0 {
                    SessionState::OpeningSocket
                } else {
                    SessionState::ReconnectWait
                }
            },
        };
    }

    debug!("session worker exiting");
}

fn do_register_session(stream: &mut TcpStream, timeout: Duration, poll_slice: Duration) -> Result<u32> {
    let body = encap::RegisterSessionBody::request();
    let header = encap::EncapHeader::new(
        encap::Command::RegisterSession,
        encap::RegisterSessionBody::LEN as u16,
        0,
        0,
    );

    let mut wire = header.to_vec();
    wire.extend_from_slice(&body.to_vec());
    io::write_all_bounded(stream, &wire, timeout, poll_slice)?;

    let mut header_buf = [0u8; encap::ENCAP_HEADER_LEN];
    io::read_exact_bounded(stream, &mut header_buf, timeout, poll_slice)?;
    let reply_header = encap::EncapHeader::from_bytes(&header_buf)?;

    let len = reply_header.length.get() as usize;
    let mut body_buf = vec![0u8; len];
    io::read_exact_bounded(stream, &mut body_buf, timeout, poll_slice)?;

    if reply_header.status.get() != 0 {
        bail!("RegisterSession rejected, status=0x{:08x}", reply_header.status.get());
    }
    Ok(reply_header.session_handle.get())
}

fn do_unregister_session(stream: &mut TcpStream, session_handle: u32, poll_slice: Duration) -> Result<()> {
    let header =
        encap::EncapHeader::new(encap::Command::UnregisterSession, 0, session_handle, 0);
    io::write_all_bounded(stream, &header.to_vec(), Duration::from_millis(200), poll_slice)
}

enum ForwardOpenOutcome {
    Success { targ_to_orig: u32, max_payload: u16 },
    RetrySmallerSize { supported_size: u16 },
    RetryDuplicateConnection,
    FallBackToClassic,
}

#[allow(clippy::too_many_arguments)]
fn do_forward_open(
    session: &Session,
    stream: &mut TcpStream,
    eip_session_handle: u32,
    connection_serial_number: &mut u16,
    orig_to_targ_connection_id: u32,
    nego: &ForwardOpenNegotiation,
) -> Result<ForwardOpenOutcome> {
    let connection_path = cip::encode_port_path(&session.attributes.path)?;
    let params = ForwardOpenParams {
        secs_per_tick: 10,
        timeout_ticks: 5,
        orig_to_targ_connection_id,
        targ_to_orig_connection_id: 0,
        connection_serial_number: *connection_serial_number,
        originator_vendor_id: 0xF00D,
        originator_serial: rand::random(),
        timeout_multiplier: 1,
        orig_to_targ_rpi: 2_000_000,
        orig_to_targ_size: nego.max_payload_guess,
        targ_to_orig_rpi: 2_000_000,
        targ_to_orig_size: nego.max_payload_guess,
    };

    let (service, body) =
        forward_open::build_forward_open(!nego.only_use_old_forward_open, &params, &connection_path);
    let path = cip::epath_class_instance(0x06, 0x01);
    let mut cip_body = cip::build_request_header(service, &path)?;
    cip_body.extend_from_slice(&body);

    let reply = send_unconnected_and_receive(
        session,
        stream,
        eip_session_handle,
        &cip_body,
        session.runtime.timeout_request,
    )?;
    let pdu = ReplyPdu::parse(&reply)?;

    match pdu {
        ReplyPdu::ForwardOpen(fo) => {
            if fo.general_status() == 0 {
                let success = fo.success.context("ForwardOpen reported success with no body")?;
                Ok(ForwardOpenOutcome::Success {
                    targ_to_orig: success.targ_to_orig_connection_id,
                    max_payload: nego.max_payload_guess,
                })
            } else if fo.general_status() == 0x08 {
                Ok(ForwardOpenOutcome::FallBackToClassic)
            } else {
                match fo.decode_extended_status() {
                    ForwardOpenExtendedStatus::InvalidConnectionSize { supported_size } => {
                        Ok(ForwardOpenOutcome::RetrySmallerSize { supported_size })
                    },
                    ForwardOpenExtendedStatus::DuplicateConnection => {
                        Ok(ForwardOpenOutcome::RetryDuplicateConnection)
                    },
                    ForwardOpenExtendedStatus::Other => {
                        bail!(cip_general_status_to_error(fo.general_status())
                            .unwrap_or(EipError::RemoteError(fo.general_status())))
                    },
                }
            }
        },
        other => bail!("unexpected reply service 0x{:02x} to ForwardOpen", other.reply_service()),
    }
}

fn do_forward_close(
    session: &Session,
    stream: &mut TcpStream,
    connection_serial_number: u16,
) -> Result<()> {
    let connection_path = cip::encode_port_path(&session.attributes.path)?;
    let body = forward_open::build_forward_close(
        10,
        5,
        connection_serial_number,
        0xF00D,
        0,
        &connection_path,
    );
    let path = cip::epath_class_instance(0x06, 0x01);
    let mut cip_body = cip::build_request_header(cip::SVC_FORWARD_CLOSE, &path)?;
    cip_body.extend_from_slice(&body);

    // Best-effort: ForwardClose runs to a short, fixed budget even during
    // shutdown (spec §4.2 step 7).
    let _ = send_unconnected_and_receive(
        session,
        stream,
        0,
        &cip_body,
        session.runtime.timeout_forward_close,
    );
    Ok(())
}

/// Sends one CIP request over an unconnected (`SendRRData`) envelope and
/// returns the raw CIP reply bytes (service byte onward). Used for
/// session-management exchanges (ForwardOpen/ForwardClose) that never go
/// over a CIP connection even once one is open.
fn send_unconnected_and_receive(
    session: &Session,
    stream: &mut TcpStream,
    eip_session_handle: u32,
    cip_body: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>> {
    let seq = session.new_seq_id();
    let cpf_body = cpf::encode_unconnected(0, cip_body);
    let header = encap::EncapHeader::new(
        encap::Command::SendRrData,
        cpf_body.len() as u16,
        eip_session_handle,
        seq,
    );
    let mut wire = header.to_vec();
    wire.extend_from_slice(&cpf_body);
    io::write_all_bounded(stream, &wire, timeout, session.runtime.poll_slice)?;

    let mut header_buf = [0u8; encap::ENCAP_HEADER_LEN];
    io::read_exact_bounded(stream, &mut header_buf, timeout, session.runtime.poll_slice)?;
    let reply_header = encap::EncapHeader::from_bytes(&header_buf)?;
    let mut body_buf = vec![0u8; reply_header.length.get() as usize];
    io::read_exact_bounded(stream, &mut body_buf, timeout, session.runtime.poll_slice)?;

    let payload = cpf::decode_unconnected(&body_buf)?;
    Ok(payload.cip_body.to_vec())
}

/// Services exactly one wire transaction for the head of `batch` (spec
/// §4.2 process-requests sub-flow, steps (b)-(e)). Returns how many
/// requests from the front of the queue were consumed (1 for a singleton
/// send, N for a packed batch).
#[allow(clippy::too_many_arguments)]
fn process_one_transaction(
    session: &Session,
    stream: &mut TcpStream,
    eip_session_handle: u32,
    targ_to_orig_connection_id: u32,
    orig_to_targ_connection_id: u32,
    cip_connection_sequence: &mut u16,
    batch: &[Arc<Request>],
) -> Result<usize> {
    let connected = session.use_connected_msg() && targ_to_orig_connection_id != 0;
    let max_payload = session.max_payload() as usize;

    let bodies: Vec<Vec<u8>> = batch.iter().map(|r| r.body()).collect();
    let body_refs: Vec<&[u8]> = bodies.iter().map(|b| b.as_slice()).collect();

    let packable = connected && batch.len() > 1 && batch.iter().all(|r| r.allow_packing);
    let consumed = if packable {
        packer::select_batch(&body_refs, max_payload)
    } else {
        1
    };

    let cip_body = if consumed > 1 {
        packer::build(&body_refs[..consumed])?
    } else {
        bodies[0].clone()
    };

    *cip_connection_sequence = cip_connection_sequence.wrapping_add(1);
    let in_flight_tag = if connected {
        InFlightTag { sender_context: None, connection_sequence: Some(*cip_connection_sequence) }
    } else {
        InFlightTag { sender_context: Some(session.new_seq_id()), connection_sequence: None }
    };
    for req in &batch[..consumed] {
        req.set_in_flight_tag(in_flight_tag);
    }

    let (command, cpf_body, sender_context) = if connected {
        // The Connected Address Item on an outgoing (O->T) message carries
        // the O->T connection id — the one we chose and the target echoed
        // back in its ForwardOpen reply, not the T->O id it assigned.
        let body =
            cpf::encode_connected(orig_to_targ_connection_id, *cip_connection_sequence, &cip_body);
        (encap::Command::SendUnitData, body, 0)
    } else {
        let ctx = in_flight_tag.sender_context.unwrap_or(0);
        let routed_body = wrap_for_routing(session, cip_body)?;
        (encap::Command::SendRrData, cpf::encode_unconnected(0, &routed_body), ctx)
    };

    let header =
        encap::EncapHeader::new(command, cpf_body.len() as u16, eip_session_handle, sender_context);
    let mut wire = header.to_vec();
    wire.extend_from_slice(&cpf_body);
    io::write_all_bounded(stream, &wire, session.runtime.timeout_request, session.runtime.poll_slice)?;

    let mut header_buf = [0u8; encap::ENCAP_HEADER_LEN];
    io::read_exact_bounded(
        stream,
        &mut header_buf,
        session.runtime.timeout_request,
        session.runtime.poll_slice,
    )?;
    let reply_header = encap::EncapHeader::from_bytes(&header_buf)?;
    let mut body_buf = vec![0u8; reply_header.length.get() as usize];
    io::read_exact_bounded(
        stream,
        &mut body_buf,
        session.runtime.timeout_request,
        session.runtime.poll_slice,
    )?;

    // Demultiplexing rule (spec §4.2): only one transaction is ever in
    // flight, so matching collapses to "the current request" once the
    // basic identity checks pass.
    if connected {
        let connected_payload = cpf::decode_connected(&body_buf)?;
        // An incoming (T->O) reply carries the T->O connection id the
        // target assigned during ForwardOpen.
        if connected_payload.target_connection_id != targ_to_orig_connection_id
            || connected_payload.connection_seq != *cip_connection_sequence
        {
            bail!("connected reply did not match the in-flight request, discarding");
        }
        dispatch_reply(&batch[..consumed], connected_payload.cip_body, consumed > 1)?;
    } else {
        if reply_header.session_handle.get() != eip_session_handle
            || reply_header.sender_context.get() != sender_context
        {
            bail!("unconnected reply did not match the in-flight request, discarding");
        }
        let payload = cpf::decode_unconnected(&body_buf)?;
        dispatch_reply(&batch[..consumed], payload.cip_body, consumed > 1)?;
    }

    Ok(consumed)
}

fn dispatch_reply(batch: &[Arc<Request>], data: &[u8], packed: bool) -> Result<()> {
    if !packed {
        complete_one(&batch[0], data);
        return Ok(());
    }

    let pdu = ReplyPdu::parse(data)?;
    match pdu {
        ReplyPdu::MultipleService(m) => {
            if m.general_status() != 0 && m.general_status() != cip::STATUS_PARTIAL_OR_BUNDLED_ERROR {
                let err = cip_general_status_to_error(m.general_status())
                    .unwrap_or(EipError::RemoteError(m.general_status()));
                for req in batch {
                    req.complete_with_error(err.clone());
                }
                return Ok(());
            }

            let subs = packer::unpack(m.sub_response_count, &m.offsets, m.data())?;
            for (req, sub) in batch.iter().zip(subs) {
                complete_one(req, sub);
            }
        },
        other => {
            bail!("expected a MultipleServicePacket reply for a packed batch, got service 0x{:02x}", other.reply_service());
        },
    }
    Ok(())
}

fn complete_one(req: &Arc<Request>, sub_reply: &[u8]) {
    match cip::parse_reply_header(sub_reply) {
        Ok(header) => match header.status() {
            Ok(()) => req.complete_with(sub_reply),
            Err(e) => req.complete_with_error(e),
        },
        Err(_) => req.complete_with_error(EipError::BadFormat),
    }
}
