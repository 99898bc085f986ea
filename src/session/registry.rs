// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide session registry, deduplicating by `(host, path,
//! connection_group_id)` when `share_session` is enabled (spec §6
//! `session_find_or_create`).
//!
//! Grounded on the teacher's connection `Pool` (a `DashMap` keyed by a
//! connection identifier, entries inserted with `entry().or_insert_with`),
//! generalized from TSIH-keyed iSCSI sessions to EIP sessions keyed by
//! gateway identity.

use std::sync::Arc;

use anyhow::Result;
use dashmap::{DashMap, mapref::entry::Entry};
use once_cell::sync::Lazy;

use crate::{
    cfg::config::{Attributes, RuntimeConfig},
    session::Session,
};

/// Identifies a shareable session: the resolved gateway, the CIP routing
/// path, and the caller-supplied connection group id (spec §6 Attributes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub gateway: String,
    pub path: String,
    pub connection_group_id: i64,
}

impl SessionKey {
    fn from_attributes(attributes: &Attributes) -> Self {
        SessionKey {
            gateway: attributes.gateway.clone(),
            path: attributes.path.clone(),
            connection_group_id: attributes.connection_group_id as i64,
        }
    }
}

/// The global session registry (spec §5 "registry mutex protects the
/// global session list"). `DashMap` gives per-shard locking instead of one
/// coarse mutex, which is sufficient since entries are only ever inserted
/// or removed, never mutated in place.
pub struct Registry {
    sessions: DashMap<SessionKey, Arc<Session>>,
}

impl Registry {
    fn new() -> Self {
        Registry { sessions: DashMap::new() }
    }

    /// Returns the existing session for `key` if one is live, cloning the
    /// `Arc` so the caller shares ownership with the registry.
    pub fn get(&self, key: &SessionKey) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|e| e.clone())
    }

    /// Returns the session registered under `key`, calling `make` to create
    /// and insert one if absent. The shard stays locked for the duration of
    /// `make`, so two callers racing on the same key never both spawn a
    /// session.
    pub fn get_or_try_insert_with(
        &self,
        key: SessionKey,
        make: impl FnOnce() -> Result<Arc<Session>>,
    ) -> Result<Arc<Session>> {
        match self.sessions.entry(key) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let session = make()?;
                e.insert(session.clone());
                Ok(session)
            },
        }
    }

    /// Drops the registry's reference to `key`. The session itself stays
    /// alive as long as any tag still holds an `Arc` to it (spec §3
    /// "Lifecycle").
    pub fn remove(&self, key: &SessionKey) {
        self.sessions.remove(key);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Process-wide singleton, analogous to the teacher's `Arc<Pool>` but owned
/// statically rather than constructed once at startup and threaded through
/// the application, since sessions are created lazily on first tag use
/// (spec §3 "Lifecycle").
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Finds a live session sharing `attributes`' `(gateway, path,
/// connection_group_id)` when `ShareSession` allows it, or spawns and
/// registers a new one (spec §6 `session_find_or_create`).
///
/// `ShareSession = false` always spawns a private session, bypassing the
/// registry entirely — its teardown never touches [`Registry::remove`].
pub fn session_find_or_create(attributes: Attributes, runtime: RuntimeConfig) -> Result<Arc<Session>> {
    if !attributes.share_session {
        return Session::spawn(attributes, runtime);
    }

    let key = SessionKey::from_attributes(&attributes);
    if let Some(existing) = REGISTRY.get(&key) {
        return Ok(existing);
    }

    let key_for_session = key.clone();
    REGISTRY.get_or_try_insert_with(key, move || {
        let session = Session::spawn(attributes, runtime)?;
        session.set_registry_key(key_for_session);
        Ok(session)
    })
}
