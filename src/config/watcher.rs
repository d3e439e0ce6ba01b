// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for hot-reloading session files.
//!
//! Reloaded sessions are delivered over a channel; the consumer decides
//! when to apply them, which must be between two scheduled steps.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use super::SessionFile;

/// Events emitted by the session watcher
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session file was modified and successfully reloaded
    Reloaded(Box<SessionFile>),
    /// Session file was modified but failed to parse
    Error(String),
}

fn is_session_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml") | Some("toml")
    )
}

fn reload(path: &Path) -> SessionEvent {
    match SessionFile::load(path) {
        Ok(session) => SessionEvent::Reloaded(Box::new(session)),
        Err(e) => SessionEvent::Error(format!("Failed to load {:?}: {:#}", path, e)),
    }
}

/// Session file watcher with debouncing
pub struct SessionWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<SessionEvent>,
    watched_path: PathBuf,
}

impl SessionWatcher {
    /// Create a new watcher for a session file or a directory of them
    ///
    /// # Arguments
    /// * `path` - Path to watch (file or directory)
    /// * `debounce_ms` - Debounce duration in milliseconds (default: 500)
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(500));

        let (event_tx, event_rx): (Sender<SessionEvent>, Receiver<SessionEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        let mode = if watched_path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        watcher
            .watch(&watched_path, mode)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", watched_path, e))?;

        let own_path = watched_path.clone();
        std::thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;
            let mut pending_paths: Vec<PathBuf> = Vec::new();

            loop {
                match notify_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                            for path in event.paths {
                                if !pending_paths.contains(&path) {
                                    pending_paths.push(path);
                                }
                            }
                            last_event_time = Some(Instant::now());
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let settled = last_event_time
                            .map(|t| t.elapsed() >= debounce_duration)
                            .unwrap_or(false);
                        if settled {
                            for path in pending_paths.drain(..) {
                                if is_session_file(&path) || path == own_path {
                                    debug!(?path, "session file changed");
                                    let _ = event_tx.send(reload(&path));
                                }
                            }
                            last_event_time = None;
                        }
                    }
                    // Watcher was dropped
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next session event (non-blocking)
    pub fn try_recv(&self) -> Option<SessionEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending session events
    pub fn recv_all(&self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until the next session event is received
    pub fn recv(&self) -> Option<SessionEvent> {
        self.event_receiver.recv().ok()
    }

    /// Block for at most `timeout` waiting for the next session event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Get the path being watched
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

/// Validate a session file without applying it
pub fn validate_session<P: AsRef<Path>>(path: P) -> Result<SessionFile> {
    SessionFile::load(path)
}
