//! Background analysis while the human is thinking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use shakmaty::Chess;

use crate::engine::{Engine, EngineResult};
use crate::game_logic::{GameState, position_key};

/// One background search and its result slot.
struct PonderSession {
    key: String,
    stop: Arc<AtomicBool>,
    result: Arc<Mutex<Option<EngineResult>>>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Runs at most one background search at a time and hands its result over
/// at most once.
///
/// A session is tied to the position it was started on. Results are only
/// published if the session was not cancelled first, and only handed out for
/// that same position.
pub struct PonderManager {
    engine: Arc<dyn Engine>,
    depth: u8,
    join_timeout: Duration,
    session: Option<PonderSession>,
}

impl PonderManager {
    pub fn new(engine: Arc<dyn Engine>, depth: u8, join_timeout: Duration) -> Self {
        Self {
            engine,
            depth,
            join_timeout,
            session: None,
        }
    }

    /// Cancel any running session and start analysing `position`.
    pub fn start(&mut self, position: &Chess) {
        self.stop();

        let key = position_key(position);
        let stop = Arc::new(AtomicBool::new(false));
        let result = Arc::new(Mutex::new(None));
        let (done_tx, done) = crossbeam_channel::bounded(1);

        let worker = {
            let engine = Arc::clone(&self.engine);
            let position = position.clone();
            let stop = Arc::clone(&stop);
            let slot = Arc::clone(&result);
            let depth = self.depth;
            move || {
                match engine.analyse(&position, depth, &stop) {
                    Ok(found) => {
                        let mut slot = slot.lock();
                        if stop.load(Ordering::Acquire) {
                            log::debug!("ponder finished after cancellation, dropping result");
                        } else {
                            log::debug!("ponder result ready: {}", found.best_move);
                            *slot = Some(found);
                        }
                    }
                    Err(e) if stop.load(Ordering::Acquire) => {
                        log::debug!("cancelled ponder search ended: {e}");
                    }
                    Err(e) => log::warn!("ponder search failed: {e}"),
                }
                let _ = done_tx.send(());
            }
        };

        match std::thread::Builder::new()
            .name("ponder".into())
            .spawn(worker)
        {
            Ok(handle) => {
                log::debug!("pondering {key}");
                self.session = Some(PonderSession {
                    key,
                    stop,
                    result,
                    done,
                    handle,
                });
            }
            Err(e) => log::warn!("failed to start ponder thread: {e}"),
        }
    }

    /// Cancel the running session, wait a bounded time for it, and discard
    /// anything it cached.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.stop.store(true, Ordering::Release);

        match session.done.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if session.handle.join().is_err() {
                    log::warn!("ponder thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "ponder search did not stop within {:?}, detaching it",
                    self.join_timeout
                );
            }
        }
        session.result.lock().take();
    }

    /// Stop the session unless it was started on `position`.
    pub fn stop_if_stale(&mut self, position: &Chess) {
        let stale = self
            .session
            .as_ref()
            .is_some_and(|s| s.key != position_key(position));
        if stale {
            log::debug!("ponder session no longer matches the game, stopping it");
            self.stop();
        }
    }

    /// The completed result for `current`, consumed on return.
    ///
    /// Returns `None` while the search is still running, for a different
    /// position, or if its first move is not legal in `current`.
    pub fn take_result(&mut self, current: &Chess) -> Option<EngineResult> {
        let session = self.session.as_ref()?;
        if session.key != position_key(current) {
            return None;
        }

        let taken = {
            let mut slot = session.result.lock();
            let usable = slot.as_ref().is_some_and(|result| {
                result
                    .resolve(&GameState::from_position(current.clone()))
                    .is_ok()
            });
            if usable { slot.take() } else { None }
        };

        if taken.is_some() {
            // The worker has published, so it is finishing.
            self.stop();
        }
        taken
    }

    /// Whether a session is running or holds an unconsumed result.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the current session has finished with a usable result.
    pub fn has_result(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.result.lock().is_some())
    }
}

impl Drop for PonderManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PonderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PonderManager")
            .field("depth", &self.depth)
            .field("join_timeout", &self.join_timeout)
            .field("session", &self.session.as_ref().map(|s| &s.key))
            .finish()
    }
}
