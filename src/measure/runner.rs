//! The state-machine thread: applies session commands, ticks the measurer
//! at the camera rate and publishes the text overlay.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::machine::BalanceStateMachine;
use super::session::Mode;
use crate::error::StartRejected;
use crate::pipeline::{ResultFusion, StopSignal};
use crate::render::{Hud, OverlayWriter};
use crate::store::{persist_in_background, ScoreStore};

/// Request applied at the top of the next tick
#[derive(Debug)]
pub enum SessionCommand {
    Start {
        user_id: String,
        reply: oneshot::Sender<Result<(), StartRejected>>,
    },
    Reset,
}

/// What `/status` reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub mode: Mode,
    pub user_id: Option<String>,
    pub score: Option<u32>,
    pub elapsed_secs: Option<f64>,
    pub ticks: u64,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            mode: Mode::Idle,
            user_id: None,
            score: None,
            elapsed_secs: None,
            ticks: 0,
        }
    }
}

type StartReply = oneshot::Receiver<Result<(), StartRejected>>;

/// Cloneable front door to the running measurer
#[derive(Clone)]
pub struct SessionHandle {
    commands: Sender<SessionCommand>,
    status: Arc<Mutex<StatusSnapshot>>,
}

impl SessionHandle {
    fn send_start(&self, user_id: &str) -> Result<StartReply, StartRejected> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Start {
                user_id: user_id.to_string(),
                reply,
            })
            .map_err(|_| StartRejected::Unavailable)?;
        Ok(rx)
    }

    pub async fn start(&self, user_id: &str) -> Result<(), StartRejected> {
        let rx = self.send_start(user_id)?;
        rx.await.map_err(|_| StartRejected::Unavailable)?
    }

    /// Like `start`, for callers outside an async runtime
    pub fn start_blocking(&self, user_id: &str) -> Result<(), StartRejected> {
        let rx = self.send_start(user_id)?;
        rx.blocking_recv().map_err(|_| StartRejected::Unavailable)?
    }

    /// Returns false once the measurer has stopped
    pub fn reset(&self) -> bool {
        self.commands.send(SessionCommand::Reset).is_ok()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.lock().clone()
    }
}

pub struct MeasurerRunner {
    handle: JoinHandle<()>,
}

struct Measurer {
    machine: BalanceStateMachine,
    fusion: Arc<ResultFusion>,
    hud: Hud,
    overlay: OverlayWriter,
    store: Arc<dyn ScoreStore>,
    commands: Receiver<SessionCommand>,
    status: Arc<Mutex<StatusSnapshot>>,
    ticks: u64,
}

impl MeasurerRunner {
    pub fn start(
        machine: BalanceStateMachine,
        fusion: Arc<ResultFusion>,
        hud: Hud,
        overlay: OverlayWriter,
        store: Arc<dyn ScoreStore>,
        interval: Duration,
        stop: StopSignal,
    ) -> std::io::Result<(Self, SessionHandle)> {
        let (tx, rx) = mpsc::channel();
        let status = Arc::new(Mutex::new(StatusSnapshot::default()));
        let mut measurer = Measurer {
            machine,
            fusion,
            hud,
            overlay,
            store,
            commands: rx,
            status: Arc::clone(&status),
            ticks: 0,
        };

        let handle = thread::Builder::new()
            .name("state-machine".to_string())
            .spawn(move || {
                info!("state machine started ({:?} per tick)", interval);
                while !stop.is_stopped() {
                    let started = Instant::now();
                    measurer.tick(started);
                    // never skip ticks to catch up
                    let spent = started.elapsed();
                    if spent < interval {
                        thread::sleep(interval - spent);
                    }
                }
                info!("state machine stopped after {} ticks", measurer.ticks);
            })?;

        Ok((Self { handle }, SessionHandle { commands: tx, status }))
    }

    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("state machine thread panicked");
        }
    }
}

impl Measurer {
    fn tick(&mut self, now: Instant) {
        let fused = self.fusion.read();

        loop {
            match self.commands.try_recv() {
                Ok(SessionCommand::Start { user_id, reply }) => {
                    let result = self.machine.start(&user_id, &fused, now);
                    match &result {
                        Ok(()) => info!("measurement started for user '{}'", user_id),
                        Err(e) => info!("start for user '{}' rejected: {}", user_id, e),
                    }
                    // requester may have given up
                    let _ = reply.send(result);
                }
                Ok(SessionCommand::Reset) => {
                    info!("reset requested in {}", self.machine.shown_mode());
                    self.machine.reset();
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        let outcome = self.machine.tick(now, &fused);
        if outcome.changed() {
            info!("{} -> {}", outcome.from, outcome.to);
        }
        if let Some(record) = outcome.completed {
            info!(
                "session finished: user '{}' score {} ({:.3}s)",
                record.user_id,
                record.score,
                record.elapsed.as_secs_f64()
            );
            persist_in_background(Arc::clone(&self.store), record);
        }

        let plate = self.overlay.begin_frame();
        self.hud.draw(plate.image_mut(), self.machine.shown_mode(), self.machine.session());
        plate.fill_alpha_channel();
        self.overlay.publish();

        self.ticks += 1;
        self.publish_status();
        debug!("tick {} in {}", self.ticks, self.machine.shown_mode());
    }

    fn publish_status(&self) {
        let session = self.machine.session();
        let snapshot = StatusSnapshot {
            mode: self.machine.shown_mode(),
            user_id: session.map(|s| s.user_id.clone()),
            score: session.map(|s| s.score),
            elapsed_secs: session.map(|s| s.elapsed.as_secs_f64()),
            ticks: self.ticks,
        };
        *self.status.lock() = snapshot;
    }
}
