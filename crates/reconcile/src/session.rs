use std::{sync::Arc, time::Duration};

use gateway::GameContext;
use shared::{
    domain::{Color, MoveSource},
    protocol::ServerEvent,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use transport::BoardTransport;

use crate::{
    codec::{self, OccupancySnapshot},
    infer::{infer, InferredMove},
};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// The color whose moves are read from the physical board.
    pub tracked_color: Color,
    /// Settle time between the turn flip and the baseline capture, so the
    /// actuator finishing the other side's move is not read mid-travel.
    pub grace_delay: Duration,
    pub poll_interval: Duration,
    /// Total time one session may spend before giving up on the turn.
    pub poll_budget: Duration,
    pub read_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tracked_color: Color::Black,
            grace_delay: Duration::from_secs(1),
            poll_interval: Duration::from_millis(500),
            poll_budget: Duration::from_secs(120),
            read_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A sensor-inferred move passed the rules and was committed.
    Committed,
    /// Another submission path moved first; the stale baseline was dropped.
    Preempted,
    /// The poll budget ran out with the turn unchanged.
    Exhausted,
}

enum PollState {
    BaselinePending,
    Polling { baseline: OccupancySnapshot },
}

/// Background task that keeps the logical board in step with the physical
/// one. Parked while it is not the tracked color's turn; on each tracked
/// turn it runs one polling session and then parks again. Every
/// per-iteration failure (garbled read, transport timeout, rules rejection)
/// is survived in place.
pub struct Reconciler {
    ctx: GameContext,
    transport: Arc<dyn BoardTransport>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        ctx: GameContext,
        transport: Arc<dyn BoardTransport>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            ctx,
            transport,
            config,
        }
    }

    pub async fn run(self) {
        let mut turns = self.ctx.watch_turns();
        info!(color = %self.config.tracked_color, "reconciler started");
        loop {
            let owner = *turns.borrow_and_update();
            if owner.color == self.config.tracked_color {
                let outcome = self.run_session(owner.seq).await;
                info!(?outcome, "reconciliation session ended");
                if outcome == SessionOutcome::Exhausted {
                    // Still the tracked color's turn; nothing to do until a
                    // manual submission or operator fix changes it.
                    if turns.changed().await.is_err() {
                        break;
                    }
                }
                continue;
            }
            if turns.changed().await.is_err() {
                break;
            }
        }
        info!("reconciler stopped: game context closed");
    }

    /// One polling session for one tracked turn. `entry_seq` is the commit
    /// sequence at session start; any later commit means the session's view
    /// of the board is stale and it must abandon.
    async fn run_session(&self, entry_seq: u64) -> SessionOutcome {
        let turns = self.ctx.watch_turns();

        debug!("turn reached the physical board; waiting for it to settle");
        sleep(self.config.grace_delay).await;

        let deadline = Instant::now() + self.config.poll_budget;
        let mut state = PollState::BaselinePending;

        loop {
            if turns.borrow().seq != entry_seq {
                debug!("session preempted by another commit");
                return SessionOutcome::Preempted;
            }
            if Instant::now() >= deadline {
                warn!(color = %self.config.tracked_color, "physical move timed out");
                self.ctx.publish(ServerEvent::PhysicalMoveTimedOut {
                    color: self.config.tracked_color,
                });
                return SessionOutcome::Exhausted;
            }

            state = match state {
                PollState::BaselinePending => match self.read_decoded().await {
                    Some(baseline) => {
                        debug!("baseline snapshot captured");
                        PollState::Polling { baseline }
                    }
                    None => PollState::BaselinePending,
                },
                PollState::Polling { baseline } => {
                    if let Some(current) = self.read_decoded().await {
                        match infer(&baseline, &current) {
                            InferredMove::None => {}
                            InferredMove::Ambiguous => {
                                debug!("ambiguous sensor diff; waiting for a clean read");
                            }
                            InferredMove::MultiChange => {
                                debug!("capture-like multi-change; not inferable from presence data");
                            }
                            InferredMove::Move { from, to } => {
                                match self.ctx.submit(from, to, MoveSource::Physical).await {
                                    Ok(_) => return SessionOutcome::Committed,
                                    Err(error) => {
                                        // A spurious read cannot corrupt state;
                                        // the rules engine already said no.
                                        warn!(
                                            %from,
                                            %to,
                                            message = %error.message,
                                            "sensor-inferred move rejected"
                                        );
                                    }
                                }
                            }
                        }
                    }
                    PollState::Polling { baseline }
                }
            };

            sleep(self.config.poll_interval).await;
        }
    }

    /// One snapshot read, decoded. Transport and format failures are logged
    /// and collapse to `None`: expected transient noise, the cycle is
    /// simply skipped.
    async fn read_decoded(&self) -> Option<OccupancySnapshot> {
        let raw = match self.transport.read_snapshot(self.config.read_timeout).await {
            Ok(raw) => raw,
            Err(error) => {
                debug!(%error, "snapshot read failed; skipping cycle");
                return None;
            }
        };
        match codec::decode(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                debug!(%error, "garbled snapshot; skipping cycle");
                None
            }
        }
    }
}
