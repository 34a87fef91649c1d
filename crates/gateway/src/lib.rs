use std::{sync::Arc, time::Duration};

use board::BoardState;
use shared::{
    domain::{Color, MoveSource, Square, BOARD_SIZE},
    error::{ApiError, ErrorCode},
    protocol::{LastMove, ServerEvent},
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{info, warn};
use transport::{actuator_command, BoardTransport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which color must move next, plus a commit sequence number. The sequence
/// is the reconciliation loop's staleness check: any commit bumps it, so a
/// session can tell that the board moved underneath its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOwner {
    pub color: Color,
    pub seq: u64,
}

struct ActuatorLink {
    transport: Arc<dyn BoardTransport>,
    timeout: Duration,
}

/// Single entry point for move submission. Both front ends (UI requests and
/// the reconciliation loop) funnel through the board mutex here, so at most
/// one `apply` is in flight and a double turn-flip cannot happen.
#[derive(Clone)]
pub struct GameContext {
    inner: Arc<Inner>,
}

struct Inner {
    board: Mutex<BoardState>,
    events: broadcast::Sender<ServerEvent>,
    turns: watch::Sender<TurnOwner>,
    actuator: Option<ActuatorLink>,
}

impl GameContext {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Context with a physical-execution path: UI commits are replayed on
    /// the gantry through `transport`.
    pub fn with_actuator(transport: Arc<dyn BoardTransport>, timeout: Duration) -> Self {
        Self::build(Some(ActuatorLink { transport, timeout }))
    }

    fn build(actuator: Option<ActuatorLink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (turns, _) = watch::channel(TurnOwner {
            color: Color::White,
            seq: 0,
        });
        Self {
            inner: Arc::new(Inner {
                board: Mutex::new(BoardState::new()),
                events,
                turns,
                actuator,
            }),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    pub fn watch_turns(&self) -> watch::Receiver<TurnOwner> {
        self.inner.turns.subscribe()
    }

    /// Fans an out-of-band event (e.g. a polling timeout notification) out
    /// to all viewers.
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.inner.events.send(event);
    }

    pub async fn board_view(&self) -> ServerEvent {
        let board = self.inner.board.lock().await;
        board_updated(&board)
    }

    pub async fn occupancy(&self) -> [[bool; BOARD_SIZE]; BOARD_SIZE] {
        self.inner.board.lock().await.occupancy()
    }

    /// Parses `"<file><rank> <file><rank>"` move text and submits it.
    /// Malformed text is rejected without touching the board.
    pub async fn submit_text(
        &self,
        text: &str,
        source: MoveSource,
    ) -> Result<ServerEvent, ApiError> {
        let (from, to) = match parse_move_text(text) {
            Ok(squares) => squares,
            Err(error) => {
                warn!(%text, ?source, message = %error.message, "malformed move text");
                self.publish(ServerEvent::MoveRejected {
                    message: error.message.clone(),
                });
                return Err(error);
            }
        };
        self.submit(from, to, source).await
    }

    /// Validates and commits one move, broadcasting the resulting board on
    /// success and a rejection event on failure.
    pub async fn submit(
        &self,
        from: Square,
        to: Square,
        source: MoveSource,
    ) -> Result<ServerEvent, ApiError> {
        let event = {
            let mut board = self.inner.board.lock().await;
            match board.apply(from, to) {
                Ok(_record) => {
                    info!(%from, %to, ?source, turn = %board.turn(), "move committed");
                    self.inner.turns.send_modify(|owner| {
                        owner.color = board.turn();
                        owner.seq += 1;
                    });
                    let event = board_updated(&board);
                    let _ = self.inner.events.send(event.clone());
                    event
                }
                Err(violation) => {
                    let message = violation.to_string();
                    warn!(%from, %to, ?source, %message, "move rejected");
                    let _ = self.inner.events.send(ServerEvent::MoveRejected {
                        message: message.clone(),
                    });
                    return Err(ApiError::new(ErrorCode::RuleViolation, message));
                }
            }
        };

        if source == MoveSource::Ui {
            self.dispatch_actuator(from, to);
        }
        Ok(event)
    }

    /// Replays a committed UI move on the physical board. Failures are
    /// logged and dropped: the logical commit already happened and the
    /// operator can recover the physical side by hand.
    fn dispatch_actuator(&self, from: Square, to: Square) {
        let Some(link) = &self.inner.actuator else {
            return;
        };
        let command = actuator_command(from, to);
        let transport = Arc::clone(&link.transport);
        let timeout = link.timeout;
        tokio::spawn(async move {
            match transport.send_command(&command, timeout).await {
                Ok(ack) => info!(%command, %ack, "actuator command acked"),
                Err(error) => warn!(%command, %error, "actuator command failed"),
            }
        });
    }
}

impl Default for GameContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Move text is exactly 5 characters with a single space at index 2, files
/// `a`-`f`, ranks `1`-`6`.
pub fn parse_move_text(text: &str) -> Result<(Square, Square), ApiError> {
    let bytes = text.as_bytes();
    if bytes.len() != 5 || bytes[2] != b' ' {
        return Err(ApiError::validation(
            "move must look like \"d5 d4\": two squares separated by one space",
        ));
    }
    let from = Square::from_notation(&text[..2]);
    let to = Square::from_notation(&text[3..]);
    match (from, to) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(ApiError::validation(
            "squares use files a-f and ranks 1-6",
        )),
    }
}

fn board_updated(board: &BoardState) -> ServerEvent {
    let mut grid = vec![vec![".".to_string(); BOARD_SIZE]; BOARD_SIZE];
    for rank in 0..BOARD_SIZE {
        for file in 0..BOARD_SIZE {
            let piece = Square::new(rank, file).and_then(|square| board.piece_at(square));
            if let Some(piece) = piece {
                grid[rank][file] = piece.letter().to_string();
            }
        }
    }

    ServerEvent::BoardUpdated {
        board: grid,
        turn: board.turn(),
        last_move: board.last_move().map(LastMove::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(notation: &str) -> Square {
        Square::from_notation(notation).expect("square")
    }

    #[test]
    fn move_text_must_be_five_chars_with_middle_space() {
        assert!(parse_move_text("a2 a3").is_ok());
        assert!(parse_move_text("a2a3").is_err());
        assert!(parse_move_text("a2  a3").is_err());
        assert!(parse_move_text("a2 a33").is_err());
        assert!(parse_move_text("g2 a3").is_err());
        assert!(parse_move_text("a7 a3").is_err());
        assert!(parse_move_text("").is_err());
    }

    #[tokio::test]
    async fn committed_move_broadcasts_board_and_advances_turn_watch() {
        let ctx = GameContext::new();
        let mut events = ctx.subscribe_events();
        let turns = ctx.watch_turns();

        let event = ctx
            .submit_text("a2 a3", MoveSource::Ui)
            .await
            .expect("commit");
        let ServerEvent::BoardUpdated {
            board,
            turn,
            last_move,
        } = event
        else {
            panic!("expected board update");
        };
        assert_eq!(turn, Color::Black);
        assert_eq!(board[3][0], "P");
        assert_eq!(board[4][0], ".");
        let last_move = last_move.expect("last move");
        assert_eq!((last_move.from.as_str(), last_move.to.as_str()), ("a2", "a3"));

        let owner = *turns.borrow();
        assert_eq!(owner, TurnOwner { color: Color::Black, seq: 1 });

        let broadcasted = events.recv().await.expect("event");
        assert!(matches!(broadcasted, ServerEvent::BoardUpdated { .. }));
    }

    #[tokio::test]
    async fn rule_rejection_reports_and_leaves_board_alone() {
        let ctx = GameContext::new();
        let mut events = ctx.subscribe_events();

        let error = ctx
            .submit_text("d5 d4", MoveSource::Ui)
            .await
            .expect_err("black cannot open");
        assert_eq!(error.code, ErrorCode::RuleViolation);

        let rejected = events.recv().await.expect("event");
        assert!(matches!(rejected, ServerEvent::MoveRejected { .. }));

        let ServerEvent::BoardUpdated { turn, .. } = ctx.board_view().await else {
            panic!("expected board view");
        };
        assert_eq!(turn, Color::White);
        assert_eq!(*ctx.watch_turns().borrow(), TurnOwner { color: Color::White, seq: 0 });
    }

    #[tokio::test]
    async fn malformed_text_is_rejected_before_the_board() {
        let ctx = GameContext::new();
        let mut events = ctx.subscribe_events();

        let error = ctx
            .submit_text("d5-d4", MoveSource::Physical)
            .await
            .expect_err("bad format");
        assert_eq!(error.code, ErrorCode::Validation);
        assert!(matches!(
            events.recv().await.expect("event"),
            ServerEvent::MoveRejected { .. }
        ));
    }

    #[tokio::test]
    async fn concurrent_identical_submissions_commit_exactly_once() {
        let ctx = GameContext::new();

        let a = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.submit(square("a2"), square("a3"), MoveSource::Ui).await })
        };
        let b = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                ctx.submit(square("a2"), square("a3"), MoveSource::Physical)
                    .await
            })
        };

        let results = [a.await.expect("join"), b.await.expect("join")];
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1, "exactly one submission may apply");
        assert_eq!(ctx.watch_turns().borrow().seq, 1);
    }
}
