//! The turn loop.
//!
//! One [`TurnController::step`] performs one state transition. Waiting for the
//! human polls the clock and console and returns; everything else runs to
//! completion before the next state is entered.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use shakmaty::{Color, Position};

use crate::ObservationSource;
use crate::config::Config;
use crate::console::{ConsoleEvent, ConsoleInput, is_quit, is_reset};
use crate::engine::{Engine, EngineResult};
use crate::game_logic::{
    BoardDiffResolver, DEFAULT_MAX_CHANGED_SQUARES, GameOverReason, GameState, Resolution,
    ResolvedMove,
};
use crate::hardware::clock::DEFAULT_INITIAL_SECONDS;
use crate::hardware::{ActuatorLink, ClockButton, ClockCommand, ClockLink};
use crate::observation::BoardObservation;
use crate::ponder::PonderManager;
use crate::visualization::{render_comparison, render_position, render_to_string};

const MANUAL_PROMPT: &str = "Enter your move (e.g. e2e4 or Nf3), or q to quit: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub human: Color,
    pub engine_depth: u8,
    /// Board reads per human turn before falling back to typed input.
    pub detection_attempts: u32,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub max_changed_squares: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            human: Color::White,
            engine_depth: 10,
            detection_attempts: 3,
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_millis(50),
            max_changed_squares: DEFAULT_MAX_CHANGED_SQUARES,
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            human: config.human_color.into(),
            engine_depth: config.engine.depth,
            detection_attempts: config.controller.detection_attempts.max(1),
            retry_delay: Duration::from_millis(config.controller.retry_delay_ms),
            poll_interval: Duration::from_millis(config.controller.poll_interval_ms),
            max_changed_squares: config.controller.max_changed_squares,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for the human to signal a finished move.
    AwaitingInput,
    Detecting {
        attempt: u32,
    },
    Resolving {
        attempt: u32,
        observation: BoardObservation,
    },
    /// Detection gave up; the operator types the move.
    ManualEntry,
    Applying(ResolvedMove),
    EngineThinking,
    ActuatorExecuting(ResolvedMove),
    GameOver(GameOverReason),
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::AwaitingInput => write!(f, "AwaitingInput"),
            TurnState::Detecting { attempt } => write!(f, "Detecting({attempt})"),
            TurnState::Resolving { attempt, .. } => write!(f, "Resolving({attempt})"),
            TurnState::ManualEntry => write!(f, "ManualEntry"),
            TurnState::Applying(mv) => write!(f, "Applying({mv})"),
            TurnState::EngineThinking => write!(f, "EngineThinking"),
            TurnState::ActuatorExecuting(mv) => write!(f, "ActuatorExecuting({mv})"),
            TurnState::GameOver(reason) => write!(f, "GameOver({reason})"),
        }
    }
}

/// Everything the turn loop knows about the game in progress.
#[derive(Debug)]
pub struct GameContext {
    pub game: GameState,
    /// Committed occupancy the next observation is diffed against.
    pub reference: BoardObservation,
    /// Observation behind the move being applied, if it came from the camera.
    pub last_observation: Option<BoardObservation>,
    /// The engine's last answer; its variation predicts the human's reply.
    pub last_engine_result: Option<EngineResult>,
    pub settings: ControllerSettings,
}

impl GameContext {
    pub fn new(game: GameState, settings: ControllerSettings) -> Self {
        Self {
            reference: game.occupancy(),
            game,
            last_observation: None,
            last_engine_result: None,
            settings,
        }
    }

    #[inline]
    pub fn engine_color(&self) -> Color {
        !self.settings.human
    }
}

/// Drives a game between the human at the board and the engine.
pub struct TurnController<O, C> {
    ctx: GameContext,
    state: TurnState,
    resolver: BoardDiffResolver,
    observer: O,
    console: C,
    engine: Arc<dyn Engine>,
    ponder: Option<PonderManager>,
    actuator: ActuatorLink,
    clock: ClockLink,
    console_open: bool,
    /// Pondering was already considered for this human turn.
    ponder_checked: bool,
}

impl<O: ObservationSource, C: ConsoleInput> TurnController<O, C> {
    pub fn new(
        game: GameState,
        settings: ControllerSettings,
        observer: O,
        console: C,
        engine: Arc<dyn Engine>,
        actuator: ActuatorLink,
    ) -> Self {
        let state = if game.turn() == settings.human {
            TurnState::AwaitingInput
        } else {
            TurnState::EngineThinking
        };
        Self {
            resolver: BoardDiffResolver::new(settings.max_changed_squares),
            ctx: GameContext::new(game, settings),
            state,
            observer,
            console,
            engine,
            ponder: None,
            actuator,
            clock: ClockLink::new(None, DEFAULT_INITIAL_SECONDS),
            console_open: true,
            ponder_checked: false,
        }
    }

    pub fn with_ponder(mut self, ponder: PonderManager) -> Self {
        self.ponder = Some(ponder);
        self
    }

    pub fn with_clock(mut self, clock: ClockLink) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    pub fn state(&self) -> &TurnState {
        &self.state
    }

    #[inline]
    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    #[inline]
    pub fn observer(&self) -> &O {
        &self.observer
    }

    #[inline]
    pub fn console(&self) -> &C {
        &self.console
    }

    #[inline]
    pub fn actuator(&self) -> &ActuatorLink {
        &self.actuator
    }

    #[inline]
    pub fn clock(&self) -> &ClockLink {
        &self.clock
    }

    #[inline]
    pub fn ponder(&self) -> Option<&PonderManager> {
        self.ponder.as_ref()
    }

    /// Home the arm and start the clock.
    pub fn start(&mut self) {
        if let Err(e) = self.actuator.home() {
            log::warn!("homing failed: {e}");
        }
        if let Err(e) = self.clock.start_game() {
            log::warn!("{e}, continuing without clock");
        }
        log::info!(
            "human plays {}, engine plays {}",
            self.ctx.settings.human,
            self.ctx.engine_color()
        );
        self.log_board();
    }

    /// Play until the game ends.
    pub fn run(&mut self) -> GameOverReason {
        self.start();
        loop {
            if let TurnState::GameOver(reason) = *self.step() {
                return reason;
            }
        }
    }

    /// Perform one transition.
    pub fn step(&mut self) -> &TurnState {
        let next = match self.state {
            TurnState::AwaitingInput => self.await_input(),
            TurnState::Detecting { attempt } => self.detect(attempt),
            TurnState::Resolving {
                attempt,
                observation,
            } => self.resolve(attempt, observation),
            TurnState::ManualEntry => self.manual_entry(),
            TurnState::Applying(mv) => self.apply(mv),
            TurnState::EngineThinking => self.think(),
            TurnState::ActuatorExecuting(mv) => self.actuate(mv),
            TurnState::GameOver(reason) => TurnState::GameOver(reason),
        };
        self.transition(next);
        &self.state
    }

    fn transition(&mut self, next: TurnState) {
        if next == self.state {
            return;
        }
        log::debug!("{} -> {}", self.state, next);
        if let TurnState::GameOver(reason) = next {
            self.finish(reason);
        }
        self.state = next;
    }

    fn finish(&mut self, reason: GameOverReason) {
        self.ctx.game.finish(reason);
        if let Some(ponder) = self.ponder.as_mut() {
            ponder.stop();
        }
        if let Err(e) = self.clock.send(ClockCommand::Stop) {
            log::warn!("failed to stop clock: {e}");
        }
        log::info!("game over: {reason}");
    }

    fn await_input(&mut self) -> TurnState {
        self.start_ponder();

        let button = match self.clock.check_button() {
            Ok(button) => button,
            Err(e) => {
                log::warn!("{e}, continuing without clock");
                None
            }
        };
        if let Some(loser) = self.clock.monitor().expired() {
            return TurnState::GameOver(GameOverReason::TimeExpired { loser });
        }
        match button {
            Some(button) if button == ClockButton::of(self.ctx.game.turn()) => {
                log::info!("clock {button} pressed ({})", self.clock.monitor().display());
                return TurnState::Detecting { attempt: 1 };
            }
            Some(button) => log::debug!("ignoring clock {button} press"),
            None => {}
        }

        if self.console_open {
            match self.console.poll_line() {
                Some(ConsoleEvent::Line(line)) if is_quit(&line) => {
                    return TurnState::GameOver(GameOverReason::UserQuit);
                }
                Some(ConsoleEvent::Line(line)) if is_reset(&line) => self.rebaseline(),
                Some(ConsoleEvent::Line(line)) if !line.is_empty() => {
                    match self.ctx.game.parse_move(&line) {
                        Some(mv) => return TurnState::Applying(mv),
                        None => {
                            log::warn!("'{line}' is not a legal move, reading the board instead");
                            return TurnState::Detecting { attempt: 1 };
                        }
                    }
                }
                Some(ConsoleEvent::Line(_)) => return TurnState::Detecting { attempt: 1 },
                Some(ConsoleEvent::Closed) => {
                    if !self.clock.is_connected() {
                        return TurnState::GameOver(GameOverReason::UserQuit);
                    }
                    log::info!("console closed, waiting for clock presses");
                    self.console_open = false;
                }
                None => {}
            }
        } else if !self.clock.is_connected() {
            log::warn!("console and clock are both gone");
            return TurnState::GameOver(GameOverReason::UserQuit);
        }

        std::thread::sleep(self.ctx.settings.poll_interval);
        TurnState::AwaitingInput
    }

    /// Start background analysis on the position after the expected reply.
    fn start_ponder(&mut self) {
        if self.ponder_checked {
            return;
        }
        self.ponder_checked = true;

        let Some(ponder) = self.ponder.as_mut() else {
            return;
        };
        if self.ctx.game.turn() != self.ctx.settings.human {
            return;
        }
        let Some(reply) = self
            .ctx
            .last_engine_result
            .as_ref()
            .and_then(EngineResult::expected_reply)
        else {
            log::debug!("no expected reply to ponder on");
            return;
        };
        let Ok(predicted) = reply.to_move(self.ctx.game.position()) else {
            log::debug!("expected reply {reply} is not legal, not pondering");
            return;
        };

        let mut target = self.ctx.game.position().clone();
        target.play_unchecked(predicted);
        log::debug!("pondering after expected reply {reply}");
        ponder.start(&target);
    }

    /// Take the current board as the new reference.
    fn rebaseline(&mut self) {
        match self.observer.observe() {
            Ok(observation) => {
                self.ctx.reference = observation;
                self.ctx.last_observation = None;
                log::info!("reference board reset from camera");
                let diagram =
                    render_to_string(|w| render_comparison(w, &observation, &self.ctx.game));
                log::info!("\n{diagram}");
            }
            Err(e) => log::warn!("cannot reset reference board: {e}"),
        }
    }

    fn detect(&mut self, attempt: u32) -> TurnState {
        match self.observer.observe() {
            Ok(observation) => TurnState::Resolving {
                attempt,
                observation,
            },
            Err(e) => {
                log::warn!("board capture failed on attempt {attempt}: {e}");
                self.retry(attempt)
            }
        }
    }

    fn retry(&self, attempt: u32) -> TurnState {
        if attempt < self.ctx.settings.detection_attempts {
            std::thread::sleep(self.ctx.settings.retry_delay);
            TurnState::Detecting {
                attempt: attempt + 1,
            }
        } else {
            log::warn!("no move detected after {attempt} attempts, falling back to manual entry");
            TurnState::ManualEntry
        }
    }

    fn resolve(&mut self, attempt: u32, observation: BoardObservation) -> TurnState {
        self.ctx.last_observation = Some(observation);
        match self
            .resolver
            .resolve(&self.ctx.game, &self.ctx.reference, &observation)
        {
            Resolution::Move(mv) => {
                log::info!("detected {mv}");
                TurnState::Applying(mv)
            }
            Resolution::NoChange => {
                log::info!("no move on the board yet");
                self.retry(attempt)
            }
            Resolution::Ambiguous(why) => {
                log::warn!("cannot tell the move: {why}");
                let diagram =
                    render_to_string(|w| render_comparison(w, &observation, &self.ctx.game));
                log::debug!("\n{diagram}");
                self.retry(attempt)
            }
            Resolution::Quit => TurnState::GameOver(GameOverReason::UserQuit),
        }
    }

    fn manual_entry(&mut self) -> TurnState {
        match self.console.read_line(MANUAL_PROMPT) {
            ConsoleEvent::Closed => TurnState::GameOver(GameOverReason::UserQuit),
            ConsoleEvent::Line(line) if is_quit(&line) => {
                TurnState::GameOver(GameOverReason::UserQuit)
            }
            ConsoleEvent::Line(line) => match self.ctx.game.parse_move(&line) {
                Some(mv) => TurnState::Applying(mv),
                None => {
                    log::warn!("'{line}' is not a legal move here");
                    TurnState::ManualEntry
                }
            },
        }
    }

    fn apply(&mut self, mv: ResolvedMove) -> TurnState {
        let mover = self.ctx.game.turn();
        let san = self
            .ctx
            .game
            .san(&mv)
            .unwrap_or_else(|| mv.to_string());
        if let Err(e) = self.ctx.game.apply(&mv) {
            log::error!("{e}");
            self.ctx.last_observation = None;
            return TurnState::AwaitingInput;
        }
        log::info!("{mover} plays {san} ({mv}, {})", mv.describe());

        if let Some(ponder) = self.ponder.as_mut() {
            ponder.stop_if_stale(self.ctx.game.position());
        }
        self.ctx.reference = self.ctx.game.occupancy();
        self.log_board();
        self.ctx.last_observation = None;

        if let Some(reason) = self.ctx.game.outcome() {
            return TurnState::GameOver(reason);
        }
        if self.ctx.game.turn() == self.ctx.settings.human {
            self.ponder_checked = false;
            TurnState::AwaitingInput
        } else {
            TurnState::EngineThinking
        }
    }

    fn think(&mut self) -> TurnState {
        let position = self.ctx.game.position().clone();
        let pondered = self
            .ponder
            .as_mut()
            .and_then(|ponder| ponder.take_result(&position));

        let result = match pondered {
            Some(result) => {
                log::info!("using pondered reply {}", result.best_move);
                Ok(result)
            }
            None => {
                if let Some(ponder) = self.ponder.as_mut() {
                    ponder.stop();
                }
                log::info!("engine thinking at depth {}", self.ctx.settings.engine_depth);
                let stop = AtomicBool::new(false);
                self.engine
                    .analyse(&position, self.ctx.settings.engine_depth, &stop)
            }
        };

        let game = &self.ctx.game;
        match result.and_then(|result| result.resolve(game).map(|mv| (result, mv))) {
            Ok((result, mv)) => {
                match result.score {
                    Some(score) => log::info!(
                        "engine plays {mv} ({score}, white wins {:.0}%)",
                        score.white_win_probability() * 100.0
                    ),
                    None => log::info!("engine plays {mv}"),
                }
                self.ctx.last_engine_result = Some(result);
                TurnState::ActuatorExecuting(mv)
            }
            Err(e) => {
                log::error!("engine failed: {e}; make the engine's move on the board by hand");
                self.ctx.last_engine_result = None;
                TurnState::AwaitingInput
            }
        }
    }

    fn actuate(&mut self, mv: ResolvedMove) -> TurnState {
        if let Err(e) = self.actuator.execute(&mv) {
            log::error!("arm failed on {mv}: {e}; finish the move by hand");
        }
        let button = ClockButton::of(self.ctx.game.turn());
        if let Err(e) = self.clock.send(ClockCommand::Press(button)) {
            log::warn!("{e}, continuing without clock");
        }
        TurnState::Applying(mv)
    }

    fn log_board(&self) {
        let diagram = match &self.ctx.last_observation {
            Some(observed) => {
                render_to_string(|w| render_comparison(w, observed, &self.ctx.game))
            }
            None => render_to_string(|w| render_position(w, &self.ctx.game)),
        };
        log::info!("after {} plies:\n{diagram}", self.ctx.game.move_count());
    }
}

impl<O, C> fmt::Debug for TurnController<O, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnController")
            .field("state", &self.state)
            .field("context", &self.ctx)
            .field("ponder", &self.ponder)
            .field("actuator", &self.actuator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedBoard, ScriptedConsole, ScriptedEngine};
    use crate::observation::Occupancy;

    fn settings() -> ControllerSettings {
        ControllerSettings {
            retry_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..ControllerSettings::default()
        }
    }

    fn controller(
        board: ScriptedBoard,
        console: ScriptedConsole,
        engine: ScriptedEngine,
    ) -> TurnController<ScriptedBoard, ScriptedConsole> {
        TurnController::new(
            GameState::new(),
            settings(),
            board,
            console,
            Arc::new(engine),
            ActuatorLink::dry_run(),
        )
    }

    #[test]
    fn starts_in_awaiting_input_for_human_to_move() {
        let c = controller(
            ScriptedBoard::new(),
            ScriptedConsole::default(),
            ScriptedEngine::new(),
        );
        assert_eq!(c.state(), &TurnState::AwaitingInput);
    }

    #[test]
    fn engine_moves_first_when_human_is_black() {
        let c = TurnController::new(
            GameState::new(),
            ControllerSettings {
                human: Color::Black,
                ..settings()
            },
            ScriptedBoard::new(),
            ScriptedConsole::default(),
            Arc::new(ScriptedEngine::new()),
            ActuatorLink::dry_run(),
        );
        assert_eq!(c.state(), &TurnState::EngineThinking);
    }

    #[test]
    fn enter_reads_board_and_applies_move() {
        let board = ScriptedBoard::new().with_script("e2 We4.").expect("script");
        let mut c = controller(board, ScriptedConsole::new([""]), ScriptedEngine::new());

        assert_eq!(c.step(), &TurnState::Detecting { attempt: 1 });
        assert!(matches!(c.step(), TurnState::Resolving { attempt: 1, .. }));
        let TurnState::Applying(mv) = *c.step() else {
            panic!("expected a move, got {}", c.state());
        };
        assert_eq!(mv.to_string(), "e2e4");
        assert_eq!(c.step(), &TurnState::EngineThinking);
        assert_eq!(c.context().game.move_count(), 1);
        assert_eq!(c.context().reference, c.context().game.occupancy());
    }

    #[test]
    fn idle_poll_keeps_waiting() {
        let mut c = controller(
            ScriptedBoard::new(),
            ScriptedConsole::default().then_idle(2),
            ScriptedEngine::new(),
        );
        assert_eq!(c.step(), &TurnState::AwaitingInput);
        assert_eq!(c.step(), &TurnState::AwaitingInput);
        // Script exhausted, no clock: nobody left to signal a move.
        assert_eq!(c.step(), &TurnState::GameOver(GameOverReason::UserQuit));
    }

    #[test]
    fn no_change_retries_then_falls_back_to_manual() {
        let console = ScriptedConsole::new(["", "zz", "d2d4"]);
        let mut c = controller(ScriptedBoard::new(), console, ScriptedEngine::new());

        assert_eq!(c.step(), &TurnState::Detecting { attempt: 1 });
        for attempt in 1..=3 {
            assert!(matches!(c.step(), TurnState::Resolving { .. }));
            let expected = if attempt < 3 {
                TurnState::Detecting {
                    attempt: attempt + 1,
                }
            } else {
                TurnState::ManualEntry
            };
            assert_eq!(c.step(), &expected);
        }
        // Illegal text keeps asking.
        assert_eq!(c.step(), &TurnState::ManualEntry);
        assert!(matches!(c.step(), TurnState::Applying(mv) if mv.to_string() == "d2d4"));
        assert_eq!(c.observer().observations(), 3);
    }

    #[test]
    fn ambiguous_board_is_retried() {
        let board = ScriptedBoard::new()
            .with_script("e2. e2 We4.")
            .expect("script");
        let mut c = controller(board, ScriptedConsole::new([""]), ScriptedEngine::new());

        c.step();
        c.step();
        assert_eq!(c.step(), &TurnState::Detecting { attempt: 2 });
        c.step();
        assert!(matches!(c.step(), TurnState::Applying(mv) if mv.to_string() == "e2e4"));
    }

    #[test]
    fn capture_failure_is_retried() {
        let board = ScriptedBoard::new().with_script("!. g1 Wf3.").expect("script");
        let mut c = controller(board, ScriptedConsole::new([""]), ScriptedEngine::new());

        c.step();
        assert_eq!(c.step(), &TurnState::Detecting { attempt: 2 });
        c.step();
        assert!(matches!(c.step(), TurnState::Applying(mv) if mv.to_string() == "g1f3"));
    }

    #[test]
    fn quit_ends_game() {
        let mut c = controller(
            ScriptedBoard::new(),
            ScriptedConsole::new(["quit"]),
            ScriptedEngine::new(),
        );
        assert_eq!(c.step(), &TurnState::GameOver(GameOverReason::UserQuit));
        assert_eq!(c.context().game.game_over(), Some(GameOverReason::UserQuit));
        // Terminal.
        assert_eq!(c.step(), &TurnState::GameOver(GameOverReason::UserQuit));
    }

    #[test]
    fn reset_absorbs_knocked_over_piece() {
        let board = ScriptedBoard::new()
            .with_script("a2. e2 We4.")
            .expect("script");
        let mut c = controller(board, ScriptedConsole::new(["r", ""]), ScriptedEngine::new());

        assert_eq!(c.step(), &TurnState::AwaitingInput);
        let ctx = c.context();
        assert_eq!(ctx.reference.at(shakmaty::Square::A2), Occupancy::Empty);
        assert_eq!(ctx.last_observation, None);
        assert_eq!(ctx.game.move_count(), 0);

        assert_eq!(c.step(), &TurnState::Detecting { attempt: 1 });
        assert!(matches!(c.step(), TurnState::Resolving { attempt: 1, .. }));
        assert!(matches!(c.step(), TurnState::Applying(mv) if mv.to_string() == "e2e4"));
    }

    #[test]
    fn typed_move_is_applied_directly() {
        let mut c = controller(
            ScriptedBoard::new(),
            ScriptedConsole::new(["Nf3"]),
            ScriptedEngine::new(),
        );
        assert!(matches!(c.step(), TurnState::Applying(mv) if mv.to_string() == "g1f3"));
    }

    #[test]
    fn engine_reply_goes_through_actuator_then_applies() {
        let board = ScriptedBoard::new().with_script("e2 We4.").expect("script");
        let engine = ScriptedEngine::new()
            .with_reply(&["e2e4"], &["e7e5", "g1f3"])
            .expect("script");
        let mut c = controller(board, ScriptedConsole::new([""]), engine);

        while c.state() != &TurnState::EngineThinking {
            c.step();
        }
        let TurnState::ActuatorExecuting(mv) = *c.step() else {
            panic!("expected actuation, got {}", c.state());
        };
        assert_eq!(mv.to_string(), "e7e5");
        assert!(matches!(c.step(), TurnState::Applying(_)));
        assert_eq!(c.step(), &TurnState::AwaitingInput);

        let ctx = c.context();
        assert_eq!(ctx.game.move_count(), 2);
        assert_eq!(ctx.game.turn(), Color::White);
        assert_eq!(
            ctx.last_engine_result
                .as_ref()
                .and_then(EngineResult::expected_reply)
                .map(ToString::to_string)
                .as_deref(),
            Some("g1f3")
        );
    }

    #[test]
    fn engine_failure_returns_to_awaiting_input() {
        let mut c = controller(
            ScriptedBoard::new(),
            ScriptedConsole::new(["e2e4"]),
            ScriptedEngine::failing(),
        );
        c.step();
        assert_eq!(c.step(), &TurnState::EngineThinking);
        assert_eq!(c.step(), &TurnState::AwaitingInput);
        assert_eq!(c.context().game.turn(), Color::Black);
    }

    #[test]
    fn checkmate_ends_game() {
        let game = GameState::from_fen(
            "rnbqkbnr/ppppp2p/5p2/6p1/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3",
        )
        .expect("valid fen");
        let mut c = TurnController::new(
            game,
            settings(),
            ScriptedBoard::new(),
            ScriptedConsole::new(["Qh5"]),
            Arc::new(ScriptedEngine::new()),
            ActuatorLink::dry_run(),
        );
        c.step();
        assert_eq!(
            c.step(),
            &TurnState::GameOver(GameOverReason::Checkmate {
                winner: Color::White
            })
        );
    }
}
