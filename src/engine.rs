//! Chess engine access over UCI.

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use shakmaty::{Chess, Color, EnPassantMode, Position, fen::Fen, uci::UciMove};
use thiserror::Error;

use crate::game_logic::{GameState, ResolvedMove};

/// How often a running search checks its stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Bound on the `uci`/`isready` handshakes.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("engine I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("engine process terminated")]
    Terminated,

    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("engine reports no legal move")]
    NoLegalMove,

    #[error("engine suggested illegal move {0}")]
    IllegalMove(String),

    #[error("unexpected engine output: {0}")]
    Protocol(String),
}

/// Evaluation from white's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns.
    Cp(i32),
    /// Mate in N moves; negative when black mates.
    Mate(i32),
}

impl Score {
    /// Logistic win estimate for white: `1 / (1 + 10^(-cp/400))`.
    pub fn white_win_probability(self) -> f64 {
        match self {
            Score::Cp(cp) => 1.0 / (1.0 + 10f64.powf(-f64::from(cp) / 400.0)),
            Score::Mate(n) if n > 0 => 1.0,
            Score::Mate(_) => 0.0,
        }
    }

    fn from_side_to_move(self, turn: Color) -> Self {
        match (turn, self) {
            (Color::White, score) => score,
            (Color::Black, Score::Cp(cp)) => Score::Cp(-cp),
            (Color::Black, Score::Mate(n)) => Score::Mate(-n),
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Score::Mate(n) => write!(f, "#{n}"),
        }
    }
}

/// A completed analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    pub best_move: UciMove,
    /// Principal variation, starting with the best move.
    pub pv: Vec<UciMove>,
    pub score: Option<Score>,
}

impl EngineResult {
    /// The opponent reply the engine expects after its best move.
    pub fn expected_reply(&self) -> Option<&UciMove> {
        self.pv.get(1)
    }

    /// The first move of the variation, validated against `game`.
    pub fn resolve(&self, game: &GameState) -> Result<ResolvedMove, EngineError> {
        let first = self.pv.first().unwrap_or(&self.best_move);
        first
            .to_move(game.position())
            .ok()
            .as_ref()
            .and_then(ResolvedMove::from_move)
            .ok_or_else(|| EngineError::IllegalMove(first.to_string()))
    }
}

/// Something that can search a position.
///
/// `stop` is checked cooperatively; a stopped search may return its best move
/// so far or an error.
pub trait Engine: Send + Sync {
    fn analyse(
        &self,
        position: &Chess,
        depth: u8,
        stop: &AtomicBool,
    ) -> Result<EngineResult, EngineError>;
}

impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn analyse(
        &self,
        position: &Chess,
        depth: u8,
        stop: &AtomicBool,
    ) -> Result<EngineResult, EngineError> {
        (**self).analyse(position, depth, stop)
    }
}

/// Options applied once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UciOptions {
    pub skill_level: u8,
    pub search_timeout: Duration,
}

impl Default for UciOptions {
    fn default() -> Self {
        Self {
            skill_level: 20,
            search_timeout: Duration::from_secs(30),
        }
    }
}

struct UciProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
}

impl UciProcess {
    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        log::trace!("engine <- {command}");
        writeln!(self.stdin, "{command}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn recv(&self, timeout: Duration) -> Result<Option<String>, EngineError> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => {
                log::trace!("engine -> {line}");
                Ok(Some(line))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Terminated),
        }
    }

    /// Send `command` and skip output until a line equal to `reply`.
    fn handshake(&mut self, command: &str, reply: &str) -> Result<(), EngineError> {
        self.send(command)?;
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EngineError::Timeout(HANDSHAKE_TIMEOUT));
            }
            if let Some(line) = self.recv(remaining)?
                && line.trim() == reply
            {
                return Ok(());
            }
        }
    }
}

impl Drop for UciProcess {
    fn drop(&mut self) {
        let _ = self.send("quit");
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        log::warn!("engine did not quit, killing it");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A UCI engine running as a child process (e.g. Stockfish).
pub struct UciEngine {
    path: PathBuf,
    options: UciOptions,
    process: Mutex<UciProcess>,
}

impl UciEngine {
    pub fn spawn(path: impl AsRef<Path>, options: UciOptions) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let mut child = Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Terminated)?;
        let stdout = child.stdout.take().ok_or(EngineError::Terminated)?;

        let (tx, lines) = crossbeam_channel::unbounded();
        std::thread::Builder::new()
            .name("uci-reader".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        let mut process = UciProcess {
            child,
            stdin,
            lines,
        };
        process.handshake("uci", "uciok")?;
        process.send(&format!(
            "setoption name Skill Level value {}",
            options.skill_level
        ))?;
        process.handshake("isready", "readyok")?;
        log::info!(
            "engine {} ready (skill level {})",
            path.display(),
            options.skill_level
        );

        Ok(Self {
            path,
            options,
            process: Mutex::new(process),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Engine for UciEngine {
    fn analyse(
        &self,
        position: &Chess,
        depth: u8,
        stop: &AtomicBool,
    ) -> Result<EngineResult, EngineError> {
        let mut process = self.process.lock();

        // Also flushes a late `bestmove` left over from an abandoned search.
        process.handshake("isready", "readyok")?;

        let fen = Fen::from_position(position, EnPassantMode::Legal);
        process.send(&format!("position fen {fen}"))?;
        process.send(&format!("go depth {depth}"))?;

        let turn = position.turn();
        let deadline = Instant::now() + self.options.search_timeout;
        let mut info = SearchInfo::default();
        let mut stop_deadline: Option<Instant> = None;

        loop {
            if stop_deadline.is_none() && (stop.load(Ordering::Acquire) || Instant::now() >= deadline)
            {
                process.send("stop")?;
                stop_deadline = Some(Instant::now() + HANDSHAKE_TIMEOUT);
            }

            let Some(line) = process.recv(STOP_POLL)? else {
                if stop_deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(EngineError::Timeout(self.options.search_timeout));
                }
                continue;
            };

            if line.starts_with("info") {
                info.update(&line);
            } else if line.starts_with("bestmove") {
                let best_move = parse_bestmove(&line)?;
                let mut pv = info.pv;
                if pv.first() != Some(&best_move) {
                    pv = vec![best_move.clone()];
                }
                return Ok(EngineResult {
                    best_move,
                    pv,
                    score: info.score.map(|s| s.from_side_to_move(turn)),
                });
            }
        }
    }
}

impl std::fmt::Debug for UciEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UciEngine")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish()
    }
}

/// Latest search information, scores from the side to move.
#[derive(Debug, Default)]
struct SearchInfo {
    score: Option<Score>,
    pv: Vec<UciMove>,
}

impl SearchInfo {
    fn update(&mut self, line: &str) {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            match token {
                "score" => {
                    let kind = tokens.next();
                    let value = tokens.next().and_then(|v| v.parse::<i32>().ok());
                    match (kind, value) {
                        (Some("cp"), Some(cp)) => self.score = Some(Score::Cp(cp)),
                        (Some("mate"), Some(n)) => self.score = Some(Score::Mate(n)),
                        _ => {}
                    }
                }
                "pv" => {
                    self.pv = tokens.by_ref().map_while(|t| t.parse().ok()).collect();
                }
                _ => {}
            }
        }
    }
}

fn parse_bestmove(line: &str) -> Result<UciMove, EngineError> {
    let token = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| EngineError::Protocol(line.to_string()))?;
    if token == "(none)" || token == "0000" {
        return Err(EngineError::NoLegalMove);
    }
    token
        .parse()
        .map_err(|_| EngineError::Protocol(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn uci(s: &str) -> UciMove {
        s.parse().expect("valid uci")
    }

    #[test]
    fn info_line_updates_score_and_pv() {
        let mut info = SearchInfo::default();
        info.update("info depth 12 seldepth 18 score cp 34 nodes 1000 pv e2e4 e7e5 g1f3");
        assert_eq!(info.score, Some(Score::Cp(34)));
        assert_eq!(info.pv, vec![uci("e2e4"), uci("e7e5"), uci("g1f3")]);

        info.update("info depth 13 currmove d2d4 currmovenumber 2");
        assert_eq!(info.pv.len(), 3, "lines without pv keep the previous one");

        info.update("info depth 20 score mate -3 pv h7h8q");
        assert_eq!(info.score, Some(Score::Mate(-3)));
    }

    #[test_case("bestmove e2e4 ponder e7e5", Some("e2e4"))]
    #[test_case("bestmove e7e8q", Some("e7e8q"))]
    #[test_case("bestmove (none)", None)]
    fn bestmove_lines(line: &str, expected: Option<&str>) {
        match (parse_bestmove(line), expected) {
            (Ok(mv), Some(text)) => assert_eq!(mv, uci(text)),
            (Err(EngineError::NoLegalMove), None) => {}
            (other, _) => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_bestmove_is_protocol_error() {
        assert!(matches!(
            parse_bestmove("bestmove"),
            Err(EngineError::Protocol(_))
        ));
    }

    #[test]
    fn scores_are_flipped_for_black() {
        assert_eq!(Score::Cp(50).from_side_to_move(Color::Black), Score::Cp(-50));
        assert_eq!(Score::Mate(2).from_side_to_move(Color::Black), Score::Mate(-2));
        assert_eq!(Score::Cp(50).from_side_to_move(Color::White), Score::Cp(50));
    }

    #[test]
    fn win_probability() {
        assert!((Score::Cp(0).white_win_probability() - 0.5).abs() < 1e-9);
        assert!((Score::Cp(400).white_win_probability() - 10.0 / 11.0).abs() < 1e-9);
        assert_eq!(Score::Mate(3).white_win_probability(), 1.0);
        assert_eq!(Score::Mate(-1).white_win_probability(), 0.0);
    }

    #[test]
    fn result_resolves_against_game() {
        let game = GameState::new();
        let result = EngineResult {
            best_move: uci("g1f3"),
            pv: vec![uci("g1f3"), uci("d7d5")],
            score: Some(Score::Cp(20)),
        };
        assert_eq!(result.resolve(&game).expect("legal").to_string(), "g1f3");
        assert_eq!(result.expected_reply(), Some(&uci("d7d5")));
    }

    #[test]
    fn illegal_result_is_rejected() {
        let result = EngineResult {
            best_move: uci("e7e5"),
            pv: vec![],
            score: None,
        };
        assert!(matches!(
            result.resolve(&GameState::new()),
            Err(EngineError::IllegalMove(m)) if m == "e7e5"
        ));
    }

    #[test]
    fn missing_binary_fails_to_spawn() {
        let err = UciEngine::spawn("/nonexistent/chessbot-engine", UciOptions::default())
            .expect_err("no such binary");
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
