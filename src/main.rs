use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use chessbot::config::Config;
use chessbot::console::StdinConsole;
use chessbot::controller::{ControllerSettings, TurnController};
use chessbot::engine::{Engine, UciEngine, UciOptions};
use chessbot::game_logic::GameState;
use chessbot::hardware::serial::open_optional;
use chessbot::hardware::{ActuatorLink, ClockLink};
use chessbot::ponder::PonderManager;
use chessbot::vision::{GridFileSource, TextGridClassifier, VisionPipeline};

/// Play chess against an engine on a physical board.
#[derive(Parser, Debug)]
#[command(name = "chessbot", version, about, long_about = None)]
struct Args {
    /// TOML configuration file; missing means defaults.
    #[arg(short, long, default_value = "chessbot.toml")]
    config: PathBuf,

    /// Ignore configured serial ports and only log arm and clock commands.
    #[arg(long)]
    dry_run: bool,

    /// Start from this FEN instead of the initial position.
    #[arg(long)]
    fen: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if args.dry_run {
        config = config.without_hardware();
    }

    let game = match &args.fen {
        Some(fen) => GameState::from_fen(fen)?,
        None => GameState::new(),
    };

    let engine: Arc<dyn Engine> = Arc::new(
        UciEngine::spawn(
            &config.engine.path,
            UciOptions {
                skill_level: config.engine.skill_level,
                search_timeout: Duration::from_millis(config.engine.search_timeout_ms),
            },
        )
        .context("chess engine is required")?,
    );

    let actuator = ActuatorLink::new(
        open_optional(
            "arm",
            config.actuator.port.as_deref(),
            config.actuator.baud,
        ),
        config.actuator.timings(),
    );
    let clock = ClockLink::new(
        open_optional("clock", config.clock.port.as_deref(), config.clock.baud),
        config.clock.initial_seconds,
    );

    let camera = VisionPipeline::new(
        GridFileSource::new(&config.vision.grid_path),
        TextGridClassifier,
    );
    let console = StdinConsole::spawn().context("failed to start console reader")?;

    let mut controller = TurnController::new(
        game,
        ControllerSettings::from(&config),
        camera,
        console,
        Arc::clone(&engine),
        actuator,
    )
    .with_clock(clock);
    if config.ponder.enabled {
        controller = controller.with_ponder(PonderManager::new(
            engine,
            config.engine.depth,
            Duration::from_millis(config.ponder.join_timeout_ms),
        ));
    }

    println!("Make your move, then press Enter or your clock button. 'r' resets the board, 'q' quits.");
    let reason = controller.run();
    println!("Game over: {reason}");
    Ok(())
}
