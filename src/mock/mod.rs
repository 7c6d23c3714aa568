//! Scripted stand-ins for the board, serial devices, engine and console.

mod channel;
mod console;
mod engine;
mod script;

pub use channel::ScriptedChannel;
pub use console::ScriptedConsole;
pub use engine::ScriptedEngine;
pub use script::{ParseError, ScriptedBoard};
