use observation::BoardObservation;
use vision::VisionError;

pub mod config;
pub mod console;
pub mod controller;
pub mod engine;
pub mod game_logic;
pub mod hardware;
pub mod mock;
pub mod observation;
pub mod ponder;
pub mod vision;
pub mod visualization;

/// Trait for reading square occupancy from the physical board.
///
/// Abstracts over the camera pipeline and mock/scripted inputs,
/// providing a uniform interface for the turn controller.
pub trait ObservationSource {
    /// Take a fresh snapshot of the board.
    ///
    /// Errors are treated as transient: the controller retries and
    /// eventually falls back to manual move entry.
    fn observe(&mut self) -> Result<BoardObservation, VisionError>;
}

impl<T: ObservationSource + ?Sized> ObservationSource for Box<T> {
    fn observe(&mut self) -> Result<BoardObservation, VisionError> {
        (**self).observe()
    }
}
