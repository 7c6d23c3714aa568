//! Camera-side collaborators.
//!
//! Frame capture and the occupancy classifier live outside this crate; the
//! controller only sees them through [`VisionSource`] and [`PieceClassifier`].
//! [`GridFileSource`] and [`TextGridClassifier`] bridge to a classifier that
//! runs as a separate process and writes its latest 8×8 grid to a file.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::ObservationSource;
use crate::observation::{BoardObservation, GridParseError};

/// Errors raised while producing an observation. Retried by the caller.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("classifier rejected frame: {0}")]
    Classify(String),

    #[error("grid decode failed: {0}")]
    Grid(#[from] GridParseError),

    #[error("capture device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rectified camera frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Produces rectified frames of the board.
pub trait VisionSource {
    fn capture_frame(&mut self) -> Result<Frame, VisionError>;
}

/// Turns a frame into an 8×8 occupancy grid.
pub trait PieceClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<BoardObservation, VisionError>;
}

/// Capture followed by classification.
#[derive(Debug)]
pub struct VisionPipeline<V, C> {
    source: V,
    classifier: C,
}

impl<V: VisionSource, C: PieceClassifier> VisionPipeline<V, C> {
    pub fn new(source: V, classifier: C) -> Self {
        Self { source, classifier }
    }
}

impl<V: VisionSource, C: PieceClassifier> ObservationSource for VisionPipeline<V, C> {
    fn observe(&mut self) -> Result<BoardObservation, VisionError> {
        let frame = self.source.capture_frame()?;
        log::trace!("captured {}x{} frame", frame.width, frame.height);
        self.classifier.classify(&frame)
    }
}

/// A capture device shared with other consumers (e.g. a monitoring view).
///
/// Physical reads are serialized behind a mutex so at most one is in flight.
#[derive(Debug)]
pub struct SharedCapture<V> {
    inner: Arc<Mutex<V>>,
}

impl<V> Clone for SharedCapture<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: VisionSource> SharedCapture<V> {
    pub fn new(source: V) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }
}

impl<V: VisionSource> VisionSource for SharedCapture<V> {
    fn capture_frame(&mut self) -> Result<Frame, VisionError> {
        self.inner.lock().capture_frame()
    }
}

/// Reads the grid file written by an out-of-process classifier.
///
/// The file content is handed on unchanged as the frame payload.
#[derive(Debug, Clone)]
pub struct GridFileSource {
    path: PathBuf,
}

impl GridFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VisionSource for GridFileSource {
    fn capture_frame(&mut self) -> Result<Frame, VisionError> {
        let data = std::fs::read(&self.path)?;
        Ok(Frame {
            width: 8,
            height: 8,
            data,
        })
    }
}

/// Decodes a text-grid frame (see [`BoardObservation`]'s `FromStr`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TextGridClassifier;

impl PieceClassifier for TextGridClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<BoardObservation, VisionError> {
        let text = std::str::from_utf8(&frame.data)
            .map_err(|e| VisionError::Classify(format!("grid is not UTF-8: {e}")))?;
        Ok(text.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Occupancy;
    use shakmaty::{Chess, Square};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource(String);

    impl VisionSource for FixedSource {
        fn capture_frame(&mut self) -> Result<Frame, VisionError> {
            Ok(Frame {
                width: 8,
                height: 8,
                data: self.0.as_bytes().to_vec(),
            })
        }
    }

    struct CountingSource(Arc<AtomicUsize>);

    impl VisionSource for CountingSource {
        fn capture_frame(&mut self) -> Result<Frame, VisionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(VisionError::Capture("no device".into()))
        }
    }

    #[test]
    fn pipeline_classifies_captured_grid() {
        let grid = BoardObservation::from_position(&Chess::default())
            .with(Square::E2, Occupancy::Empty)
            .with(Square::E4, Occupancy::White)
            .to_string();

        let mut pipeline = VisionPipeline::new(FixedSource(grid), TextGridClassifier);
        let obs = pipeline.observe().expect("valid grid");

        assert_eq!(obs.at(Square::E4), Occupancy::White);
        assert_eq!(obs.at(Square::E2), Occupancy::Empty);
    }

    #[test]
    fn pipeline_surfaces_grid_errors() {
        let mut pipeline = VisionPipeline::new(FixedSource("WWW".into()), TextGridClassifier);
        assert!(matches!(pipeline.observe(), Err(VisionError::Grid(_))));
    }

    #[test]
    fn shared_capture_clones_use_one_device() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut a = SharedCapture::new(CountingSource(Arc::clone(&reads)));
        let mut b = a.clone();

        assert!(a.capture_frame().is_err());
        assert!(b.capture_frame().is_err());
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_grid_file_is_io_error() {
        let mut source = GridFileSource::new("/nonexistent/chessbot/board.grid");
        assert!(matches!(source.capture_frame(), Err(VisionError::Io(_))));
    }
}
