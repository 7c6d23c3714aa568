pub mod actuator;
pub mod clock;
pub mod serial;

pub use actuator::{ActuatorCommand, ActuatorError, ActuatorLink, ActuatorTimings};
pub use clock::{ClockButton, ClockCommand, ClockError, ClockLink, ClockMonitor, ClockSample};
pub use serial::{PortChannel, SerialChannel, SerialError};
