//! # Device Link
//!
//! Wire protocol, the session state machine and the tokio loop that drives it.

pub mod driver;
pub mod protocol;
pub mod session;

pub use driver::{flush, run, Exit};
pub use protocol::{Command, Mode, MotorValues};
pub use session::{LinkSession, PullStatus, PushPhase, SessionEvent, SessionOptions};
