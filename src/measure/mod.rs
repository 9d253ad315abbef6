pub mod machine;
pub mod posture;
pub mod runner;
pub mod session;

pub use machine::{ArmedStance, BalanceStateMachine, TickOutcome};
pub use posture::PostureCriteria;
pub use runner::{MeasurerRunner, SessionCommand, SessionHandle, StatusSnapshot};
pub use session::{MeasurementSession, Mode, ScoreRecord};
