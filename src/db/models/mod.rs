pub mod alarm;
pub mod ring_session;

pub use alarm::{AlarmDraft, AlarmRecord, DEFAULT_LABEL};
pub use ring_session::{RingOutcome, RingSession};
