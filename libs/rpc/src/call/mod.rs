pub mod raw;
pub mod typed;

pub use raw::{raw_call, CallOutcome, CallState, RawCall, TransportCall};
pub use typed::TypedCall;
