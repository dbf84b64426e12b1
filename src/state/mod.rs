// State module.
// Fetch lifecycle states and their pure transition function.

pub mod fetch;

pub use fetch::{FetchEvent, FetchState};
