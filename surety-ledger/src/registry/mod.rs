//! Airline and flight registries.

mod airlines;
mod flights;

pub use airlines::{Airline, AirlineRegistry, AirlineState};
pub use flights::{Flight, FlightRegistry};
