//! External lookups used alongside the planner.

pub mod flight;

pub use flight::{FlightSearch, SerperFlightSearch, format_flight_results};
