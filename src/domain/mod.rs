//! Domain layer - value objects, session state machines, and the overlay model

pub mod capture;
pub mod overlay;
pub mod session;
