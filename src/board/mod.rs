pub mod clock;
pub mod geometry;
pub mod grouping;
pub mod history;
pub mod layout;
pub mod lifecycle;
pub mod model;
pub mod ports;
pub mod registry;
pub mod session;
pub mod store;

pub use session::{Board, BoardPhase};
