pub mod board;
pub mod error;
pub mod persistence;

pub use board::{Board, BoardPhase};
pub use error::{BoardError, BoardResult};
