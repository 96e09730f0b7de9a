//! Core engine — bet intake and the settlement loop.

pub mod intake;
pub mod settlement;
