//! Application layer: the user mapper facade, its error boundary and the demo.

pub mod bootstrap;
pub mod demo;
pub mod error;
pub mod users;
