//! Stateless repositories. Every method takes `&Connection`.

pub mod command;
pub mod fusion;
pub mod quiz;
pub mod segment;
pub mod session;
pub mod transcript;
pub mod whiteboard;
