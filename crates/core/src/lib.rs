//! Core runtime for tick-driven control planes.
//!
//! This crate provides the two building blocks the coordination layer is
//! built on:
//!
//! - [`StateMachine`]: a named, tick-driven state machine with delay hints,
//!   state-change observers and a terminal reset for teardown
//! - [`Periodic`]: a poll-and-fire rate limiter for log output
//!
//! # Architecture
//!
//! The machine is externally driven: a driver loop calls
//! [`StateMachine::tick`] with the current time, the owner's
//! [`StateHandlers`] implementation performs one bounded unit of work and
//! returns a [`Step`] naming the next state. No handler blocks on I/O;
//! waiting is expressed as a delay hint the machine enforces between ticks.

mod periodic;
mod state_machine;

pub use periodic::Periodic;
pub use state_machine::{StateHandlers, StateMachine, Step};
