//! # reactive-fsm
//!
//! A reactive finite state machine runtime for Tokio. A pure transition
//! function turns a stream of submitted events into an observable sequence of
//! states, and transitions may trigger asynchronous side effects whose
//! results come back as new events.
//!
//! ## Example
//!
//! ```rust
//! use reactive_fsm::{AsyncStateMachine, SideEffect, StateMachine, Transition};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Door {
//!     Closed,
//!     Opening,
//!     Open,
//! }
//!
//! #[derive(Debug)]
//! enum Command {
//!     Open,
//!     Opened,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let door = StateMachine::new(Door::Closed, |door, command| match (door, command) {
//!     (Door::Closed, Command::Open) => {
//!         Transition::to(Door::Opening).with_effect(SideEffect::emit(async { Command::Opened }))
//!     }
//!     (Door::Opening, Command::Opened) => Transition::to(Door::Open),
//!     _ => Transition::stay(),
//! });
//!
//! let mut machine = AsyncStateMachine::new(door);
//! machine.send(Command::Open);
//!
//! let mut states = machine.states();
//! assert_eq!(states.next().await.unwrap().unwrap(), Door::Closed);
//! assert_eq!(states.next().await.unwrap().unwrap(), Door::Opening);
//! assert_eq!(states.next().await.unwrap().unwrap(), Door::Open);
//! # }
//! ```

mod config;
mod executor;
mod handle;
mod machine;
mod queue;

#[doc(inline)]
pub use crate::config::Config;
#[doc(inline)]
pub use crate::executor::{Execution, RunningEffect, SideEffectExecutor};
#[doc(inline)]
pub use crate::handle::{MachineTask, StateHandle, spawn, spawn_with_config};
#[doc(inline)]
pub use crate::machine::{AsyncStateMachine, States};
#[doc(inline)]
pub use crate::queue::{EventSender, FeedbackSink};
#[doc(inline)]
pub use reactive_fsm_core::*;
