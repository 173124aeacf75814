//! USB protocol engine and task scheduler for the HB100 guitar
//! multi-effects unit.
//!
//! This crate is the runtime core of the editor:
//!
//! - **Tasks**: [`Task`] / [`TaskKind`] describe every command the system
//!   executes, whether it came from the CLI, the HTTP/WebSocket API or a
//!   startup option; [`TaskQueue`] is the strict-FIFO hand-off between
//!   producers and the engine.
//! - **Wire protocol**: [`wire`] holds the captured request templates and
//!   endpoint constants verbatim; [`frame`] isolates the observational
//!   de-framing rules and the response reassembly buffer.
//! - **Engine**: [`Engine`] executes one task at a time over a
//!   [`Transport`] (the real [`UsbTransport`] or a scripted one in tests),
//!   feeds downloaded presets into the store, and drives the event loop.
//!
//! The engine deliberately knows nothing about argument parsing, line
//! editing or HTTP: external surfaces enqueue tasks and receive completion
//! callbacks, nothing more.

pub mod frame;
pub mod wire;

mod engine;
mod error;
mod queue;
mod task;
mod usb;

pub use engine::{DeviceInfo, Engine, COMMAND_HELP};
pub use error::EngineError;
pub use queue::TaskQueue;
pub use task::{Completion, PresetRef, Task, TaskKind};
pub use usb::{Transport, UsbTransport};
