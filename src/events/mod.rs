//! # Events Module
//!
//! Progress reporting for pipeline runs.
//!
//! ## Design
//! The executor emits events through a channel so any front end (the CLI
//! spinner, a log, a test) can follow stages as they start and finish.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Stage(StageEvent::Finished { name, items_emitted, .. }) = event {
//!             println!("{name} emitted {items_emitted} items");
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
