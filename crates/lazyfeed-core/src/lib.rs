//! Core runtime for Lazyfeed: a serial UI execution context plus the
//! observable state cells feed components publish through.
//!
//! Everything stateful in a feed lives on one logical UI thread. The
//! [`Runtime`] serializes mutation through its drain loop; [`MutableState`]
//! and [`StateList`] hold the values and notify watchers on change. Async
//! work (page fetches) runs as futures spawned on the runtime, so results
//! land back on the UI thread before they touch any state.

pub mod platform;

mod runtime;
mod state;

pub use platform::{DefaultScheduler, RuntimeScheduler};
pub use runtime::{Runtime, RuntimeHandle, TaskHandle, UiDispatcher};
pub use state::{MutableState, State, StateList, WatcherId};
