//! Control Panel: projects a snapshot into editable rows and turns user
//! interaction into store mutations.
//!
//! # Invariants
//! - The panel holds no object state of its own; every row is read from the
//!   snapshot it is given.
//! - All changes flow through [`ControlPanel::apply`] into the store.

mod explorer;
mod intent;

pub use explorer::{Explorer, PanelRow, SliderSpec};
pub use intent::{ControlPanel, PanelIntent, bootstrap};
