mod client;
mod events;
mod reference;

pub use client::*;
pub use events::*;
pub use reference::*;
