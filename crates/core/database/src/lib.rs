mod drivers;
mod models;

pub use drivers::*;
pub use models::*;
