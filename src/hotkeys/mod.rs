pub mod events;
pub mod manager;


pub use events::*;
pub use manager::*;
