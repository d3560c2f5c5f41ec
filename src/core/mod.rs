pub mod config;
pub mod error;
pub mod layout;
pub mod media;


pub use config::*;
pub use error::*;
pub use layout::*;
