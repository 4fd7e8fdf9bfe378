pub mod clock;
pub mod config;
pub mod error;

pub use clock::*;
pub use config::*;
pub use error::*;
