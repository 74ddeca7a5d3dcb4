pub mod baseline;
pub mod config;
pub mod journal;
pub mod session;
pub mod timer;

pub use baseline::*;
pub use config::*;
pub use session::*;
pub use timer::*;
