//! Core data types.

pub mod config;
pub mod outcome;
pub mod page;
pub mod site;
pub mod summary;

pub use config::*;
pub use outcome::*;
pub use page::*;
pub use site::*;
pub use summary::*;
