pub mod cache;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod error_utils;
pub mod random;
pub mod types;

pub use cache::*;
pub use collaborators::*;
pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use random::*;
pub use types::*;
