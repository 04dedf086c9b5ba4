mod bound;
mod config;
mod error;
mod row;
mod security;
mod util;

pub use ::anyhow::Context;
pub use bound::*;
pub use config::*;
pub use error::*;
pub use row::*;
pub use security::*;
pub use util::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
