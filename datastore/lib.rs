#[macro_use]
extern crate log;

#[macro_use]
pub mod error;
pub mod exec;
pub mod migrate;
pub mod schema;
mod sql_writer;

pub use self::error::{Error, ErrorKind, Result};
