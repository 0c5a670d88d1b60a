#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod archive;
pub mod config;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;

pub use archive::DirectoryArchive;
pub use error::{Error, Result};
pub use store::IndexStore;
