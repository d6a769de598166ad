#![doc = include_str!("../README.md")]

pub mod db;
pub mod env;
pub mod error;
pub mod logger;
pub mod utils;

pub use db::adapter::{Adapter, AdapterMetadata, FindManyQuery, WhereClause};
pub use db::secondary_storage::{MemorySecondaryStorage, SecondaryStorage};
pub use error::{FeatureError, Result};
pub use logger::{FeatureLogger, LogHandler, LogLevel, LoggerConfig};
