//! relview: declarative views over SQL sources, assembled into typed record trees.

pub mod binder;
pub mod cache;
pub mod case;
pub mod codec;
pub mod collector;
pub mod config;
pub mod connector;
pub mod error;
pub mod reader;
pub mod selector;
pub mod service;
pub mod sql;
pub mod template;
pub mod value;
pub mod view;

pub use binder::{Binder, RequestParams};
pub use cache::{MemoryCache, ResultCache};
pub use config::{load_file, load_from_str, validate, ResourceConfig, ViewConfig};
pub use error::{BindError, BindErrors, ConfigError, Error, ReadError};
pub use reader::{Reader, Session};
pub use selector::{Selector, Selectors};
pub use service::Service;
pub use value::{Record, RecordType, Value};
pub use view::{Environment, Resource, View};
