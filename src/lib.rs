pub mod cli;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::DatastoreError;
pub use models::{Config, OutputFormat};
pub use services::DataStore;
