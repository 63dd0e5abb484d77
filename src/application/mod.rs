mod application;
pub mod data;
mod runtime_config;

pub use application::{Application, ApplicationError};
pub(crate) use application::LogFileSnafu;
pub use runtime_config::RuntimeConfig;
