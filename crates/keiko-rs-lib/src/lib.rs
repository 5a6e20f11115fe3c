pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::KeikoOptions;

pub mod package;
pub use package::Version;
pub use package::Requirement;

pub mod registry;
pub use registry::Registry;
pub use registry::PypiRegistry;

pub mod resolver;
pub use resolver::ResolutionResult;

pub mod manifest;
pub use manifest::Manifest;

pub mod updater;
pub use updater::update_manifest;
