pub mod config;
pub mod context;
pub mod crawl;
pub mod error;
pub mod handler;
pub mod index;
pub mod io;
pub mod orchestrator;
pub mod registry;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::InvocationContext;
pub use crawl::{CrawlUnit, HttpCrawler};
pub use error::{CrawlError, IndexError, Result, UnitError};
pub use handler::Handler;
pub use index::IndexClient;
pub use orchestrator::{run_all, OrchestratorOptions, PassReport, UnitOutcome, UnitStatus};
pub use registry::{FileRegistryStore, Registry, RegistryStore, Target};
