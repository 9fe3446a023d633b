//! Configuration and the research session that ties fetching, indexing, and
//! answering together.

pub mod config;
pub mod error;
pub mod session;
pub mod url_list;

pub use config::Config;
pub use error::SessionError;
pub use session::{ProcessReport, ResearchSession};
pub use url_list::parse_url_list;
