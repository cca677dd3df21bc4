mod matcher;
mod service;
mod source;

pub use matcher::BlocklistMatcher;
pub use service::{BlocklistService, ListRefresher};
pub use source::{ListSource, parse_entries};
