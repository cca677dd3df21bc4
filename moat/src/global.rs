use std::sync::Arc;

use moat_blocking::BlockingControl;
use moat_blocklist::ListRefresher;
use moat_resolver::Querier;

use crate::config::Config;

/// Global state shared with the control API.
pub type SharedGlobal = Arc<Global>;

pub struct Global {
    pub control: Arc<dyn BlockingControl>,
    pub querier: Arc<dyn Querier>,
    pub refresher: Arc<dyn ListRefresher>,
    pub config: Config,
}
