use std::sync::Arc;

use crate::config::Config;
use crate::sink::relational::RelationalSink;
use crate::submission::pipeline::SubmissionAppender;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub appender: SubmissionAppender,
    pub relational: Arc<RelationalSink>,
}
