use thiserror::Error;

use crate::api::notifier::NotifyError;
use crate::api::sampler::SampleError;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sampling error: {0}")]
    Sample(#[from] SampleError),

    #[error("No usable ledger entry: {0}")]
    NotFound(String),

    #[error("Price parsing error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl MonitorError {
    pub fn is_notify(&self) -> bool {
        matches!(self, MonitorError::Notify(_))
    }
}
