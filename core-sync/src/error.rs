use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Network listener already started")]
    ListenerAlreadyStarted,

    #[error("Failed to subscribe to network changes: {0}")]
    Subscribe(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
