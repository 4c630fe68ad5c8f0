// Typed errors for the registry client and operator control actions

use thiserror::Error;

use crate::models::ControlKind;

/// Failures talking to the traffic/version registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid registry url: {0}")]
    Url(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Rejections and failures of approve / cancel.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("no snapshot observed yet")]
    NoSnapshot,

    #[error("no rollout in progress")]
    NoActiveRollout,

    #[error("{action:?} is only offered in manual mode")]
    NotManual { action: ControlKind },

    #[error("{live} draining version(s) still hold connections")]
    ConnectionsStillDraining { live: usize },

    #[error("no draining version to roll back")]
    NothingToCancel,

    #[error("{0} is not a draining version")]
    UnknownTarget(String),

    #[error("panel is no longer active")]
    PanelClosed,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
