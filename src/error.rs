use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::Lot;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't prepare the output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Couldn't persist the dataset to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Couldn't send a page through a channel.")]
    RuntimeSendError,

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("A lot must be a JSON object.")]
    LotNotObject,
}

impl From<mpsc::error::SendError<(u32, Vec<Lot>)>> for Error {
    fn from(_value: mpsc::error::SendError<(u32, Vec<Lot>)>) -> Self {
        Error::RuntimeSendError
    }
}
