use std::fmt::{Display, Formatter};
use std::num::TryFromIntError;
use std::sync::mpsc;

use config::ConfigError;
use serde::{Deserialize, Serialize};

use crate::buffer::FrameId;

pub type Result<T> = std::result::Result<T, Error>;

// All except Internal are considered user-facing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    Internal(String),
    /// A frame id outside the pool's [0, num_frames) range was handed to
    /// a replacer operation that validates its input.
    InvalidFrame(FrameId),
    /// The frame is pinned or otherwise non-evictable and cannot be
    /// removed from the replacer.
    NotEvictable(FrameId),
}

impl Error {
    pub fn internal<E: ToString>(msg: E) -> Error {
        Error::Internal(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal(s) => write!(f, "{}", s),
            Error::InvalidFrame(frame_id) => write!(f, "invalid frame id {}", frame_id),
            Error::NotEvictable(frame_id) => write!(f, "frame {} is not evictable", frame_id),
        }
    }
}

impl std::error::Error for Error {}

impl From<TryFromIntError> for Error {
    fn from(err: TryFromIntError) -> Self {
        Error::internal(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::internal(err)
    }
}

impl<T> From<mpsc::SendError<T>> for Error {
    fn from(err: mpsc::SendError<T>) -> Self {
        Error::internal(err)
    }
}

impl From<mpsc::RecvError> for Error {
    fn from(err: mpsc::RecvError) -> Self {
        Error::internal(err)
    }
}
