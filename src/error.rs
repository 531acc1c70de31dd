pub type PlayerResult<T> = Result<T, PlayerError>;

#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("invalid playback rate: {0}")]
    Rate(String),

    #[error("frame source error: {0}")]
    Source(String),

    #[error("frame decode error: {0}")]
    Decode(String),

    #[error("decode pool error: {0}")]
    Pool(String),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub fn rate(msg: impl Into<String>) -> Self {
        Self::Rate(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }
}
