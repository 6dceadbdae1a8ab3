/// Core error type for the bot.
///
/// Adapter crates map their client-library errors into this type so the
/// dispatch layer and the supervisor can handle failures consistently
/// (fail-fast config vs. logged-and-dropped transport).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
