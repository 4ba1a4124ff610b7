use thiserror::Error;

/// Why a roster or participant-list document could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("document is not valid UTF-8 JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("document is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` is not an array")]
    NotAnArray(&'static str),

    #[error("member #{index}: {reason}")]
    InvalidMember { index: usize, reason: String },
}

/// Failure of a roster operation. A roster that cannot be found is not an
/// error; lookups return `None` for that.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("platform call failed: {0:#}")]
    Transport(#[source] anyhow::Error),
}

impl RosterError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RosterError::Decode(_) => "decode",
            RosterError::Encode(_) => "encode",
            RosterError::Transport(_) => "transport",
        }
    }
}
