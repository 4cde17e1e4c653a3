use std::fmt;

/// Failure inside the engine. None of these cross the public `AudioEngine`
/// boundary; they are logged and turned into no-ops there.
#[derive(Debug)]
pub enum AudioError {
    Fetch(FetchError),
    Decode(DecodeError),
    /// The output device or audio context could not be created.
    Platform(String),
    Config(String),
}

#[derive(Debug)]
pub enum FetchError {
    Io { url: String, source: std::io::Error },
    Http { url: String, status: Option<u16>, message: String },
    /// http(s) URL requested but the `http` feature is not compiled in.
    UnsupportedScheme { url: String },
    InvalidInline(String),
    ChecksumMismatch { url: String, expected: String, actual: String },
}

#[derive(Debug)]
pub enum DecodeError {
    UnknownFormat,
    Wav(String),
    Mp3(String),
    Empty,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Fetch(e) => write!(f, "Fetch error: {e}"),
            AudioError::Decode(e) => write!(f, "Decode error: {e}"),
            AudioError::Platform(msg) => write!(f, "Audio platform unavailable: {msg}"),
            AudioError::Config(msg) => write!(f, "Invalid engine config: {msg}"),
        }
    }
}

impl std::error::Error for AudioError {}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Io { url, source } => write!(f, "could not read '{url}': {source}"),
            FetchError::Http { url, status: Some(code), message } => {
                write!(f, "GET '{url}' returned {code}: {message}")
            }
            FetchError::Http { url, status: None, message } => {
                write!(f, "GET '{url}' failed: {message}")
            }
            FetchError::UnsupportedScheme { url } => {
                write!(f, "no fetcher for '{url}' (enable the `http` feature)")
            }
            FetchError::InvalidInline(msg) => write!(f, "invalid inline sample data: {msg}"),
            FetchError::ChecksumMismatch { url, expected, actual } => {
                write!(f, "sha256 mismatch for '{url}': expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownFormat => write!(f, "unrecognised audio format"),
            DecodeError::Wav(msg) => write!(f, "wav: {msg}"),
            DecodeError::Mp3(msg) => write!(f, "mp3: {msg}"),
            DecodeError::Empty => write!(f, "decoded to zero samples"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<FetchError> for AudioError {
    fn from(e: FetchError) -> Self {
        AudioError::Fetch(e)
    }
}

impl From<DecodeError> for AudioError {
    fn from(e: DecodeError) -> Self {
        AudioError::Decode(e)
    }
}

impl From<serde_json::Error> for AudioError {
    fn from(e: serde_json::Error) -> Self {
        AudioError::Config(e.to_string())
    }
}

#[cfg(feature = "engine")]
impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        DecodeError::Wav(e.to_string())
    }
}
