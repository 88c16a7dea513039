use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse JSON at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cookie is missing {0}")]
    MissingCredential(&'static str),

    #[error("Malformed cookie value: {0}")]
    MalformedCookie(String),

    #[error("No schedule for day {0} in this week")]
    NoSchedule(i64),

    #[error("Course index {index} is out of range (1-{count})")]
    CourseOutOfRange { index: usize, count: usize },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Malformed frame: {0}")]
    Frame(String),

    #[error("Server rejected authentication")]
    AuthRejected,

    #[error("Viewer window is closed")]
    ViewerClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
