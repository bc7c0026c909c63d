#[derive(Debug)]
pub enum ApiError {
    /// Connection, timeout or body decoding failure.
    Transport(String),
    /// Non-2xx HTTP status.
    Status(u16),
    /// The response carried a GraphQL `errors` array.
    Graphql(Vec<String>),
    /// `data` was null without accompanying errors.
    MissingData(&'static str),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Transport(e) => write!(f, "transport error: {e}"),
            ApiError::Status(code) => write!(f, "unexpected HTTP status {code}"),
            ApiError::Graphql(messages) => write!(f, "GraphQL error: {}", messages.join("; ")),
            ApiError::MissingData(op) => write!(f, "no data in {op} response"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ApiError::Status(status.as_u16()),
            None => ApiError::Transport(e.to_string()),
        }
    }
}
