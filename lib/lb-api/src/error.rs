use thiserror::Error;

pub type Result<T> = std::result::Result<T, RequestError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Port {value} out of range for {field}")]
    PortOutOfRange { field: &'static str, value: i32 },
}
