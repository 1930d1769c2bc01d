use serde_json::Value;
use thiserror::Error;

/// User-facing messages for failures the client classifies itself.
pub mod messages {
    pub const UNAUTHORIZED: &str = "登录已过期，请重新登录";
    pub const FORBIDDEN: &str = "没有权限访问该资源";
    pub const NOT_FOUND: &str = "请求的资源不存在";
    pub const SERVER: &str = "服务器错误，请稍后重试";
    pub const NETWORK: &str = "网络连接失败，请检查网络设置";
    pub const TIMEOUT: &str = "请求超时，请稍后重试";
    pub const BAD_CREDENTIALS: &str = "用户名或密码错误";
    pub const EMAIL_TAKEN: &str = "该邮箱已被注册";
    pub const LOGIN_REQUIRED: &str = "请先登录";

    pub fn request_failed(status: u16) -> String {
        format!("请求失败 (HTTP {})", status)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Network(String),

    #[error("{}", messages::TIMEOUT)]
    Timeout,

    #[error("{}", messages::UNAUTHORIZED)]
    Unauthorized,

    #[error("{}", messages::FORBIDDEN)]
    Forbidden,

    #[error("{}", messages::NOT_FOUND)]
    NotFound,

    #[error("{}", messages::SERVER)]
    Server { status: u16 },

    /// Any other non-2xx response, carrying what the backend said about it.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
        details: Option<Value>,
    },

    #[error("no mock route for {method} {path}")]
    UnmatchedRoute { method: String, path: String },

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Session storage error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Rejection with a plain backend-style message (status 400).
    pub fn rejected(message: impl Into<String>) -> Self {
        Error::Api {
            status: 400,
            code: Some(400),
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status associated with this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized => Some(401),
            Error::Forbidden => Some(403),
            Error::NotFound => Some(404),
            Error::Server { status } => Some(*status),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failures and 5xx responses are worth another attempt; nothing else is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout | Error::Server { .. })
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
