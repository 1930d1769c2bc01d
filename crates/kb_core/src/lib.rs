pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod retry;
pub mod sequence;
pub mod transport;
pub mod types;

pub use envelope::ApiEnvelope;
pub use error::{messages, Error, Result};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use sequence::{RequestSequence, Ticket};
pub use transport::{ApiRequest, Method, RawResponse, RequestBody, ResponseOrigin, Transport, UploadForm};
pub use types::*;
