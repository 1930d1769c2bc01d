pub mod http;
pub mod mock;

pub use http::HttpTransport;
pub use mock::{Latency, MockConfig, MockState, MockStore, MockTransport, UnmatchedPolicy};
