//! One wrapper per backend area. Each method is a single call returning the typed envelope.

mod analytics;
mod auth;
mod collection;
mod documents;
mod scheduler;
mod search;
mod upload;

pub use analytics::AnalyticsApi;
pub use auth::AuthApi;
pub use collection::CollectionApi;
pub use documents::DocumentsApi;
pub use scheduler::SchedulerApi;
pub use search::SearchApi;
pub use upload::UploadApi;
