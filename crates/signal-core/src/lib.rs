pub mod error;
pub mod retry;
pub mod tickers;
pub mod traits;
pub mod types;

pub use error::*;
pub use retry::{retry_with_backoff, BackoffPolicy, Sleeper, TokioSleeper};
pub use tickers::extract_tickers;
pub use traits::*;
pub use types::*;
