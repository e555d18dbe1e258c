//! # webagent
//!
//! Provider-fallback dispatch over third-party search APIs and captcha
//! solving services.
//!
//! Each capability (search, captcha solving) has an ordered list of
//! interchangeable provider adapters. A dispatch tries them in priority
//! order, skipping providers that lack credentials or quota, and returns the
//! first success in a uniform envelope, or a trace of every provider that
//! was tried and why it failed.
//!
//! - Deterministic, sequential fallback (no racing of paid providers)
//! - Normalized results regardless of which provider answered
//! - Daily quotas with pluggable persistence
//! - Extensible adapter interface
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use webagent::{Credentials, DispatcherBuilder, SearchClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dispatcher = DispatcherBuilder::new(Credentials::from_env()).build()?;
//!     let search = SearchClient::new(Arc::new(dispatcher));
//!
//!     let results = search.search("rust programming", 10, None).await?;
//!     println!("served by {}", results.provider);
//!     for hit in &results.payload {
//!         println!("{}: {}", hit.title, hit.url);
//!     }
//!     Ok(())
//! }
//! ```

mod adapter;
mod capability;
mod captcha;
mod config;
mod dispatcher;
mod error;
mod request;
mod result;
mod search;

mod http;
pub mod providers;
pub mod quota;

pub use adapter::{Adapter, AdapterConfig};
pub use capability::Capability;
pub use captcha::CaptchaSolver;
pub use config::{Credentials, DispatcherBuilder};
pub use dispatcher::ProviderDispatcher;
pub use error::{AdapterError, DispatchError, QuotaError, Result};
pub use request::{CaptchaRequest, Request, SearchRequest, DEFAULT_NUM_RESULTS};
pub use result::{
    AttemptRecord, CaptchaSolution, DispatchOutcome, FailureReason, NormalizedResult, Payload,
    SearchHit,
};
pub use search::SearchClient;
