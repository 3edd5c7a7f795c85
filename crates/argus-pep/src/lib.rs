//! Argus PEP - Policy Enforcement Point with a PDP Decision Cache
//!
//! This crate mediates authorization checks between an application and a
//! remote Policy Decision Point (PDP). Its core is the decision cache: one PDP
//! response can answer many later requests, under keys derived from a
//! server-issued cache key pattern and the permit's obligation.
//!
//! # Overview
//!
//! - Requests are fingerprinted into candidate cache keys, most specific first
//! - Cache misses are sent to the PDP (single or bulk), with retries for
//!   transient failures
//! - Permits are installed under every key their obligation covers; denies
//!   only under the exact request key
//! - When the PDP is unavailable, expired entries can be served with an
//!   `expired` marker
//! - Token subjects are keyed on their decoded claims, never on the token
//!
//! # Architecture
//!
//! ```text
//!     Request ──► Fingerprinter ──► DecisionCache ── hit ──► Decision (cached)
//!                      ▲                 │
//!                      │               miss
//!               PatternStore             │
//!                      ▲          ┌──────▼──────┐
//!                      │          │  PdpClient  │──► /v2/authz, /v2/authz/bulk
//!                      │          │ (retry/429) │
//!                      │          └──────┬──────┘
//!                      │                 │ decisions + cacheKeyPattern
//!                      └─────────────────┤
//!                                 KeySynthesizer ──► DecisionCache::insert
//! ```
//!
//! # Example
//!
//! ```no_run
//! use argus_pep::{Attributes, Environment, PepConfig, Request, Subject};
//!
//! # async fn run() -> Result<(), argus_pep::PepError> {
//! argus_pep::configure(PepConfig::new(Environment::Staging, "my-api-key"))?;
//!
//! let request = Request::new(
//!     Subject::iam_id("IBMid-1234"),
//!     "cloud-object-storage.object.get",
//!     Attributes::new()
//!         .with("serviceName", "cloud-object-storage")
//!         .with("accountId", "12345"),
//! );
//!
//! let decision = argus_pep::authorize(&request).await?;
//! if !decision.permitted {
//!     println!("denied: {}", decision.reason);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod authorizer;
pub mod cache;
pub mod config;
pub mod crn;
pub mod decision;
pub mod error;
pub mod fingerprint;
pub mod global;
pub mod keys;
pub mod loader;
pub mod pattern;
pub mod pipeline;
pub mod request;
pub mod stats;
pub mod synthesizer;
pub mod token;
pub mod token_manager;
pub mod transport;
pub mod wire;

// Re-exports for convenience
pub use attributes::{AttributeValue, Attributes};
pub use authorizer::{Authorizer, AuthorizerBuilder};
pub use cache::{CacheConfig, CacheStats, DecisionCache};
pub use config::{CacheSettings, Endpoints, EndpointsConfig, Environment, LogLevel, PepConfig};
pub use crn::Crn;
pub use decision::{Decision, DenyReason, Obligation, PdpDecision};
pub use error::{PepError, PepResult};
pub use global::{
    authorize, authorize_bulk, authorize_many, cache_stats, clear_cache, configure,
    configure_with, invalidate, statistics,
};
pub use loader::ConfigLoader;
pub use pattern::{CacheKeyPattern, PatternStore, Slot};
pub use pipeline::{PdpCall, PdpClient, RetryPolicy};
pub use request::{Request, Subject};
pub use stats::StatisticsSnapshot;
pub use token::TokenSubject;
pub use token_manager::{ApiKeyTokenManager, StaticTokenProvider, TokenProvider};
pub use transport::{HttpDoer, HttpRequest, HttpResponse, ReqwestDoer};
