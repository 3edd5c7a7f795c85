//! Process-wide default authorizer.
//!
//! [`configure`] builds a complete [`Authorizer`] and swaps it into a global
//! slot, so callers never observe a half-built instance. Reconfiguring
//! replaces the instance, including its cache and statistics; calls already
//! running finish on the instance they started with.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::authorizer::{Authorizer, AuthorizerBuilder};
use crate::cache::CacheStats;
use crate::config::PepConfig;
use crate::decision::Decision;
use crate::error::{PepError, PepResult};
use crate::request::Request;
use crate::stats::StatisticsSnapshot;

static INSTANCE: RwLock<Option<Arc<Authorizer>>> = parking_lot::const_rwlock(None);

/// Configure the global authorizer with the default HTTP client and token
/// manager.
pub fn configure(config: PepConfig) -> PepResult<()> {
    configure_with(Authorizer::builder(config))
}

/// Configure the global authorizer from a prepared builder, e.g. one with an
/// injected HTTP client.
pub fn configure_with(builder: AuthorizerBuilder) -> PepResult<()> {
    if builder.config().install_logger {
        install_logging(builder.config())?;
    }

    install(builder.build()?);
    Ok(())
}

/// Install an already built authorizer as the global instance.
pub fn install(authorizer: Authorizer) {
    let previous = INSTANCE.write().replace(Arc::new(authorizer));
    info!(replaced = previous.is_some(), "global authorizer installed");
}

/// Remove the global instance. Later calls fail with `NotInitialized`.
pub fn reset() {
    INSTANCE.write().take();
}

/// The global instance.
pub fn authorizer() -> PepResult<Arc<Authorizer>> {
    INSTANCE.read().clone().ok_or(PepError::NotInitialized)
}

/// Authorize a request with the global instance.
pub async fn authorize(request: &Request) -> PepResult<Decision> {
    authorizer()?.authorize(request).await
}

/// Authorize requests through the single-authz endpoint.
pub async fn authorize_many(requests: &[Request]) -> PepResult<Vec<PepResult<Decision>>> {
    Ok(authorizer()?.authorize_many(requests).await)
}

/// Authorize requests through the bulk endpoint.
pub async fn authorize_bulk(requests: &[Request]) -> PepResult<Vec<PepResult<Decision>>> {
    Ok(authorizer()?.authorize_bulk(requests).await)
}

/// Drop the cached decision for `request`.
pub fn invalidate(request: &Request) -> PepResult<bool> {
    Ok(authorizer()?.invalidate(request))
}

/// Clear the global decision cache.
pub fn clear_cache() -> PepResult<()> {
    authorizer()?.clear_cache();
    Ok(())
}

/// Cache statistics of the global instance.
pub fn cache_stats() -> PepResult<CacheStats> {
    Ok(authorizer()?.cache_stats())
}

/// Request statistics of the global instance.
pub fn statistics() -> PepResult<StatisticsSnapshot> {
    Ok(authorizer()?.statistics())
}

fn install_logging(config: &PepConfig) -> PepResult<()> {
    match argus_telemetry::init_logging(&config.log_config()) {
        Ok(()) => Ok(()),
        Err(e) if e.is_already_initialized() => {
            warn!("a tracing subscriber is already installed, keeping it");
            Ok(())
        }
        Err(e) => Err(PepError::Config(e.to_string())),
    }
}
