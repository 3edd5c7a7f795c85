//! The process-wide authorizer facade.
//!
//! Kept in one test so the global slot is never shared between test threads.

mod common;

use std::sync::Arc;

use argus_pep::{global, Authorizer, HttpDoer, PepConfig, PepError, StaticTokenProvider};
use common::{config, permit, request, MockPdp, GET};

#[tokio::test]
async fn test_global_lifecycle() {
    // Nothing installed yet.
    assert_eq!(argus_pep::authorize(&request(GET)).await, Err(PepError::NotInitialized));
    assert!(matches!(argus_pep::authorize_many(&[request(GET)]).await, Err(PepError::NotInitialized)));
    assert!(matches!(argus_pep::statistics(), Err(PepError::NotInitialized)));
    assert!(matches!(argus_pep::clear_cache(), Err(PepError::NotInitialized)));

    // An invalid configuration leaves the slot empty.
    assert!(matches!(argus_pep::configure(PepConfig::default()), Err(PepError::Config(_))));
    assert!(global::authorizer().is_err());

    let pdp = MockPdp::new();
    pdp.always(200, permit(None, None));
    let builder = Authorizer::builder(config().with_install_logger(true))
        .with_http_doer(Arc::clone(&pdp) as Arc<dyn HttpDoer>)
        .with_token_provider(Arc::new(StaticTokenProvider::new("t")));
    argus_pep::configure_with(builder).unwrap();

    assert!(!argus_pep::authorize(&request(GET)).await.unwrap().cached);
    assert!(argus_pep::authorize(&request(GET)).await.unwrap().cached);
    assert_eq!(argus_pep::statistics().unwrap().requests_serviced, 2);
    assert_eq!(argus_pep::cache_stats().unwrap().hits, 1);

    assert!(argus_pep::invalidate(&request(GET)).unwrap());
    argus_pep::clear_cache().unwrap();

    let results = argus_pep::authorize_bulk(&[]).await.unwrap();
    assert!(results.is_empty());

    // Reconfiguring swaps in a fresh instance with empty statistics.
    let fresh = MockPdp::new();
    fresh.always(200, permit(None, None));
    global::install(common::authorizer(&fresh, config()));
    assert_eq!(argus_pep::statistics().unwrap().requests_serviced, 0);
    argus_pep::authorize(&request(GET)).await.unwrap();
    assert_eq!(fresh.calls(), 1);
    assert_eq!(pdp.calls(), 1);

    global::reset();
    assert_eq!(argus_pep::authorize(&request(GET)).await, Err(PepError::NotInitialized));
}
