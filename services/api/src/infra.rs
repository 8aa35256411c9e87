use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tidyhome::admin::{AdminGate, IdentityProvider, ProfileStore};
use tidyhome::backend::{RestBackend, RestError, TokenAuthProvider};
use tidyhome::config::{AppConfig, AppEnvironment};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type DynAdminGate = AdminGate<dyn IdentityProvider, dyn ProfileStore>;

pub(crate) fn rest_backend(config: &AppConfig) -> Result<Arc<RestBackend>, RestError> {
    Ok(Arc::new(RestBackend::new(&config.backend)?))
}

/// Session cookies only drop the `Secure` flag outside production.
pub(crate) fn secure_cookies(environment: AppEnvironment) -> bool {
    environment == AppEnvironment::Production
}

pub(crate) fn admin_gate(
    config: &AppConfig,
    profiles: Arc<RestBackend>,
) -> Result<DynAdminGate, RestError> {
    let identity = TokenAuthProvider::new(&config.backend, &config.session)?
        .with_secure_cookies(secure_cookies(config.environment));
    let identity: Arc<dyn IdentityProvider> = Arc::new(identity);
    let profiles: Arc<dyn ProfileStore> = profiles;
    Ok(AdminGate::new(identity, profiles))
}
