use std::sync::Arc;

use domains::IdentityVerifier;
use services::StoryServices;

use crate::metrics::StoryMetrics;

/// HTTP-level knobs, filled from `configs::Settings` by the binary.
#[derive(Debug, Clone, Copy)]
pub struct ApiConfig {
    pub default_page_size: usize,
    pub max_upload_bytes: usize,
    pub body_limit_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_page_size: domains::DEFAULT_PAGE_LIMIT,
            max_upload_bytes: 50 * 1024 * 1024,
            body_limit_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub services: StoryServices,
    pub identity: Arc<dyn IdentityVerifier>,
    pub metrics: Arc<StoryMetrics>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        services: StoryServices,
        identity: Arc<dyn IdentityVerifier>,
        config: ApiConfig,
    ) -> Self {
        Self {
            services,
            identity,
            metrics: Arc::new(StoryMetrics::new()),
            config,
        }
    }
}
