use async_trait::async_trait;
use marquee_model::{MediaKind, RateLimitState};

use crate::ports::{
    ExternalRef, MetadataProvider, ProviderDetails, ProviderError,
};

/// Provider used when no metadata source is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

#[async_trait]
impl MetadataProvider for DisabledProvider {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn fetch_details_by_id(
        &self,
        _kind: MediaKind,
        _tmdb_id: &str,
        _language: &str,
    ) -> Result<Option<ProviderDetails>, ProviderError> {
        Err(ProviderError::Disabled)
    }

    async fn fetch_details_by_external_id(
        &self,
        _kind: MediaKind,
        _external: &ExternalRef,
        _language: &str,
    ) -> Result<Option<ProviderDetails>, ProviderError> {
        Err(ProviderError::Disabled)
    }

    fn rate_limit_state(&self) -> RateLimitState {
        RateLimitState::default()
    }
}
