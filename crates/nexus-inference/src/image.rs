//! Image generation entry point.
//!
//! Each remote chain entry counts as one attempt covering both generation and
//! persistence. When the whole chain fails, the local helper gets one try with
//! the first chain entry's model.

use std::sync::Arc;

use tracing::warn;

use nexus_core::{Capability, Error, GeneratedArtifactRef, ImageRequest, Result};

use crate::artifact::ArtifactPersister;
use crate::fallback::{execute_chain, FallbackExecutor};
use crate::helper::LocalHelper;

/// Producer label recorded for helper-generated artifacts.
pub const LOCAL_HELPER_LABEL: &str = "local-helper";

/// Generates images and persists them as public artifacts.
pub struct ImageService {
    executor: Arc<FallbackExecutor>,
    persister: Arc<ArtifactPersister>,
    helper: Option<LocalHelper>,
}

impl ImageService {
    pub fn new(executor: Arc<FallbackExecutor>, persister: Arc<ArtifactPersister>) -> Self {
        Self {
            executor,
            persister,
            helper: None,
        }
    }

    /// Enable the local helper as the last resort.
    pub fn with_helper(mut self, helper: LocalHelper) -> Self {
        self.helper = Some(helper);
        self
    }

    pub async fn generate(&self, request: &ImageRequest) -> Result<GeneratedArtifactRef> {
        if request.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("Image prompt must not be empty".to_string()));
        }

        let chain = self.executor.image_chain();
        let persister = &self.persister;
        let remote = execute_chain(Capability::Image, chain, move |provider| async move {
            let raw = provider.generate_image(request).await?;
            persister
                .persist(&raw, &provider.model_config().label())
                .await
        })
        .await;

        let remote_failure = match remote {
            Ok(artifact) => return Ok(artifact),
            Err(e) => e,
        };

        let (Some(helper), Some(first)) = (self.helper.as_ref(), chain.first()) else {
            return Err(remote_failure);
        };

        let model = first.model_config().model.clone();
        let helper_error = match helper.generate(&model, request).await {
            Ok(None) => return Err(remote_failure),
            Ok(Some(raw)) => match self.persister.persist(&raw, LOCAL_HELPER_LABEL).await {
                Ok(artifact) => return Ok(artifact),
                Err(e) => e,
            },
            Err(e) => e,
        };

        warn!(
            subsystem = "inference",
            component = "image",
            model = %model,
            error = %helper_error,
            "Local image helper failed"
        );

        let attempts = match &remote_failure {
            Error::AggregateFailure { attempts, .. } => attempts + 1,
            _ => 1,
        };
        Err(Error::AggregateFailure {
            capability: Capability::Image,
            attempts,
            last: Box::new(helper_error),
        })
    }
}
