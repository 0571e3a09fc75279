use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::form::{FormController, SaveError, SaveRequest, SubmitOutcome, SubmitRejected};

/// Persists an entity. Called once per accepted submit.
#[async_trait]
pub trait EntitySaver: Send + Sync {
    async fn save(&self, request: SaveRequest) -> Result<(), SaveError>;
}

#[async_trait]
impl<T: EntitySaver + ?Sized> EntitySaver for Arc<T> {
    async fn save(&self, request: SaveRequest) -> Result<(), SaveError> {
        (**self).save(request).await
    }
}

pub(crate) async fn save_with_timeout(
    saver: &dyn EntitySaver,
    request: SaveRequest,
    timeout: Option<Duration>,
) -> Result<(), SaveError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, saver.save(request))
            .await
            .unwrap_or_else(|_| {
                Err(SaveError::Network(format!(
                    "save timed out after {}ms",
                    limit.as_millis()
                )))
            }),
        None => saver.save(request).await,
    }
}

impl FormController {
    /// Submits and awaits the save in one step, for callers without an event loop.
    pub async fn submit_with(
        &mut self,
        saver: &dyn EntitySaver,
    ) -> Result<SubmitOutcome, SubmitRejected> {
        let request = self.begin_submit()?;
        let ticket = request.ticket;
        let result = saver.save(request).await;
        Ok(self.complete_submit(ticket, result))
    }
}
