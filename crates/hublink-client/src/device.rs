//! Device client

use crate::client::{ClientCore, HubClient};
use async_trait::async_trait;
use hublink_core::{ClientConfig, HubResult, InboxCategory, Message, Pipeline};
use std::sync::Arc;

/// Client for a device identity
///
/// Receives direct method requests and cloud-to-device messages.
#[derive(Debug)]
pub struct DeviceClient {
    core: ClientCore,
}

impl DeviceClient {
    pub const INBOUND_CATEGORIES: [InboxCategory; 2] =
        [InboxCategory::MethodRequests, InboxCategory::C2dMessages];

    pub fn new(pipeline: Arc<dyn Pipeline>, config: ClientConfig) -> HubResult<Self> {
        Ok(Self {
            core: ClientCore::new(pipeline, config, &Self::INBOUND_CATEGORIES)?,
        })
    }

    /// Wait for the next cloud-to-device message
    pub async fn receive_c2d_message(&self) -> HubResult<Message> {
        self.core.receive_c2d_message().await
    }
}

#[async_trait]
impl HubClient for DeviceClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }
}
