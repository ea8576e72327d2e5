//! Module client

use crate::client::{ClientCore, HubClient};
use async_trait::async_trait;
use hublink_core::{ClientConfig, HubResult, InboxCategory, Message, Pipeline};
use std::sync::Arc;

/// Client for a module identity running on an edge device
///
/// Receives direct method requests and messages routed to its named inputs,
/// and can publish to named outputs.
#[derive(Debug)]
pub struct ModuleClient {
    core: ClientCore,
}

impl ModuleClient {
    pub const INBOUND_CATEGORIES: [InboxCategory; 2] =
        [InboxCategory::MethodRequests, InboxCategory::InputMessages];

    pub fn new(pipeline: Arc<dyn Pipeline>, config: ClientConfig) -> HubResult<Self> {
        Ok(Self {
            core: ClientCore::new(pipeline, config, &Self::INBOUND_CATEGORIES)?,
        })
    }

    /// Send a message to the output `output_name`
    pub async fn send_to_output<M>(&self, message: M, output_name: &str) -> HubResult<()>
    where
        M: Into<Message>,
    {
        self.core.send_to_output(message.into(), output_name).await
    }

    /// Wait for the next message on input `input_name`
    ///
    /// Messages that arrived on the input before the first call are retained.
    pub async fn receive_input_message(&self, input_name: &str) -> HubResult<Message> {
        self.core.receive_input_message(Some(input_name)).await
    }
}

#[async_trait]
impl HubClient for ModuleClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }
}
