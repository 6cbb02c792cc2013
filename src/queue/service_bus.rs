//! Azure Service Bus queue implementation.
//!
//! Speaks the Service Bus REST surface with a pre-issued SAS token: send is
//! a POST to the queue's messages resource, receive uses receive-and-delete
//! on the queue head so every returned message is acknowledged exactly once.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use reqwest::{Client, StatusCode};

use crate::error::{ArchevalError, Result};
use crate::queue::{MessageQueue, QueueMessage};

/// Configuration for the Service Bus queue
#[derive(Debug, Clone)]
pub struct ServiceBusConfig {
    /// Namespace, e.g. "myapp" for myapp.servicebus.windows.net
    pub namespace: String,
    /// Queue name
    pub queue_name: String,
    /// Pre-issued SAS token
    pub sas_token: String,
    /// Per-call request timeout
    pub timeout: Duration,
}

impl ServiceBusConfig {
    /// Build configuration from the environment.
    ///
    /// Reads AZURE_SERVICE_BUS_NAMESPACE, AZURE_SERVICE_BUS_QUEUE_NAME and
    /// AZURE_SERVICE_BUS_SAS_TOKEN.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        Ok(Self {
            namespace: require_env("AZURE_SERVICE_BUS_NAMESPACE")?,
            queue_name: require_env("AZURE_SERVICE_BUS_QUEUE_NAME")?,
            sas_token: require_env("AZURE_SERVICE_BUS_SAS_TOKEN")?,
            timeout,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ArchevalError::Config(format!("{} not set", name)))
}

/// Azure Service Bus queue client
pub struct ServiceBusQueue {
    client: Client,
    config: ServiceBusConfig,
}

impl ServiceBusQueue {
    /// Create a new queue client with an HTTP client bound to the
    /// configured timeout
    pub fn new(config: ServiceBusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArchevalError::Queue(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "https://{}.servicebus.windows.net/{}/messages",
            self.config.namespace, self.config.queue_name
        )
    }
}

#[async_trait]
impl MessageQueue for ServiceBusQueue {
    async fn send(&self, content: &str) -> Result<()> {
        let response = self
            .client
            .post(self.messages_url())
            .header("Authorization", &self.config.sas_token)
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| ArchevalError::Queue(format!("Send request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ArchevalError::Queue(format!(
                "Send error {}: {}",
                status, error_body
            )));
        }

        info!("Sent message to queue {}", self.config.queue_name);
        Ok(())
    }

    async fn receive(&self, max_count: usize, max_wait: Duration) -> Result<Vec<QueueMessage>> {
        let url = format!("{}/head", self.messages_url());
        let mut messages = Vec::new();

        for _ in 0..max_count {
            // Receive-and-delete: a 200 both returns and settles the message
            let response = self
                .client
                .delete(&url)
                .header("Authorization", &self.config.sas_token)
                .query(&[("timeout", max_wait.as_secs().to_string())])
                .send()
                .await
                .map_err(|e| ArchevalError::Queue(format!("Receive request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::NO_CONTENT {
                break;
            }
            if !status.is_success() {
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(ArchevalError::Queue(format!(
                    "Receive error {}: {}",
                    status, error_body
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| ArchevalError::Queue(format!("Failed to read message body: {}", e)))?;

            info!("Received message from queue {}", self.config.queue_name);
            messages.push(QueueMessage { body });
        }

        Ok(messages)
    }
}

impl std::fmt::Debug for ServiceBusQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBusQueue")
            .field("namespace", &self.config.namespace)
            .field("queue_name", &self.config.queue_name)
            .finish()
    }
}
