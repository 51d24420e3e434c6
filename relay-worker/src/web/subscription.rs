//! SNS subscription handshake.
//!
//! SNS keeps a new HTTP subscription pending until the endpoint calls
//! `ConfirmSubscription` with the token from the `SubscriptionConfirmation`
//! message. Only confirmed subscriptions receive notifications.

use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::Client;
use thiserror::Error;
use tracing::info;

use crate::Config;

/// Failure calling the pub/sub provider.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("failed to confirm subscription to {topic_arn}: {message}")]
    Confirm { topic_arn: String, message: String },

    #[error("failed to subscribe {endpoint} to {topic_arn}: {message}")]
    Subscribe {
        topic_arn: String,
        endpoint: String,
        message: String,
    },
}

/// Subscription operations against the pub/sub provider.
#[async_trait]
pub trait SubscriptionClient: Send + Sync {
    /// Confirm a pending subscription. Returns the subscription ARN if the
    /// provider reported one.
    async fn confirm(&self, topic_arn: &str, token: &str)
        -> Result<Option<String>, SubscriptionError>;

    /// Subscribe `endpoint` to `topic_arn`. Returns the subscription ARN,
    /// which stays `pending confirmation` until the handshake completes.
    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, SubscriptionError>;
}

/// SNS-backed [`SubscriptionClient`].
#[derive(Debug, Clone)]
pub struct SnsSubscriptions {
    client: Client,
}

impl SnsSubscriptions {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl SubscriptionClient for SnsSubscriptions {
    async fn confirm(
        &self,
        topic_arn: &str,
        token: &str,
    ) -> Result<Option<String>, SubscriptionError> {
        let output = self
            .client
            .confirm_subscription()
            .topic_arn(topic_arn)
            .token(token)
            .send()
            .await
            .map_err(|e| SubscriptionError::Confirm {
                topic_arn: topic_arn.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        Ok(output.subscription_arn().map(str::to_string))
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
    ) -> Result<String, SubscriptionError> {
        let output = self
            .client
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(protocol)
            .endpoint(endpoint)
            .send()
            .await
            .map_err(|e| SubscriptionError::Subscribe {
                topic_arn: topic_arn.to_string(),
                endpoint: endpoint.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        let subscription_arn = output.subscription_arn().unwrap_or_default().to_string();
        info!(
            topic_arn = %topic_arn,
            protocol = %protocol,
            endpoint = %endpoint,
            subscription_arn = %subscription_arn,
            "sns_subscribe_requested"
        );

        Ok(subscription_arn)
    }
}

/// Subscribe the webhook to its topic at startup, when configured.
///
/// Returns `Ok(None)` when no topic/endpoint pair is configured.
pub async fn bootstrap_subscription(
    client: &dyn SubscriptionClient,
    config: &Config,
) -> Result<Option<String>, SubscriptionError> {
    let Some((topic_arn, endpoint)) = config.subscription_target() else {
        return Ok(None);
    };

    let subscription_arn = client
        .subscribe(topic_arn, &config.sns_subscription_protocol, endpoint)
        .await?;

    Ok(Some(subscription_arn))
}
