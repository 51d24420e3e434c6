//! Shared AWS SDK configuration.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

use crate::Config;

/// Load SDK configuration for the configured region.
///
/// Credentials come from the default provider chain. When an endpoint
/// override is set (e.g. LocalStack) it applies to both SQS and SNS.
pub async fn load_sdk_config(config: &Config) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()));

    if let Some(endpoint) = &config.aws_endpoint {
        info!(endpoint = %endpoint, "aws_endpoint_override");
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}
