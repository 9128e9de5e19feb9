//! `reqwest`-backed [`DeliveryTransport`] implementation (spec §6
//! "External interfaces" outbound webhook).

use std::time::Duration;

use async_trait::async_trait;

use revops_core::delivery::{DeliveryTransport, TransportError};

/// Spec §5: 30s delivery deadline per attempt.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts a delivery payload body to its resolved target URL over HTTP.
pub struct HttpDeliveryTransport {
    client: reqwest::Client,
}

impl HttpDeliveryTransport {
    /// Construct a transport sharing `client` with the rest of the
    /// gateway's outbound HTTP traffic.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeliveryTransport for HttpDeliveryTransport {
    async fn post(&self, target_url: &str, body: &str) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(target_url)
            .header("content-type", "application/json")
            .timeout(DELIVERY_TIMEOUT)
            .body(body.to_owned())
            .send()
            .await
            .map_err(classify_send_error)?;
        Ok(response.status().as_u16())
    }
}

fn classify_send_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::ConnectionReset
    } else {
        TransportError::Other(error.to_string())
    }
}
