use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::PayGateConfig,
    data_objects::{Hold, HoldReference, HoldRequest},
    PayGateApiError,
};

/// Thin client for the PayGate hold API.
///
/// Semantics the engine relies on are normalized here: a declined authorization
/// surfaces as [`PayGateApiError::Declined`], capturing an already-captured hold
/// succeeds, and releasing an unknown or already-released hold succeeds, since
/// there is nothing left to release.
#[derive(Clone)]
pub struct PayGateApi {
    config: PayGateConfig,
    client: Arc<Client>,
}

impl PayGateApi {
    pub fn new(config: PayGateConfig) -> Result<Self, PayGateApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| PayGateApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PayGateApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PayGateApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        // Retried authorizations must not place a second hold.
        req = req.header("Idempotency-Key", format!("{:032x}", rand::random::<u128>()));
        let response = req.send().await.map_err(|e| PayGateApiError::RestResponseError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("REST query successful. {status}");
            return response.json::<T>().await.map_err(|e| PayGateApiError::JsonError(e.to_string()));
        }
        let message = response.text().await.map_err(|e| PayGateApiError::RestResponseError(e.to_string()))?;
        match status {
            StatusCode::PAYMENT_REQUIRED => Err(PayGateApiError::Declined(message)),
            StatusCode::NOT_FOUND => Err(PayGateApiError::UnknownHold(message)),
            _ => Err(PayGateApiError::QueryError { status: status.as_u16(), message }),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// Places a hold for `amount_cents` and returns it. A decline comes back as
    /// [`PayGateApiError::Declined`].
    pub async fn authorize_hold(&self, amount_cents: i64, reference: HoldReference) -> Result<Hold, PayGateApiError> {
        let body = HoldRequest { amount_cents, currency: "EUR".to_string(), reference };
        debug!("Placing hold for {amount_cents} cents");
        let hold = self.rest_query::<Hold, HoldRequest>(Method::POST, "/holds", Some(body)).await?;
        info!("Hold {} placed", hold.id);
        Ok(hold)
    }

    /// Converts the hold into a charge. Capturing twice is a no-op upstream.
    pub async fn capture_hold(&self, hold_id: &str) -> Result<Hold, PayGateApiError> {
        let path = format!("/holds/{hold_id}/capture");
        debug!("Capturing hold {hold_id}");
        let hold = self.rest_query::<Hold, ()>(Method::POST, &path, None).await?;
        info!("Hold {hold_id} captured");
        Ok(hold)
    }

    /// Cancels the hold without charging it. An unknown hold id means the hold
    /// already expired or was released; both count as success.
    pub async fn release_hold(&self, hold_id: &str) -> Result<(), PayGateApiError> {
        let path = format!("/holds/{hold_id}/release");
        debug!("Releasing hold {hold_id}");
        match self.rest_query::<Hold, ()>(Method::POST, &path, None).await {
            Ok(_) => {
                info!("Hold {hold_id} released");
                Ok(())
            },
            Err(PayGateApiError::UnknownHold(_)) => {
                debug!("Hold {hold_id} is unknown upstream. Nothing to release.");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }
}
