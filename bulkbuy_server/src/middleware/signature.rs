//! Webhook signature verification.
//!
//! PayGate signs each delivery by computing HMAC-SHA256 over the raw request body,
//! keyed with the account's webhook secret, and puts the base64 tag in the
//! [`SIGNATURE_HEADER`] header. [`SignatureVerifier`] wraps the webhook scope and
//! rejects deliveries whose tag is absent or does not verify. Verification decodes
//! the tag and hands it to the MAC itself, so the comparison is constant time.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use bb_common::Secret;
use futures::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use log::{trace, warn};
use sha2::Sha256;

use crate::errors::SignatureError;

/// Header carrying the base64 HMAC-SHA256 tag of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-paygate-hmac-sha256";

/// Checks `tag_b64` against the body under `secret`.
pub fn verify_signature(secret: &str, tag_b64: &str, body: &[u8]) -> Result<(), SignatureError> {
    let tag = base64::decode(tag_b64).map_err(|_| SignatureError::InvalidSignature)?;
    // HMAC accepts keys of any length, so new_from_slice never fails
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(body);
    mac.verify_slice(&tag).map_err(|_| SignatureError::InvalidSignature)
}

pub struct SignatureVerifier {
    secret: Secret<String>,
    // false skips verification entirely (local development against the sandbox)
    enabled: bool,
}

impl SignatureVerifier {
    pub fn new(secret: Secret<String>, enabled: bool) -> Self {
        Self { secret, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureVerifier
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureVerifierService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureVerifierService {
            secret: self.secret.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureVerifierService<S> {
    secret: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureVerifierService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            if !enabled {
                trace!("🔐️ Signature checks are off. Passing the delivery through.");
                return service.call(req).await;
            }
            let tag = match req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
                Some(tag) => tag.to_string(),
                None => {
                    warn!("🔐️ Webhook delivery without a signature header. Rejecting.");
                    return Err(SignatureError::MissingSignature.into());
                },
            };
            // Verification runs over the raw bytes, so buffer the body and hand it
            // back to the handler afterwards.
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not buffer the webhook body: {e}");
                Error::from(SignatureError::UnreadableBody)
            })?;
            verify_signature(secret.reveal(), &tag, body.as_ref()).map_err(|e| {
                warn!("🔐️ Webhook delivery failed signature verification. Rejecting.");
                Error::from(e)
            })?;
            trace!("🔐️ Webhook signature verified ✅️");
            req.set_payload(bytes_to_payload(body));
            service.call(req).await
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
