use log::*;

use bb_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct PayGateConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl PayGateConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("BB_PAYGATE_API_URL").unwrap_or_else(|_| {
            warn!("BB_PAYGATE_API_URL not set, using the PayGate sandbox endpoint");
            "https://sandbox.paygate.example.com".to_string()
        });
        let api_key = Secret::new(std::env::var("BB_PAYGATE_API_KEY").unwrap_or_else(|_| {
            warn!("BB_PAYGATE_API_KEY not set, using (probably useless) default");
            "pg_test_00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("BB_PAYGATE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("BB_PAYGATE_WEBHOOK_SECRET not set, using (probably useless) default");
            "whsec_00000000000000".to_string()
        }));
        Self { api_url, api_key, webhook_secret }
    }
}
