use std::env;

use bb_common::{parse_boolean_flag, Secret};
use log::*;
use paygate_tools::PayGateConfig as PayGateApiConfig;

const DEFAULT_BB_HOST: &str = "127.0.0.1";
const DEFAULT_BB_PORT: u16 = 8360;
const DEFAULT_THRESHOLD_PERCENT: i64 = 80;
const DEFAULT_VAT_PERCENT: i64 = 20;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Secret for signing WebSocket access tokens.
    pub api_secret: Secret<String>,
    /// Progress percentage at which the one-shot `threshold_reached` event fires.
    pub threshold_percent: i64,
    /// VAT applied on top of the discounted subtotal.
    pub vat_percent: i64,
    /// How often the expiration sweeper runs.
    pub sweep_interval_secs: u64,
    /// PayGate processor configuration.
    pub paygate: PayGateServerConfig,
}

#[derive(Clone, Debug, Default)]
pub struct PayGateServerConfig {
    pub api: PayGateApiConfig,
    /// If false, webhook HMAC signatures are not checked. Only ever disable this in
    /// local development.
    pub hmac_checks: bool,
    /// When true, holds are simulated in-process and PayGate is never contacted.
    pub use_sandbox: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BB_HOST.to_string(),
            port: DEFAULT_BB_PORT,
            database_url: String::default(),
            api_secret: Secret::default(),
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            vat_percent: DEFAULT_VAT_PERCENT,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            paygate: PayGateServerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BB_HOST").ok().unwrap_or_else(|| DEFAULT_BB_HOST.into());
        let port = env::var("BB_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for BB_PORT. {e} Using the default, {DEFAULT_BB_PORT}, instead.");
                    DEFAULT_BB_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BB_PORT);
        let database_url = env::var("BB_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ BB_DATABASE_URL is not set. Please set it to the URL for the BulkBuy database.");
            String::default()
        });
        let api_secret = Secret::new(env::var("BB_API_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ BB_API_SECRET is not set. WebSocket tokens will be signed with an ephemeral secret and become \
                   invalid on restart.");
            format!("{:032x}", rand::random::<u128>())
        }));
        let threshold_percent = env_percent("BB_THRESHOLD_PERCENT", DEFAULT_THRESHOLD_PERCENT);
        let vat_percent = env_percent("BB_VAT_PERCENT", DEFAULT_VAT_PERCENT);
        let sweep_interval_secs = env::var("BB_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ Invalid BB_SWEEP_INTERVAL_SECS ({s}): {e}. Using the default.");
                        e
                    })
                    .ok()
            })
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        let paygate = PayGateServerConfig::from_env_or_defaults();
        Self { host, port, database_url, api_secret, threshold_percent, vat_percent, sweep_interval_secs, paygate }
    }
}

impl PayGateServerConfig {
    pub fn from_env_or_defaults() -> Self {
        let api = PayGateApiConfig::new_from_env_or_default();
        let hmac_checks = parse_boolean_flag(env::var("BB_PAYGATE_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ PayGate webhook HMAC checks are disabled. Anyone can forge hold updates. Do not run like this \
                   in production.");
        }
        let use_sandbox = parse_boolean_flag(env::var("BB_PAYGATE_SANDBOX").ok(), false);
        if use_sandbox {
            info!("🪛️ PayGate sandbox mode is on. Holds are simulated in-process and no processor calls are made.");
        }
        Self { api, hmac_checks, use_sandbox }
    }
}

fn env_percent(var: &str, default: i64) -> i64 {
    match env::var(var) {
        Ok(s) => match s.parse::<i64>() {
            Ok(v) if (0..=100).contains(&v) => v,
            Ok(v) => {
                error!("🪛️ {var} must be between 0 and 100, not {v}. Using the default, {default}.");
                default
            },
            Err(e) => {
                error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}.");
                default
            },
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8360);
        assert_eq!(config.threshold_percent, 80);
        assert_eq!(config.vat_percent, 20);
    }
}
