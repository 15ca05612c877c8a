use colored::*;
use eyre::{Result, WrapErr};
use log::*;
use serde_derive::Deserialize;
use std::future::Future;
use std::time::Duration;
use url::Url;

use crate::{depositdata::ForkVersion, errors::DepositError};

/// Chain configuration needed to build deposit data
pub trait ChainConfig {
    fn genesis_fork_version(
        &self,
    ) -> impl Future<Output = Result<ForkVersion, DepositError>> + Send;
}

#[derive(Debug, Deserialize)]
struct SpecResponse {
    data: Spec,
}

#[derive(Debug, Deserialize)]
struct Spec {
    #[serde(rename = "GENESIS_FORK_VERSION", with = "serde_utils::bytes_4_hex")]
    genesis_fork_version: [u8; 4],
}

/// Beacon node REST connection, opened once by the caller and borrowed by
/// everything that needs chain data
#[derive(Debug, Clone)]
pub struct Client {
    pub url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(url: &str, timeout: Duration) -> Result<Client> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err_with(|| "failed to build http client")?;
        Ok(Client {
            url: url.trim().to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DepositError> {
        if self.url.is_empty() {
            return Err(DepositError::ChainConfigUnavailable(
                "no connection configured".into(),
            ));
        }
        // Keep any path prefix of the connection, e.g. a proxied beacon node
        let url = format!("{}/{}", self.url.trim_end_matches('/'), path);
        Url::parse(&url).map_err(|e| {
            let reason = format!("invalid connection {:?}: {}", self.url, e);
            DepositError::ChainConfigUnavailable(reason)
        })
    }
}

impl ChainConfig for Client {
    async fn genesis_fork_version(&self) -> Result<ForkVersion, DepositError> {
        let url = self.endpoint("eth/v1/config/spec")?;
        debug!("Fetching chain config from {}", url.as_str().green());
        let unavailable = |e: reqwest::Error| DepositError::ChainConfigUnavailable(e.to_string());
        let spec = self
            .http
            .get(url)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json::<SpecResponse>()
            .await
            .map_err(unavailable)?;
        Ok(ForkVersion::from(spec.data.genesis_fork_version))
    }
}
