//! HTTP collector client.

use std::time::Duration;

use reqwest::Client;
use vitalwatch_core::{AgentConfig, AnalysisResponse, MotionAnalysisRequest, VitalsRecord};

use super::CollectorClient;
use crate::error::TransportError;

/// reqwest-backed [`CollectorClient`].
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    vitals_url: String,
    analysis_url: String,
    vitals_timeout: Duration,
    analysis_timeout: Duration,
}

impl HttpCollector {
    pub fn new(config: &AgentConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("vitalwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            vitals_url: config.server_url.clone(),
            analysis_url: config.analysis_url(),
            vitals_timeout: config.vitals_timeout(),
            analysis_timeout: config.analysis_timeout(),
        })
    }

    pub fn vitals_url(&self) -> &str {
        &self.vitals_url
    }

    pub fn analysis_url(&self) -> &str {
        &self.analysis_url
    }
}

impl CollectorClient for HttpCollector {
    async fn post_vitals(&self, record: &VitalsRecord) -> Result<u16, TransportError> {
        let resp = self
            .client
            .post(&self.vitals_url)
            .timeout(self.vitals_timeout)
            .json(record)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(status.as_u16())
    }

    async fn analyze_motion(
        &self,
        request: &MotionAnalysisRequest,
    ) -> Result<AnalysisResponse, TransportError> {
        let resp = self
            .client
            .post(&self.analysis_url)
            .timeout(self.analysis_timeout)
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(resp.json::<AnalysisResponse>().await?)
    }
}
