//! Download of caller recordings referenced by telephony webhooks.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::GatewayError;
use crate::utils::validate_recording_url;

/// Whisper's upload ceiling; larger recordings could never be transcribed
const MAX_RECORDING_BYTES: usize = 25 * 1024 * 1024;

/// Fetches recording audio after SSRF validation of the URL.
///
/// Twilio credentials, when configured, are attached only to requests whose
/// host is under `twilio.com`.
pub struct RecordingFetcher {
    http_client: Client,
    credentials: Option<(String, String)>,
    allow_insecure: bool,
    timeout: Duration,
}

impl RecordingFetcher {
    pub fn new(
        credentials: Option<(String, String)>,
        allow_insecure: bool,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http_client = Client::builder()
            .timeout(timeout)
            // Redirects could escape the validated host
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                GatewayError::Unavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            credentials,
            allow_insecure,
            timeout,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Bytes, GatewayError> {
        let url = validate_recording_url(url, self.allow_insecure)
            .await
            .map_err(|e| GatewayError::InvalidInput(format!("recording URL rejected: {e}")))?;

        let mut request = self.http_client.get(url.clone());
        if let Some((sid, token)) = &self.credentials
            && is_twilio_host(&url)
        {
            request = request.basic_auth(sid, Some(token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, host = url.host_str().unwrap_or_default(), "Recording download failed");
            let headers = response.headers().clone();
            return Err(GatewayError::from_status(
                status,
                &headers,
                "recording download failed".to_string(),
            ));
        }

        if let Some(length) = response.content_length()
            && length as usize > MAX_RECORDING_BYTES
        {
            return Err(GatewayError::InvalidInput(format!(
                "recording too large ({length} bytes)"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        if audio.len() > MAX_RECORDING_BYTES {
            return Err(GatewayError::InvalidInput(format!(
                "recording too large ({} bytes)",
                audio.len()
            )));
        }

        debug!(bytes = audio.len(), "Fetched recording");
        Ok(audio)
    }
}

fn is_twilio_host(url: &Url) -> bool {
    url.host_str()
        .map(|host| host == "twilio.com" || host.ends_with(".twilio.com"))
        .unwrap_or(false)
}
