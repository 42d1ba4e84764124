//! Blocking Azure Resource Manager client for diagnostic settings.

use super::credential::Credential;
use super::model::DiagnosticSetting;
use super::DiagnosticsApi;
use failure::{Fallible, ResultExt};
use reqwest::{header, Method, StatusCode, Url};
use std::time;

/// Diagnostic settings endpoint, relative to a resource.
static DIAGNOSTIC_SETTINGS_PATH: &str = "providers/Microsoft.Insights/diagnosticSettings";
/// Subscriptions listing endpoint, for access checks.
static SUBSCRIPTIONS_PATH: &str = "subscriptions";
/// API version for subscriptions listing.
static SUBSCRIPTIONS_API_VERSION: &str = "2020-01-01";

/// HTTP client for the management API.
#[derive(Clone, Debug)]
pub(crate) struct ArmClient {
    http: reqwest::Client,
    endpoint: Url,
    api_version: String,
    credential: Credential,
}

impl ArmClient {
    pub(crate) fn new(
        endpoint: Url,
        api_version: &str,
        timeout: time::Duration,
        credential: Credential,
    ) -> Fallible<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            api_version: api_version.to_string(),
            credential,
        })
    }

    /// Check that the access token is accepted by the management API.
    ///
    /// Returns the number of visible subscriptions.
    pub(crate) fn verify_access(&self) -> Fallible<usize> {
        let mut url = self.endpoint.join(SUBSCRIPTIONS_PATH)?;
        url.query_pairs_mut()
            .append_pair("api-version", SUBSCRIPTIONS_API_VERSION);
        trace!("GET to subscriptions endpoint: {}", url);

        let resp = self
            .request(Method::GET, url)
            .send()
            .context("failed to reach management endpoint")?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            bail!(
                "access token rejected ({}), log in again or refresh the token",
                status
            );
        }

        let mut resp = ensure_success(resp)?;
        let listing: SubscriptionList = resp.json().context("failed to parse subscriptions")?;
        Ok(listing.value.len())
    }

    fn setting_url(&self, resource_path: &str, name: &str) -> Fallible<Url> {
        let relative = format!(
            "{}/{}/{}",
            resource_path.trim_matches('/'),
            DIAGNOSTIC_SETTINGS_PATH,
            name
        );
        let mut url = self
            .endpoint
            .join(&relative)
            .context(format!("invalid resource path '{}'", resource_path))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.credential.token()),
            )
            .header(header::ACCEPT, "application/json")
    }
}

impl DiagnosticsApi for ArmClient {
    fn fetch(&self, resource_path: &str, name: &str) -> Fallible<Option<DiagnosticSetting>> {
        let url = self.setting_url(resource_path, name)?;
        trace!("GET to diagnostic setting: {}", url);

        let resp = self
            .request(Method::GET, url)
            .send()
            .context("diagnostic setting query failed")?;
        if resp.status() == StatusCode::NOT_FOUND {
            trace!("no diagnostic setting '{}' on {}", name, resource_path);
            return Ok(None);
        }

        let mut resp = ensure_success(resp)?;
        let setting = resp
            .json::<DiagnosticSetting>()
            .context("failed to parse diagnostic setting")?;
        Ok(Some(setting))
    }

    fn create(&self, resource_path: &str, setting: &DiagnosticSetting) -> Fallible<()> {
        let url = self.setting_url(resource_path, &setting.name)?;
        trace!("PUT to diagnostic setting: {}", url);

        let resp = self
            .request(Method::PUT, url)
            .json(setting)
            .send()
            .context("diagnostic setting creation failed")?;
        ensure_success(resp)?;
        Ok(())
    }

    fn delete(&self, resource_path: &str, name: &str) -> Fallible<()> {
        let url = self.setting_url(resource_path, name)?;
        trace!("DELETE to diagnostic setting: {}", url);

        let resp = self
            .request(Method::DELETE, url)
            .send()
            .context("diagnostic setting removal failed")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(resp)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionList {
    #[serde(default)]
    value: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Ensure response is positive, turning ARM error bodies into errors.
fn ensure_success(mut resp: reqwest::Response) -> Fallible<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    let detail = describe_error(&body);
    debug!("management API error {}: {}", status, detail);
    bail!("{}: {}", status, detail)
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => format!("{}: {}", parsed.error.code, parsed.error.message),
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
