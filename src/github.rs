//! GitHub API client bound to one token/host pair
//!
//! The client is built once per run by whichever orchestrator owns it. It
//! carries the authenticated transport (proxy-aware, with fail-fast
//! timeouts) and exposes exactly the remote operations the migration needs:
//! listing and creating Actions variables, listing an organization's
//! repositories, and probing a single repository for existence.

use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::{Config, ProxyConfig};
use crate::error::Error;

/// REST base for GitHub.com.
pub const PUBLIC_API_URL: &str = "https://api.github.com";

/// REST API version pinned on every request.
const API_VERSION: &str = "2022-11-28";

/// Transport timeouts, tuned to fail fast rather than hang.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request ceiling so a single hung call cannot eat the retry budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for repository listing.
pub const REPOS_PER_PAGE: u32 = 100;

/// One GitHub Actions variable as the API represents it.
///
/// The same shape is used for list responses and create requests; the
/// visibility field is omitted from create bodies when unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionsVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

/// Response envelope for the variable listing endpoints.
///
/// `variables` stays `None` when the remote returns no collection at all,
/// which callers treat differently from an empty list.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionsVariablePage {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub variables: Option<Vec<ActionsVariable>>,
}

/// The slice of a repository object the migration cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySummary {
    pub name: Option<String>,
}

/// Authenticated, proxy-aware GitHub API client.
#[derive(Debug)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
}

impl GitHubClient {
    /// Build a client from the run configuration.
    ///
    /// Fails before any network call when the token is empty, the
    /// enterprise hostname does not parse, or a proxy URL is invalid.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let base_url = api_base_url(config.hostname.as_deref())?;
        let proxy = build_proxy(&config.proxy)?;
        Self::with_parts(&config.token, base_url, proxy)
    }

    /// Build a client against an explicit API base URL, bypassing hostname
    /// normalization and proxy setup. Intended for already-normalized
    /// endpoints and for tests against a local mock server.
    pub fn with_base_url(token: &str, base_url: impl Into<String>) -> Result<Self, Error> {
        Self::with_parts(token, base_url.into(), None)
    }

    fn with_parts(
        token: &str,
        base_url: String,
        proxy: Option<reqwest::Proxy>,
    ) -> Result<Self, Error> {
        if token.trim().is_empty() {
            return Err(Error::Configuration("GitHub token is required".to_string()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| Error::Configuration("token contains invalid characters".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("varsync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);

        builder = match proxy {
            Some(proxy) => builder.proxy(proxy),
            // Proxy routing is owned by the run configuration, so the
            // transport must not also pick proxies up from the process
            // environment behind our back.
            None => builder.no_proxy(),
        };

        let http = builder
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The REST base URL this client is bound to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List organization-level Actions variables.
    pub async fn list_org_variables(&self, org: &str) -> anyhow::Result<ActionsVariablePage> {
        let url = format!("{}/orgs/{}/actions/variables?per_page=100", self.base_url, org);
        let resp = self.http.get(&url).send().await
            .with_context(|| format!("failed to list variables for organization {org}"))?;
        let resp = ensure_success(resp, "organization variable listing").await?;
        resp.json().await
            .context("failed to decode organization variable listing")
    }

    /// List repository-level Actions variables.
    pub async fn list_repo_variables(
        &self,
        org: &str,
        repo: &str,
    ) -> anyhow::Result<ActionsVariablePage> {
        let url = format!(
            "{}/repos/{}/{}/actions/variables?per_page=100",
            self.base_url, org, repo
        );
        let resp = self.http.get(&url).send().await
            .with_context(|| format!("failed to list variables for repository {org}/{repo}"))?;
        let resp = ensure_success(resp, "repository variable listing").await?;
        resp.json().await
            .context("failed to decode repository variable listing")
    }

    /// Create an organization-level Actions variable.
    pub async fn create_org_variable(
        &self,
        org: &str,
        variable: &ActionsVariable,
    ) -> anyhow::Result<()> {
        let url = format!("{}/orgs/{}/actions/variables", self.base_url, org);
        let resp = self.http.post(&url).json(variable).send().await
            .with_context(|| format!("failed to create organization variable {}", variable.name))?;
        ensure_success(resp, "organization variable creation").await?;
        Ok(())
    }

    /// Create a repository-level Actions variable.
    pub async fn create_repo_variable(
        &self,
        org: &str,
        repo: &str,
        variable: &ActionsVariable,
    ) -> anyhow::Result<()> {
        let url = format!("{}/repos/{}/{}/actions/variables", self.base_url, org, repo);
        // Repository variables are implicitly private; the endpoint takes
        // only name and value.
        let body = ActionsVariable {
            name: variable.name.clone(),
            value: variable.value.clone(),
            visibility: None,
        };
        let resp = self.http.post(&url).json(&body).send().await
            .with_context(|| format!("failed to create repository variable {}", variable.name))?;
        ensure_success(resp, "repository variable creation").await?;
        Ok(())
    }

    /// Fetch one page of the organization's repository listing.
    ///
    /// Returns `None` when the remote answers with a null payload, which
    /// callers must treat as an error rather than an empty page.
    pub async fn list_repository_page(
        &self,
        org: &str,
        page: u32,
    ) -> anyhow::Result<Option<Vec<RepositorySummary>>> {
        let url = format!(
            "{}/orgs/{}/repos?per_page={}&page={}",
            self.base_url, org, REPOS_PER_PAGE, page
        );
        let resp = self.http.get(&url).send().await
            .with_context(|| format!("failed to list repositories for organization {org}"))?;
        let resp = ensure_success(resp, "repository listing").await?;
        resp.json().await.context("failed to decode repository listing")
    }

    /// Existence probe: does `org/repo` exist on the remote?
    ///
    /// A 404 is a definitive "no". Other non-success statuses and transport
    /// failures are errors so the caller's retry policy can have a go at
    /// them.
    pub async fn get_repository(&self, org: &str, repo: &str) -> anyhow::Result<bool> {
        let url = format!("{}/repos/{}/{}", self.base_url, org, repo);
        let resp = self.http.get(&url).send().await
            .with_context(|| format!("failed to look up repository {org}/{repo}"))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(resp, "repository lookup").await?;
        Ok(true)
    }
}

/// Reject non-success responses with the status and a body excerpt.
async fn ensure_success(resp: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    bail!("{what} returned HTTP {status}: {excerpt}")
}

/// Resolve the REST base URL for an optional enterprise hostname.
pub fn api_base_url(hostname: Option<&str>) -> Result<String, Error> {
    match hostname {
        Some(host) if !host.trim().is_empty() => normalize_hostname(host),
        _ => Ok(PUBLIC_API_URL.to_string()),
    }
}

/// Normalize an enterprise hostname into its REST base URL.
///
/// Accepts bare hostnames as well as values that already carry a scheme,
/// trailing slash, or `/api/v3` suffix, and always yields
/// `https://{host}/api/v3`.
pub fn normalize_hostname(raw: &str) -> Result<String, Error> {
    let host = raw.trim();
    let host = host.strip_prefix("http://").unwrap_or(host);
    let host = host.strip_prefix("https://").unwrap_or(host);
    let host = host.trim_end_matches('/');
    let host = host.strip_suffix("/api/v3").unwrap_or(host);
    let host = host.trim_end_matches('/');

    if host.is_empty() {
        return Err(Error::Configuration(format!(
            "invalid enterprise hostname {raw:?}"
        )));
    }

    let url = format!("https://{host}/api/v3");
    Url::parse(&url)
        .map_err(|e| Error::Configuration(format!("invalid enterprise hostname {raw:?}: {e}")))?;
    Ok(url)
}

/// Build the custom proxy from the run configuration, if any is set.
///
/// Proxy URLs are parsed up front so a bad value fails the run before any
/// request goes out.
fn build_proxy(config: &ProxyConfig) -> Result<Option<reqwest::Proxy>, Error> {
    if !config.is_configured() {
        return Ok(None);
    }

    let http = parse_proxy_url(config.http_proxy.as_deref(), "HTTP_PROXY")?;
    let https = parse_proxy_url(config.https_proxy.as_deref(), "HTTPS_PROXY")?;
    let no_proxy: Vec<String> = config
        .no_proxy
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect();

    let proxy = reqwest::Proxy::custom(move |url| {
        select_proxy(&no_proxy, http.as_ref(), https.as_ref(), url)
    });
    Ok(Some(proxy))
}

fn parse_proxy_url(value: Option<&str>, name: &str) -> Result<Option<Url>, Error> {
    match value {
        Some(raw) if !raw.trim().is_empty() => {
            let url = Url::parse(raw.trim())
                .map_err(|e| Error::Configuration(format!("invalid {name} URL {raw:?}: {e}")))?;
            Ok(Some(url))
        }
        _ => Ok(None),
    }
}

/// Pick the proxy for one outbound request.
///
/// An exact `NO_PROXY` host match (with or without port) bypasses proxying
/// entirely; otherwise the request scheme selects between the HTTPS and
/// HTTP proxies.
fn select_proxy(
    no_proxy: &[String],
    http: Option<&Url>,
    https: Option<&Url>,
    target: &Url,
) -> Option<Url> {
    let host = target.host_str()?;
    let authority = match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    if no_proxy.iter().any(|entry| entry == host || *entry == authority) {
        return None;
    }

    match target.scheme() {
        "https" => https.cloned(),
        "http" => http.cloned(),
        _ => None,
    }
}
