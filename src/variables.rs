//! Variable records, reader, and writer
//!
//! The reader normalizes remote Actions variables into [`VariableRecord`]s;
//! the writer creates them at a [`RemoteTarget`] with an existence
//! precondition for repository scope. Both go through the shared
//! [`RetryPolicy`] for every remote call and retain no state between calls.

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Error, Result};
use crate::github::{ActionsVariable, GitHubClient, REPOS_PER_PAGE};
use crate::retry::RetryPolicy;

/// Visibility applied when the remote or the input leaves it unset.
/// Repository-scope variables always carry this value.
pub const DEFAULT_VISIBILITY: &str = "private";

/// Scope literal marking an organization-level record.
pub const ORGANIZATION_SCOPE: &str = "organization";

/// The canonical unit of transfer: one variable with its scope and
/// visibility. Never constructed with an empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub name: String,
    pub value: String,
    /// `"organization"` or a repository name.
    pub scope: String,
    pub visibility: String,
}

impl VariableRecord {
    /// Normalize a remote variable into a record, or `None` when the
    /// variable has no name and must be dropped.
    pub fn from_api(variable: ActionsVariable, scope: &str) -> Option<Self> {
        if variable.name.is_empty() {
            return None;
        }
        Some(Self {
            name: variable.name,
            value: variable.value,
            scope: scope.to_string(),
            visibility: variable
                .visibility
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_VISIBILITY.to_string()),
        })
    }

    /// True when this record belongs to the organization scope rather than
    /// a repository.
    pub fn is_organization_scope(&self) -> bool {
        self.scope == ORGANIZATION_SCOPE
    }
}

/// Where a remote operation is performed. The repository case carries its
/// required repository name, so a repository target without one cannot be
/// expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTarget {
    Organization { org: String },
    Repository { org: String, repo: String },
}

impl RemoteTarget {
    /// Organization-scope target. Fails on an empty organization name.
    pub fn organization(org: &str) -> Result<Self> {
        if org.is_empty() {
            return Err(Error::Validation(
                "organization name is required".to_string(),
            ));
        }
        Ok(Self::Organization {
            org: org.to_string(),
        })
    }

    /// Repository-scope target. Fails on an empty organization or
    /// repository name, before any network call.
    pub fn repository(org: &str, repo: &str) -> Result<Self> {
        if org.is_empty() {
            return Err(Error::Validation(
                "organization name is required".to_string(),
            ));
        }
        if repo.is_empty() {
            return Err(Error::Validation("repository name is required".to_string()));
        }
        Ok(Self::Repository {
            org: org.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn org(&self) -> &str {
        match self {
            Self::Organization { org } | Self::Repository { org, .. } => org,
        }
    }

    /// Entity-type label for logs and error context.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::Organization { .. } => "organization",
            Self::Repository { .. } => "repository",
        }
    }
}

/// Read-only view of an organization's variable state.
pub struct VariableReader<'a> {
    client: &'a GitHubClient,
    retry: &'a RetryPolicy,
    cancel: &'a CancellationToken,
    org: String,
}

impl<'a> VariableReader<'a> {
    pub fn new(
        client: &'a GitHubClient,
        retry: &'a RetryPolicy,
        cancel: &'a CancellationToken,
        org: &str,
    ) -> Result<Self> {
        if org.is_empty() {
            return Err(Error::Validation(
                "organization name is required".to_string(),
            ));
        }
        Ok(Self {
            client,
            retry,
            cancel,
            org: org.to_string(),
        })
    }

    /// Fetch organization-level variables, normalized with scope
    /// `organization`. Nameless variables are dropped silently.
    pub async fn fetch_org_variables(&self) -> Result<Vec<VariableRecord>> {
        let org = self.org.clone();
        let page = self
            .retry
            .run(
                &format!("list variables for organization {org}"),
                self.cancel,
                || self.client.list_org_variables(&org),
            )
            .await?;

        let Some(variables) = page.variables else {
            return Err(Error::remote(
                format!("no variables data returned for organization {org}"),
                anyhow::anyhow!("remote returned a null variable collection"),
            ));
        };

        Ok(normalize(variables, ORGANIZATION_SCOPE))
    }

    /// Fetch repository-level variables, normalized with the repository
    /// name as scope.
    pub async fn fetch_repo_variables(&self, repo: &str) -> Result<Vec<VariableRecord>> {
        if repo.is_empty() {
            return Err(Error::Validation("repository name is required".to_string()));
        }

        let org = self.org.clone();
        let page = self
            .retry
            .run(
                &format!("list variables for repository {org}/{repo}"),
                self.cancel,
                || self.client.list_repo_variables(&org, repo),
            )
            .await?;

        let Some(variables) = page.variables else {
            return Err(Error::remote(
                format!("no variables data returned for repository {org}/{repo}"),
                anyhow::anyhow!("remote returned a null variable collection"),
            ));
        };

        Ok(normalize(variables, repo))
    }

    /// List every repository name in the organization, 100 per page until
    /// the listing is exhausted. Nameless entries are skipped.
    pub async fn list_repositories(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page: u32 = 1;

        loop {
            let org = self.org.clone();
            let batch = self
                .retry
                .run(
                    &format!("list repositories for organization {org} (page {page})"),
                    self.cancel,
                    || self.client.list_repository_page(&org, page),
                )
                .await?;

            let Some(batch) = batch else {
                return Err(Error::remote(
                    format!("no repository data returned for organization {org}"),
                    anyhow::anyhow!("remote returned a null repository listing"),
                ));
            };

            if batch.is_empty() {
                break;
            }

            let batch_len = batch.len();
            names.extend(batch.into_iter().filter_map(|repo| repo.name));

            if (batch_len as u32) < REPOS_PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(names)
    }
}

fn normalize(variables: Vec<ActionsVariable>, scope: &str) -> Vec<VariableRecord> {
    variables
        .into_iter()
        .filter_map(|variable| VariableRecord::from_api(variable, scope))
        .collect()
}

/// Creates variables at a remote target. Create-only: a conflict with an
/// existing variable is surfaced as a plain failure.
pub struct VariableWriter<'a> {
    client: &'a GitHubClient,
    retry: &'a RetryPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> VariableWriter<'a> {
    pub fn new(
        client: &'a GitHubClient,
        retry: &'a RetryPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            retry,
            cancel,
        }
    }

    /// Create one variable at the target.
    ///
    /// For repository targets the repository is probed first; a missing
    /// repository fails with [`Error::RepositoryNotFound`] so the caller
    /// can classify it as a skip.
    pub async fn create_variable(
        &self,
        target: &RemoteTarget,
        record: &VariableRecord,
    ) -> Result<()> {
        if record.name.is_empty() {
            return Err(Error::Validation("variable name is required".to_string()));
        }

        if let RemoteTarget::Repository { org, repo } = target {
            if !self.repository_exists(org, repo).await? {
                return Err(Error::RepositoryNotFound {
                    org: org.clone(),
                    repo: repo.clone(),
                });
            }
        }

        let visibility = if record.visibility.is_empty() {
            DEFAULT_VISIBILITY.to_string()
        } else {
            record.visibility.clone()
        };
        let variable = ActionsVariable {
            name: record.name.clone(),
            value: record.value.clone(),
            visibility: Some(visibility),
        };

        let label = format!(
            "create {} variable {}",
            target.entity_type(),
            record.name
        );
        self.retry
            .run(&label, self.cancel, || async {
                match target {
                    RemoteTarget::Organization { org } => {
                        self.client.create_org_variable(org, &variable).await
                    }
                    RemoteTarget::Repository { org, repo } => {
                        self.client.create_repo_variable(org, repo, &variable).await
                    }
                }
            })
            .await
    }

    /// Existence probe, reduced to a boolean.
    ///
    /// A 404 is a definitive "no" and is not retried; other probe failures
    /// go through the retry policy and are then reduced to "does not
    /// exist" with a warning, so a rate limit or auth failure is visible in
    /// the log without changing the boolean contract. Cancellation is the
    /// one failure that propagates.
    async fn repository_exists(&self, org: &str, repo: &str) -> Result<bool> {
        let probe = self
            .retry
            .run(
                &format!("check repository {org}/{repo} exists"),
                self.cancel,
                || self.client.get_repository(org, repo),
            )
            .await;

        match probe {
            Ok(exists) => Ok(exists),
            Err(err @ Error::Cancelled(_)) => Err(err),
            Err(err) => {
                warn!(
                    "Could not determine whether repository {}/{} exists, treating as missing: {:#}",
                    org, repo, err
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrySettings;
    use assert_matches::assert_matches;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn variable(name: &str, value: &str, visibility: Option<&str>) -> ActionsVariable {
        ActionsVariable {
            name: name.to_string(),
            value: value.to_string(),
            visibility: visibility.map(str::to_string),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(&RetrySettings {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        })
    }

    fn single_attempt() -> RetryPolicy {
        RetryPolicy::new(&RetrySettings {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
        })
    }

    #[test]
    fn test_record_from_api_drops_empty_names() {
        assert_eq!(VariableRecord::from_api(variable("", "x", None), "organization"), None);

        let record = VariableRecord::from_api(variable("FOO", "bar", None), "organization")
            .expect("named variable");
        assert_eq!(record.name, "FOO");
        assert_eq!(record.visibility, DEFAULT_VISIBILITY);
        assert!(record.is_organization_scope());
    }

    #[test]
    fn test_record_from_api_keeps_visibility() {
        let record =
            VariableRecord::from_api(variable("FOO", "bar", Some("all")), "organization").unwrap();
        assert_eq!(record.visibility, "all");

        let record = VariableRecord::from_api(variable("FOO", "bar", None), "my-repo").unwrap();
        assert_eq!(record.scope, "my-repo");
        assert!(!record.is_organization_scope());
    }

    #[test]
    fn test_remote_target_validation() {
        assert_matches!(RemoteTarget::organization(""), Err(Error::Validation(_)));
        assert_matches!(RemoteTarget::repository("", "repo"), Err(Error::Validation(_)));
        assert_matches!(RemoteTarget::repository("org", ""), Err(Error::Validation(_)));

        let target = RemoteTarget::repository("acme", "widget").unwrap();
        assert_eq!(target.org(), "acme");
        assert_eq!(target.entity_type(), "repository");
    }

    #[tokio::test]
    async fn test_fetch_org_variables_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/actions/variables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 3,
                "variables": [
                    {"name": "VAR1", "value": "a", "visibility": "all"},
                    {"name": "", "value": "dropped"},
                    {"name": "VAR2", "value": "b"}
                ]
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let reader = VariableReader::new(&client, &retry, &cancel, "acme").unwrap();

        let records = reader.fetch_org_variables().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "VAR1");
        assert_eq!(records[0].visibility, "all");
        assert_eq!(records[0].scope, ORGANIZATION_SCOPE);
        // Missing visibility defaults to private
        assert_eq!(records[1].name, "VAR2");
        assert_eq!(records[1].visibility, DEFAULT_VISIBILITY);
    }

    #[tokio::test]
    async fn test_fetch_org_variables_null_collection_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/actions/variables"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"total_count": 0})),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let reader = VariableReader::new(&client, &retry, &cancel, "acme").unwrap();

        assert_matches!(
            reader.fetch_org_variables().await,
            Err(Error::Remote { .. })
        );
    }

    #[tokio::test]
    async fn test_fetch_repo_variables_scope_is_repo_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/actions/variables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 1,
                "variables": [{"name": "KEY", "value": "v"}]
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let reader = VariableReader::new(&client, &retry, &cancel, "acme").unwrap();

        let records = reader.fetch_repo_variables("widget").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scope, "widget");
        assert_eq!(records[0].visibility, DEFAULT_VISIBILITY);
    }

    #[tokio::test]
    async fn test_list_repositories_paginates() {
        let server = MockServer::start().await;

        let full_page: Vec<serde_json::Value> = (0..100)
            .map(|i| serde_json::json!({"name": format!("repo-{i}")}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "last-repo"},
                {"name": null}
            ])))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let reader = VariableReader::new(&client, &retry, &cancel, "acme").unwrap();

        let names = reader.list_repositories().await.unwrap();
        // 100 from page one, one named entry from page two; the null entry
        // is skipped
        assert_eq!(names.len(), 101);
        assert_eq!(names[0], "repo-0");
        assert_eq!(names[100], "last-repo");
    }

    #[tokio::test]
    async fn test_list_repositories_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"name": "only"}])),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = fast_retry();
        let cancel = CancellationToken::new();
        let reader = VariableReader::new(&client, &retry, &cancel, "acme").unwrap();

        let names = reader.list_repositories().await.unwrap();
        assert_eq!(names, vec!["only".to_string()]);
    }

    #[tokio::test]
    async fn test_create_org_variable_sends_visibility() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orgs/acme/actions/variables"))
            .and(body_json(serde_json::json!({
                "name": "VAR1",
                "value": "val1",
                "visibility": "all"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let writer = VariableWriter::new(&client, &retry, &cancel);

        let target = RemoteTarget::organization("acme").unwrap();
        let record = VariableRecord {
            name: "VAR1".to_string(),
            value: "val1".to_string(),
            scope: ORGANIZATION_SCOPE.to_string(),
            visibility: "all".to_string(),
        };
        writer.create_variable(&target, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_repo_variable_checks_existence_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "widget"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widget/actions/variables"))
            .and(body_json(serde_json::json!({
                "name": "KEY",
                "value": "v"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let writer = VariableWriter::new(&client, &retry, &cancel);

        let target = RemoteTarget::repository("acme", "widget").unwrap();
        let record = VariableRecord {
            name: "KEY".to_string(),
            value: "v".to_string(),
            scope: "widget".to_string(),
            visibility: String::new(),
        };
        writer.create_variable(&target, &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_repository_is_distinguishable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let writer = VariableWriter::new(&client, &retry, &cancel);

        let target = RemoteTarget::repository("acme", "ghost").unwrap();
        let record = VariableRecord {
            name: "KEY".to_string(),
            value: "v".to_string(),
            scope: "ghost".to_string(),
            visibility: String::new(),
        };

        let err = writer.create_variable(&target, &record).await.unwrap_err();
        assert_matches!(
            err,
            Error::RepositoryNotFound { ref org, ref repo } if org == "acme" && repo == "ghost"
        );
        assert!(err.is_missing_repository("acme", "ghost"));
    }

    #[tokio::test]
    async fn test_probe_transport_failure_reduces_to_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = fast_retry();
        let cancel = CancellationToken::new();
        let writer = VariableWriter::new(&client, &retry, &cancel);

        let target = RemoteTarget::repository("acme", "flaky").unwrap();
        let record = VariableRecord {
            name: "KEY".to_string(),
            value: "v".to_string(),
            scope: "flaky".to_string(),
            visibility: String::new(),
        };

        // Probe errors (after retries) reduce to "does not exist"
        assert_matches!(
            writer.create_variable(&target, &record).await,
            Err(Error::RepositoryNotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name_without_network() {
        // No mock server at all: validation must fail before any call
        let client = GitHubClient::with_base_url("test-token", "http://127.0.0.1:9").unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let writer = VariableWriter::new(&client, &retry, &cancel);

        let target = RemoteTarget::organization("acme").unwrap();
        let record = VariableRecord {
            name: String::new(),
            value: "v".to_string(),
            scope: ORGANIZATION_SCOPE.to_string(),
            visibility: String::new(),
        };

        assert_matches!(
            writer.create_variable(&target, &record).await,
            Err(Error::Validation(_))
        );
    }

    #[tokio::test]
    async fn test_existence_check_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "widget"})),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::with_base_url("test-token", server.uri()).unwrap();
        let retry = single_attempt();
        let cancel = CancellationToken::new();
        let writer = VariableWriter::new(&client, &retry, &cancel);

        let first = writer.repository_exists("acme", "widget").await.unwrap();
        let second = writer.repository_exists("acme", "widget").await.unwrap();
        assert_eq!(first, second);
        assert!(first);
    }
}
