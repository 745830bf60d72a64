//! Outbound-domain authorization: hostname normalization, deny-first policy
//! evaluation, and the checker that prompts + persists on unknown hosts.

use crate::approval::{ApprovalDecision, ApprovalRequest, Approver, DOMAIN_TOOL_ID};
use crate::config::SecurityMode;
use crate::errors::NeoclawError;
use crate::policy::store::{PatternPolicy, PolicyStore};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainVerdict {
    Allowed,
    Denied,
    NoMatch,
}

/// Normalize a raw host string: trim, unwrap URLs, drop port and IPv6
/// brackets, lowercase, drop trailing dot, strip a leading `*.`.
pub fn normalize_host(raw: &str) -> Result<String, NeoclawError> {
    let trimmed = raw.trim();

    let mut host = if trimmed.contains("://") {
        let url = url::Url::parse(trimmed)
            .map_err(|e| NeoclawError::Parse(format!("invalid URL '{}': {}", trimmed, e)))?;
        url.host_str()
            .ok_or_else(|| NeoclawError::Parse(format!("URL '{}' has no host", trimmed)))?
            .to_string()
    } else if let Some(rest) = trimmed.strip_prefix('[') {
        // Bracketed IPv6, optionally with a port: [::1] or [::1]:8080
        match rest.split_once(']') {
            Some((addr, _)) => addr.to_string(),
            None => {
                return Err(NeoclawError::Parse(format!(
                    "unterminated IPv6 literal '{}'",
                    trimmed
                )));
            }
        }
    } else if trimmed.matches(':').count() == 1 {
        // host:port — keep the host half when the suffix is numeric
        match trimmed.split_once(':') {
            Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h.to_string(),
            _ => trimmed.to_string(),
        }
    } else {
        // No port, or an unbracketed IPv6 literal (multiple colons)
        trimmed.to_string()
    };

    host = host.to_ascii_lowercase();
    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("*.").unwrap_or(host);

    if host.is_empty() {
        return Err(NeoclawError::Parse(format!(
            "host '{}' normalizes to nothing",
            raw
        )));
    }
    Ok(host.to_string())
}

/// Whether a policy entry covers a (normalized) host. An entry `example.com`
/// matches `example.com` and any subdomain; the literal `*` matches any host.
fn entry_matches(entry: &str, host: &str) -> bool {
    if entry.trim() == "*" {
        return true;
    }
    let Ok(entry) = normalize_host(entry) else {
        return false;
    };
    host == entry || host.ends_with(&format!(".{}", entry))
}

/// Evaluate a normalized host against a domain policy, deny-first.
pub fn evaluate(host: &str, policy: &PatternPolicy) -> DomainVerdict {
    if policy.deny.iter().any(|e| entry_matches(e, host)) {
        return DomainVerdict::Denied;
    }
    if policy.allow.iter().any(|e| entry_matches(e, host)) {
        return DomainVerdict::Allowed;
    }
    DomainVerdict::NoMatch
}

/// Authorizes outbound hostnames against the persisted domain policy,
/// prompting the approver (and persisting the outcome) for unknown hosts.
pub struct DomainChecker {
    store: Arc<PolicyStore>,
    policy_path: PathBuf,
    approver: Option<Arc<dyn Approver>>,
    mode: SecurityMode,
}

impl DomainChecker {
    pub fn new(store: Arc<PolicyStore>, policy_path: PathBuf, mode: SecurityMode) -> Self {
        Self {
            store,
            policy_path,
            approver: None,
            mode,
        }
    }

    pub fn with_approver(mut self, approver: Arc<dyn Approver>) -> Self {
        self.approver = Some(approver);
        self
    }

    /// Authorize one outbound host. `raw` may be a bare host, `host:port`, or
    /// a full URL.
    pub async fn allow(&self, raw: &str) -> Result<(), NeoclawError> {
        if self.mode.is_danger() {
            return Ok(());
        }
        let host = normalize_host(raw)?;

        let mut policy = self
            .store
            .load_domain_policy(&self.policy_path)
            .map_err(NeoclawError::Internal)?;

        match evaluate(&host, &policy) {
            DomainVerdict::Allowed => Ok(()),
            DomainVerdict::Denied => Err(NeoclawError::denied(format!(
                "domain '{}' is blocked by policy",
                host
            ))),
            DomainVerdict::NoMatch => {
                let Some(approver) = &self.approver else {
                    return Err(NeoclawError::ApprovalRequired(format!(
                        "domain '{}' is not allowlisted and no approver is configured",
                        host
                    )));
                };

                let decision = approver
                    .request_approval(ApprovalRequest {
                        tool_name: DOMAIN_TOOL_ID.to_string(),
                        description: format!("Allow Domain: {}", host),
                        args: json!({ "host": host }),
                    })
                    .await
                    .map_err(NeoclawError::Internal)?;

                match decision {
                    ApprovalDecision::Approved => {
                        policy.insert_allow(&host);
                        if let Err(e) = self.store.save_domain_policy(&self.policy_path, &policy) {
                            warn!("failed to persist allowed domain '{}': {}", host, e);
                        }
                        Ok(())
                    }
                    ApprovalDecision::Denied => {
                        policy.insert_deny(&host);
                        if let Err(e) = self.store.save_domain_policy(&self.policy_path, &policy) {
                            warn!("failed to persist denied domain '{}': {}", host, e);
                        }
                        Err(NeoclawError::denied(format!(
                            "domain '{}' was denied",
                            host
                        )))
                    }
                }
            }
        }
    }
}

/// HTTP client whose transport asks the [`DomainChecker`] before every
/// request it sends. Shared by the `http_request` tool, the web-search tool,
/// and the scheduler's `http_request` runner.
pub struct GatedClient {
    checker: Arc<DomainChecker>,
    inner: reqwest::Client,
}

impl GatedClient {
    pub fn new(checker: Arc<DomainChecker>) -> Self {
        let inner = reqwest::Client::builder()
            .user_agent(format!("neoclaw/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { checker, inner }
    }

    /// Build a request on the underlying client. The domain gate runs when the
    /// built request is passed to [`GatedClient::execute`].
    pub fn request(&self, method: reqwest::Method, url: url::Url) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }

    pub async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, NeoclawError> {
        let host = request
            .url()
            .host_str()
            .ok_or_else(|| {
                NeoclawError::Parse(format!("request URL '{}' has no host", request.url()))
            })?
            .to_string();
        self.checker.allow(&host).await?;
        self.inner
            .execute(request)
            .await
            .map_err(|e| NeoclawError::Internal(anyhow::anyhow!("HTTP request failed: {}", e)))
    }
}

#[cfg(test)]
mod tests;
