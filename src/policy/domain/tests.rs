use super::*;
use crate::approval::{ApprovalDecision, ApprovalRequest, Approver};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

struct ScriptedApprover {
    decision: ApprovalDecision,
    calls: AtomicUsize,
    last_description: std::sync::Mutex<Option<String>>,
}

impl ScriptedApprover {
    fn new(decision: ApprovalDecision) -> Self {
        Self {
            decision,
            calls: AtomicUsize::new(0),
            last_description: std::sync::Mutex::new(None),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Approver for ScriptedApprover {
    async fn request_approval(&self, req: ApprovalRequest) -> anyhow::Result<ApprovalDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_description.lock().unwrap() = Some(req.description);
        Ok(self.decision)
    }
}

fn policy(allow: &[&str], deny: &[&str]) -> PatternPolicy {
    PatternPolicy {
        allow: allow.iter().map(|s| (*s).to_string()).collect(),
        deny: deny.iter().map(|s| (*s).to_string()).collect(),
    }
}

// --- normalize_host ---

#[test]
fn test_normalize_basic() {
    assert_eq!(normalize_host("Example.COM").unwrap(), "example.com");
    assert_eq!(normalize_host("  example.com  ").unwrap(), "example.com");
    assert_eq!(normalize_host("example.com.").unwrap(), "example.com");
    assert_eq!(normalize_host("*.example.com").unwrap(), "example.com");
}

#[test]
fn test_normalize_port_and_url() {
    assert_eq!(normalize_host("api.github.com:443").unwrap(), "api.github.com");
    assert_eq!(
        normalize_host("https://api.github.com/repos").unwrap(),
        "api.github.com"
    );
    assert_eq!(
        normalize_host("http://example.com:8080/x?y=1").unwrap(),
        "example.com"
    );
}

#[test]
fn test_normalize_ipv6() {
    assert_eq!(normalize_host("[::1]:8080").unwrap(), "::1");
    assert_eq!(normalize_host("[2001:db8::1]").unwrap(), "2001:db8::1");
    assert_eq!(normalize_host("2001:db8::1").unwrap(), "2001:db8::1");
}

#[test]
fn test_normalize_rejects_empty() {
    assert!(normalize_host("").is_err());
    assert!(normalize_host(".").is_err());
}

// --- evaluate ---

#[test]
fn test_evaluate_subdomain_match() {
    let p = policy(&["github.com"], &[]);
    assert_eq!(evaluate("github.com", &p), DomainVerdict::Allowed);
    assert_eq!(evaluate("api.github.com", &p), DomainVerdict::Allowed);
    assert_eq!(evaluate("api.gitlab.com", &p), DomainVerdict::NoMatch);
    // Suffix must align on a label boundary
    assert_eq!(evaluate("evilgithub.com", &p), DomainVerdict::NoMatch);
}

#[test]
fn test_evaluate_deny_precedence() {
    let p = policy(&["example.com"], &["example.com"]);
    assert_eq!(evaluate("api.example.com", &p), DomainVerdict::Denied);
    assert_eq!(evaluate("example.com", &p), DomainVerdict::Denied);
}

#[test]
fn test_evaluate_wildcard() {
    let allow_all = policy(&["*"], &[]);
    assert_eq!(evaluate("anything.example", &allow_all), DomainVerdict::Allowed);

    // Wildcard deny blocks everything even when allow also has "*"
    let deny_all = policy(&["*"], &["*"]);
    assert_eq!(evaluate("example.com", &deny_all), DomainVerdict::Denied);
}

// --- DomainChecker ---

fn checker_with(
    dir: &tempfile::TempDir,
    p: &PatternPolicy,
    approver: Option<Arc<dyn Approver>>,
) -> DomainChecker {
    let store = Arc::new(PolicyStore::new());
    let path = dir.path().join("allowed_domains.json");
    store.save_domain_policy(&path, p).unwrap();
    let mut checker = DomainChecker::new(store, path, SecurityMode::Standard);
    if let Some(a) = approver {
        checker = checker.with_approver(a);
    }
    checker
}

#[tokio::test]
async fn test_allow_subdomain_with_port() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker_with(&dir, &policy(&["github.com"], &[]), None);
    checker.allow("api.github.com:443").await.unwrap();
}

#[tokio::test]
async fn test_no_match_without_approver_errors() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker_with(&dir, &policy(&["github.com"], &[]), None);
    let err = checker.allow("api.gitlab.com").await.unwrap_err();
    assert!(err.to_string().contains("no approver"));
}

#[tokio::test]
async fn test_denied_does_not_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let approver = Arc::new(ScriptedApprover::new(ApprovalDecision::Approved));
    let checker = checker_with(
        &dir,
        &policy(&["example.com"], &["example.com"]),
        Some(approver.clone()),
    );
    let err = checker.allow("api.example.com").await.unwrap_err();
    assert!(err.to_string().contains("blocked by policy"));
    assert_eq!(approver.call_count(), 0);
}

#[tokio::test]
async fn test_prompt_approve_persists_allow() {
    let dir = tempfile::tempdir().unwrap();
    let approver = Arc::new(ScriptedApprover::new(ApprovalDecision::Approved));
    let checker = checker_with(&dir, &PatternPolicy::default(), Some(approver.clone()));

    checker.allow("https://api.example.com/v1").await.unwrap();
    assert_eq!(approver.call_count(), 1);
    assert_eq!(
        approver.last_description.lock().unwrap().as_deref(),
        Some("Allow Domain: api.example.com")
    );

    // Second call hits the persisted allow entry without prompting.
    checker.allow("api.example.com").await.unwrap();
    assert_eq!(approver.call_count(), 1);
}

#[tokio::test]
async fn test_prompt_deny_persists_deny_with_guidance() {
    let dir = tempfile::tempdir().unwrap();
    let approver = Arc::new(ScriptedApprover::new(ApprovalDecision::Denied));
    let checker = checker_with(&dir, &PatternPolicy::default(), Some(approver.clone()));

    let err = checker.allow("evil.example").await.unwrap_err();
    assert!(err.to_string().contains(crate::errors::DENIED_GUIDANCE));

    // The deny entry now matches without prompting again.
    let err = checker.allow("evil.example").await.unwrap_err();
    assert!(err.to_string().contains("blocked by policy"));
    assert_eq!(approver.call_count(), 1);
}

#[tokio::test]
async fn test_danger_mode_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(PolicyStore::new());
    let path = dir.path().join("allowed_domains.json");
    store
        .save_domain_policy(&path, &policy(&[], &["*"]))
        .unwrap();
    let checker = DomainChecker::new(store, path, SecurityMode::Danger);
    checker.allow("blocked.example").await.unwrap();
}
