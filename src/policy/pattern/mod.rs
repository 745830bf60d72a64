//! Shell-command pattern matching for the command allow/deny policy.
//!
//! A pattern is a whitespace-tokenized string in which the literal token `*`
//! matches zero or more whole command tokens. There is no sub-token
//! wildcarding: `ls *` does not match `lsof`.

/// Outcome of evaluating a command against an allow/deny policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVerdict {
    Allowed,
    Denied,
    NoMatch,
}

/// Tokenize a command shell-style, honoring single and double quotes.
/// Returns `None` when the input cannot be parsed (e.g. unclosed quote).
pub fn tokenize(command: &str) -> Option<Vec<String>> {
    shlex::split(command)
}

/// Whether a token has the shape of an environment assignment
/// (`[A-Za-z_][A-Za-z0-9_]*=…`).
fn is_env_assignment(token: &str) -> bool {
    let Some(eq) = token.find('=') else {
        return false;
    };
    let name = &token[..eq];
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Discard leading env-assignment tokens (`FOO=bar git commit` → `git commit`).
pub fn strip_env_assignments(tokens: &[String]) -> &[String] {
    let mut start = 0;
    while start < tokens.len() && is_env_assignment(&tokens[start]) {
        start += 1;
    }
    &tokens[start..]
}

/// Match pattern tokens against command tokens. Each literal token must match
/// exactly; each `*` greedily matches zero or more command tokens,
/// backtracking as needed.
pub fn pattern_matches(pattern: &[String], command: &[String]) -> bool {
    match pattern.first() {
        None => command.is_empty(),
        Some(tok) if tok == "*" => {
            // Try consuming 0..=len command tokens, longest first.
            (0..=command.len())
                .rev()
                .any(|n| pattern_matches(&pattern[1..], &command[n..]))
        }
        Some(tok) => command
            .first()
            .is_some_and(|c| c == tok && pattern_matches(&pattern[1..], &command[1..])),
    }
}

/// Evaluate a raw command string against allow/deny pattern lists.
///
/// Deny wins: if any deny pattern matches, the result is `Denied` even when an
/// allow pattern also matches. Unparseable commands and commands that are
/// empty after env-assignment stripping yield `NoMatch`.
pub fn evaluate(command: &str, allow: &[String], deny: &[String]) -> CommandVerdict {
    let Some(tokens) = tokenize(command) else {
        return CommandVerdict::NoMatch;
    };
    let tokens = strip_env_assignments(&tokens);
    if tokens.is_empty() {
        return CommandVerdict::NoMatch;
    }

    let matches_any = |patterns: &[String]| {
        patterns.iter().any(|p| {
            tokenize(p).is_some_and(|pattern_tokens| pattern_matches(&pattern_tokens, tokens))
        })
    };

    if matches_any(deny) {
        return CommandVerdict::Denied;
    }
    if matches_any(allow) {
        return CommandVerdict::Allowed;
    }
    CommandVerdict::NoMatch
}

/// Synthesize a canonical pattern from a raw command.
///
/// Tokens are scanned left to right; the first flag token (`-x`/`--xyz`) ends
/// the literal prefix and the pattern becomes `<prefix> *`. A command with no
/// flags yields its full literal form. A command whose first non-env token is
/// a flag has no useful prefix and yields `None`.
pub fn generate_pattern(command: &str) -> Option<String> {
    let tokens = tokenize(command)?;
    let tokens = strip_env_assignments(&tokens);
    if tokens.is_empty() {
        return None;
    }

    let mut prefix: Vec<&str> = Vec::new();
    for token in tokens {
        if token.starts_with('-') {
            if prefix.is_empty() {
                return None;
            }
            return Some(format!("{} *", prefix.join(" ")));
        }
        prefix.push(token.as_str());
    }
    Some(prefix.join(" "))
}
