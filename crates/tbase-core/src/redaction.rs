use serde::{Deserialize, Serialize};

use crate::value::SqlValue;

/// Connection metadata with secrets redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactedConnection {
    pub engine: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Redact the password and sensitive query parameters of a connection URL,
/// extracting the non-sensitive parts for run metadata.
pub fn redact_connection_string(conn: &str) -> RedactedConnection {
    let mut info = RedactedConnection {
        engine: None,
        user: None,
        host: None,
        port: None,
        database: None,
        redacted: conn.to_string(),
    };

    let Some((scheme, rest)) = conn.split_once("://") else {
        return info;
    };
    info.engine = Some(scheme.to_string());

    let (location, query) = match rest.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (rest, None),
    };

    let (auth, host_and_path) = match location.rsplit_once('@') {
        Some((auth, host_and_path)) => (Some(auth), host_and_path),
        None => (None, location),
    };

    let auth = auth.map(|auth| match auth.split_once(':') {
        Some((user, _password)) => {
            info.user = Some(user.to_string());
            format!("{user}:***")
        }
        None => {
            info.user = Some(auth.to_string());
            auth.to_string()
        }
    });

    let (host_port, database) = match host_and_path.split_once('/') {
        Some((host_port, database)) => (host_port, Some(database)),
        None => (host_and_path, None),
    };
    if let Some((host, port)) = host_port.rsplit_once(':') {
        info.host = Some(host.to_string());
        info.port = port.parse().ok();
    } else if !host_port.is_empty() {
        info.host = Some(host_port.to_string());
    }
    info.database = database
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string());

    let mut redacted = format!("{scheme}://");
    if let Some(auth) = auth {
        redacted.push_str(&auth);
        redacted.push('@');
    }
    redacted.push_str(host_and_path);
    if let Some(query) = query {
        redacted.push('?');
        redacted.push_str(&redact_query(query));
    }
    info.redacted = redacted;
    info
}

fn redact_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "password" | "pass" | "pwd" | "secret" | "token" | "api_key" | "apikey"
    )
}

/// Describe bound parameters by position and type only, for logging.
pub fn describe_parameters(params: &[SqlValue]) -> String {
    let parts: Vec<String> = params
        .iter()
        .enumerate()
        .map(|(idx, value)| format!("${}=<{}>", idx + 1, value.type_name()))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Replace every rendering of a bound parameter inside `message` with `***`.
///
/// Backends echo offending input in some error messages (for example invalid
/// input syntax errors); this keeps bound values out of surfaced errors. A
/// match is only replaced when it does not continue a longer word or number,
/// so the key `1` leaves "at character 15" intact.
pub fn scrub_parameters(message: &str, params: &[SqlValue]) -> String {
    let mut renderings: Vec<String> = params
        .iter()
        .filter_map(|value| match value {
            SqlValue::Null | SqlValue::Bool(_) => None,
            other => Some(other.to_string()),
        })
        .filter(|rendered| !rendered.trim().is_empty())
        .collect();
    // Longest first so a value containing another is replaced whole.
    renderings.sort_by_key(|rendered| std::cmp::Reverse(rendered.len()));

    let mut scrubbed = message.to_string();
    for rendered in renderings {
        scrubbed = replace_standalone(&scrubbed, &rendered);
    }
    scrubbed
}

fn replace_standalone(haystack: &str, needle: &str) -> String {
    let first = needle.chars().next();
    let last = needle.chars().next_back();
    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    for (start, _) in haystack.match_indices(needle) {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        if continues_word(before, first) || continues_word(after, last) {
            continue;
        }
        out.push_str(&haystack[cursor..start]);
        out.push_str("***");
        cursor = end;
    }
    out.push_str(&haystack[cursor..]);
    out
}

fn continues_word(neighbour: Option<char>, edge: Option<char>) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    matches!((neighbour, edge), (Some(n), Some(e)) if is_word(n) && is_word(e))
}
