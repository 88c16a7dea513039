use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Matches the token entry of a PHP-serialized `_token` cookie, e.g.
/// `a:2:{i:0;s:6:"_token";i:1;s:32:"<token>";}`.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"i:1;s:(\d+):"([^"]+)""#).expect("valid token regex"));

/// Session identifiers needed by the REST and WebSocket endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub tenant_code: String,
    /// Replayed verbatim in the `Cookie` request header.
    pub cookie_header: String,
}

impl Credentials {
    /// Parses a `Cookie` header value copied from the browser's dev tools.
    pub fn from_cookie_header(cookie_header: &str) -> Result<Self> {
        let cookie_header = cookie_header.trim();
        let mut token = None;
        let mut tenant_code = None;

        for raw in cookie_header.split(';') {
            let decoded = percent_decode(raw);
            tracing::debug!(cookie = %decoded.trim(), "Inspecting cookie");
            if raw.contains("_token") {
                token = extract_token(&decoded).or(token);
            }
            if raw.contains("tenant") {
                tenant_code = Some(extract_tenant_code(&decoded)?);
            }
        }

        Ok(Self {
            token: token.ok_or(Error::MissingCredential("_token"))?,
            tenant_code: tenant_code.ok_or(Error::MissingCredential("tenant_code"))?,
            cookie_header: cookie_header.to_string(),
        })
    }

    /// Builds credentials from the `Set-Cookie` headers of a login response.
    pub fn from_set_cookies<'a, I>(set_cookies: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut token = None;
        let mut tenant_code = None;
        let mut pairs = Vec::new();

        for set_cookie in set_cookies {
            let Some(pair) = set_cookie.split(';').next().map(str::trim) else {
                continue;
            };
            if pair.is_empty() {
                continue;
            }
            pairs.push(pair.to_string());

            let decoded = percent_decode(pair);
            if set_cookie.contains("_token") {
                token = extract_token(&decoded).or(token);
            }
            if set_cookie.contains("tenant_code") {
                let value = set_cookie_value(&decoded)
                    .ok_or_else(|| Error::MalformedCookie(pair.to_string()))?;
                tenant_code = Some(tenant_id_from_json(value)?);
            }
        }

        Ok(Self {
            token: token.ok_or(Error::MissingCredential("_token"))?,
            tenant_code: tenant_code.ok_or(Error::MissingCredential("tenant_code"))?,
            cookie_header: pairs.join("; "),
        })
    }
}

/// Extracts the token from a serialized string stored as `i:1;s:<len>:"<token>"`.
pub fn extract_token(serialized: &str) -> Option<String> {
    TOKEN_RE
        .captures(serialized)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Reads `tenant_id` out of a `tenant...=<json>` cookie.
pub fn extract_tenant_code(cookie: &str) -> Result<String> {
    let value = cookie
        .split_once('=')
        .map(|(_, value)| value)
        .ok_or_else(|| Error::MalformedCookie(cookie.trim().to_string()))?;
    tenant_id_from_json(value)
}

/// Returns the value of the leading `name=value` pair of a `Set-Cookie` header.
pub fn set_cookie_value(set_cookie: &str) -> Option<&str> {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.trim())
}

fn tenant_id_from_json(value: &str) -> Result<String> {
    let json: Value = serde_json::from_str(value.trim()).map_err(|source| Error::Json {
        path: "tenant_code".to_string(),
        source,
    })?;
    match json.get("tenant_id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(Error::MissingCredential("tenant_id")),
    }
}

fn percent_decode(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}
