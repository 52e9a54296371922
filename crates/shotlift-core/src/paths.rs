//! Remote path, URL and filename-template helpers.
//!
//! Remote paths are always forward-slash separated, whatever the local
//! platform uses.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use url::Url;

use crate::error::{TransferError, TransferResult};

const PLACEHOLDER_START: char = '{';
const PLACEHOLDER_END: char = '}';
const PLACEHOLDER_ESCAPE: char = '\\';

lazy_static! {
    static ref INVALID_FILENAME_CHARS: HashSet<char> =
        ['<', '>', ':', '"', '/', '\\', '|', '?', '*'].into_iter().collect();
}

// ─── File names ──────────────────────────────────────────────────────

/// Replace characters that are not allowed in file names with `_`.
pub fn remove_invalid_filename_chars(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// `yyyyMMddHHmmssffff`: seconds resolution plus four fractional digits.
pub fn compact_timestamp(time: DateTime<Local>) -> String {
    let fraction = (time.timestamp_subsec_nanos() / 100_000).min(9_999);
    format!("{}{:04}", time.format("%Y%m%d%H%M%S"), fraction)
}

/// Expand `{placeholder}` tokens in `template`.
///
/// Known placeholders come from `args`; anything else is treated as a
/// strftime pattern applied to `now`. A backslash makes the next
/// character literal. Substituted values are sanitised, literal text is
/// not.
pub fn format_filename(
    template: &str,
    args: &HashMap<String, String>,
    now: DateTime<Local>,
) -> TransferResult<String> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if c == PLACEHOLDER_START {
            let end = chars[i..]
                .iter()
                .position(|&ch| ch == PLACEHOLDER_END)
                .map(|p| p + i);
            let end = match end {
                Some(end) if end > i => end,
                _ => {
                    return Err(TransferError::invalid_config(format!(
                        "Expected '{}' at position {}",
                        PLACEHOLDER_END, i
                    )))
                }
            };

            let placeholder: String = chars[i..end].iter().collect();
            let value = match args.get(&placeholder) {
                Some(v) => v.clone(),
                None => format_date(&placeholder, now)?,
            };
            out.push_str(&remove_invalid_filename_chars(&value));
            i = end + 1;
        } else if c == PLACEHOLDER_ESCAPE {
            if i >= chars.len() {
                return Err(TransferError::invalid_config(format!(
                    "Unexpected end of string after '{}'",
                    PLACEHOLDER_ESCAPE
                )));
            }
            out.push(chars[i]);
            i += 1;
        } else {
            out.push(c);
        }
    }

    Ok(out)
}

fn format_date(pattern: &str, now: DateTime<Local>) -> TransferResult<String> {
    let items: Vec<Item> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(TransferError::invalid_config(format!(
            "'{}' is not a valid placeholder name or date format",
            pattern
        )));
    }
    Ok(now.format_with_items(items.into_iter()).to_string())
}

// ─── Remote paths ────────────────────────────────────────────────────

/// Join parts with `/`. Backslashes become slashes, empty parts are
/// skipped and the result never ends with a slash.
pub fn uri_combine(parts: &[&str]) -> String {
    let mut combined = String::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        combined.push_str(&part.replace('\\', "/"));
        if !combined.ends_with('/') {
            combined.push('/');
        }
    }
    combined.trim_end_matches('/').to_string()
}

/// Directory portion of a remote path (`/` for top-level entries).
pub fn remote_parent(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Last segment of a remote path.
pub fn remote_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ─── URLs ────────────────────────────────────────────────────────────

/// Percent-encode each `/`-separated segment of `path`.
pub fn url_encode(path: &str) -> String {
    path.split(['/', '\\'])
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_segment(segment: &str) -> String {
    let mut scratch = match Url::parse("http://localhost/") {
        Ok(u) => u,
        Err(_) => return segment.to_string(),
    };
    if let Ok(mut segments) = scratch.path_segments_mut() {
        segments.clear().push(segment);
    }
    scratch.path().trim_start_matches('/').to_string()
}

/// Public link for a file uploaded below `http_base`.
pub fn public_url(http_base: &str, relative: &str) -> TransferResult<String> {
    let mut url = Url::parse(http_base).map_err(|e| {
        TransferError::invalid_config(format!("Invalid HTTP base URI '{}': {}", http_base, e))
    })?;
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            TransferError::invalid_config(format!("HTTP base URI '{}' cannot have paths", http_base))
        })?;
        segments.pop_if_empty();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
    }
    Ok(url.to_string())
}

/// Map an uploaded remote path back to its public link.
pub fn translate_server_path(
    server_path: &str,
    server_base: &str,
    http_base: &str,
) -> TransferResult<String> {
    let base = if server_base.is_empty() || server_base.ends_with('/') {
        server_base.to_string()
    } else {
        format!("{}/", server_base)
    };
    let folder = format!("{}/", remote_parent(server_path).trim_end_matches('/'));

    if !folder.starts_with(&base) {
        return Err(TransferError::invalid_operation(format!(
            "Server path '{}' is outside of the configured base server path '{}'",
            server_path, server_base
        )));
    }

    let relative = server_path.strip_prefix(&base).unwrap_or(server_path);
    public_url(http_base, relative)
}
