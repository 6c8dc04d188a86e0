//! URI construction: the `<...>` micro-grammar and CURIE expansion

use super::context::vars;
use super::error::{MapError, MapResult};
use super::pattern::{normalize, pattern_expand};
use super::value::Value;
use crate::processor::resource::declare_property;
use crate::processor::TemplateState;
use crate::spec::MapperSpec;
use data_encoding::BASE32HEX;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::sync::LazyLock;
use uuid::Uuid;

static RE_CURIE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([_A-Za-z][\w\-\.]*):([\w\-\.]+)$").unwrap());
static RE_ABSOLUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());
static RE_HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^hash\s?\(([^)]*)\)$").unwrap());
static RE_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").unwrap());

const ABSENT_HASH_PART: &str = "None";

/// Expand `prefix:local` through the spec's namespaces; anything else,
/// including unknown prefixes, passes through unchanged.
pub fn expand_curie(reference: &str, spec: &MapperSpec) -> String {
    if let Some(caps) = RE_CURIE.captures(reference) {
        if let Some(ns) = spec.namespace(&caps[1]) {
            return format!("{}{}", ns, &caps[2]);
        }
    }
    reference.to_string()
}

/// Base-32 (extended hex alphabet) SHA-1 digest of the parts, in order
pub fn hash_digest<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_ref());
    }
    BASE32HEX.encode(&hasher.finalize())
}

/// Expand a URI pattern to an absolute URI.
///
/// | pattern | result |
/// |---|---|
/// | `name` | `{datasetBase}/def/{name}`, implicitly declared as a property |
/// | `<uuid>` | random, relative to the resource's data path |
/// | `<row>` | `{file}-{row}`, prefixed by the list index inside lists |
/// | `<parent>` | `{parentID}/{resourceID}`, suffixed by the list index |
/// | `<hash(a, 'b')>` | digest of context values and quoted literals |
/// | `<anything>` | pattern-expanded, then CURIE-expanded |
///
/// Relative results resolve against `{datasetBase}/data/{resourceID}/`.
/// When `<row>` or `<parent>` has nothing to work from, the result is
/// `{datasetBase}/data/{resourceID}`.
pub fn uri_expand(pattern: &str, state: &mut TemplateState<'_>) -> MapResult<String> {
    let Some(inner) = pattern.strip_prefix('<').and_then(|p| p.strip_suffix('>')) else {
        let id = format!("{}/def/{}", state.dataset_base(), normalize(pattern));
        if state.spec().auto_declare() {
            declare_property(pattern, &id, None, state);
        }
        return Ok(id);
    };

    let reference = match inner {
        "uuid" => Some(Uuid::new_v4().to_string()),
        "row" => row_reference(state),
        "parent" => parent_reference(state),
        _ => match RE_HASH.captures(inner) {
            Some(caps) => Some(hash_reference(&caps[1], state)),
            None => {
                let expanded = pattern_expand(inner, state)?;
                match expanded.as_text().filter(|s| !s.is_empty()) {
                    Some(text) => Some(expand_curie(&text, state.spec())),
                    None => return Err(MapError::UriExpansion(pattern.to_string())),
                }
            }
        },
    };

    let resource_base = format!(
        "{}/data/{}",
        state.dataset_base(),
        state.lookup(vars::RESOURCE_ID).render()
    );
    Ok(match reference {
        Some(r) if RE_ABSOLUTE.is_match(&r) => r,
        Some(r) => resolve_relative(&format!("{}/", resource_base), &r),
        None => resource_base,
    })
}

fn list_index(state: &TemplateState<'_>) -> Option<String> {
    state
        .get(vars::LIST_INDEX)
        .filter(|v| !v.is_null())
        .map(|v| v.render())
}

fn row_reference(state: &TemplateState<'_>) -> Option<String> {
    let row = state.get(vars::ROW).filter(|v| !v.is_empty())?;
    let id = format!(
        "{}-{}",
        normalize(&state.lookup(vars::FILE).render()),
        row.render()
    );
    Some(match list_index(state) {
        Some(i) => format!("{}/{}", i, id),
        None => id,
    })
}

fn parent_reference(state: &TemplateState<'_>) -> Option<String> {
    let parent = state.get(vars::PARENT_ID).filter(|v| !v.is_empty())?;
    let id = format!(
        "{}/{}",
        parent.render(),
        state.lookup(vars::RESOURCE_ID).render()
    );
    Some(match list_index(state) {
        Some(i) => format!("{}/{}", id, i),
        None => id,
    })
}

/// Quoted arguments are literals, bare ones context variables (absent is empty)
/// Absent variables hash as `None`, keeping ids stable with previously
/// published data.
fn hash_reference(params: &str, state: &TemplateState<'_>) -> String {
    let parts: Vec<String> = RE_COMMA
        .split(params.trim())
        .map(|p| match p.strip_prefix('\'').and_then(|p| p.strip_suffix('\'')) {
            Some(literal) => literal.to_string(),
            None => match state.get(p) {
                None | Some(Value::Null) => ABSENT_HASH_PART.to_string(),
                Some(v) => v.render(),
            },
        })
        .collect();
    hash_digest(&parts)
}

/// Resolve a relative reference against an absolute base ending in `/`
fn resolve_relative(base: &str, reference: &str) -> String {
    let (origin, base_path) = match base.find("://") {
        Some(i) => match base[i + 3..].find('/') {
            Some(j) => base.split_at(i + 3 + j),
            None => (base, "/"),
        },
        None => ("", base),
    };

    if let Some(rest) = reference.strip_prefix("//") {
        let scheme = origin.split("://").next().unwrap_or("http");
        return format!("{}://{}", scheme, rest);
    }
    let path = if reference.starts_with('/') {
        reference.to_string()
    } else {
        format!("{}{}", base_path, reference)
    };
    format!("{}{}", origin, remove_dot_segments(&path))
}

fn remove_dot_segments(path: &str) -> String {
    if !path.contains("/.") && !path.starts_with('.') {
        return path.to_string();
    }
    let mut out: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    for (i, seg) in segments.iter().enumerate() {
        match *seg {
            "." => {
                if i == last {
                    out.push("");
                }
            }
            ".." => {
                if out.len() > 1 {
                    out.pop();
                }
                if i == last {
                    out.push("");
                }
            }
            s => out.push(s),
        }
    }
    out.join("/")
}
