//! URI templates: parsing, matching against concrete URIs, and filling
//! variables back in to produce URIs.
//!
//! A template like `/users/{id}/files/{name:\w+}{?lang}` compiles to a
//! regex for matching, a normalized form for comparisons, and the group
//! bookkeeping to pull variable values out of a match.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::component;
use crate::error::Error;

pub mod parser;

mod de;
pub use de::CaptureDeserializationError;

use parser::TemplateParser;

/// A parsed URI template.
///
/// Matching is whole-string: the compiled pattern must cover the entire
/// candidate URI. Equality and hashing go by the compiled pattern text, so
/// `/u/{a}` and `/u/{b}` are equal while `/u/{a:\d+}` is not.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    template: String,
    normalized: String,
    pattern_text: String,
    regex: Regex,
    names: Vec<String>,
    group_indexes: Vec<usize>,
    literal_chars: usize,
    explicit_regexes: usize,
    regex_groups: usize,
}

impl UriTemplate {
    pub fn new(template: &str) -> Result<UriTemplate, Error> {
        let parser = TemplateParser::new(template)?;
        // anchor for whole-string matching without disturbing group numbers
        let regex = Regex::new(&format!(r"\A(?:{})\z", parser.pattern()))?;
        trace!("compiled {:?} to {:?}", parser.template(), parser.pattern());
        Ok(UriTemplate {
            template: parser.template().to_string(),
            normalized: parser.normalized_template().to_string(),
            pattern_text: parser.pattern().to_string(),
            regex,
            names: parser.names().to_vec(),
            group_indexes: parser.group_indexes(),
            literal_chars: parser.number_of_literal_characters(),
            explicit_regexes: parser.number_of_explicit_regexes(),
            regex_groups: parser.number_of_regex_groups(),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The template with explicit regexes stripped.
    pub fn normalized_template(&self) -> &str {
        &self.normalized
    }

    /// The unanchored regex text this template matches with.
    pub fn pattern(&self) -> &str {
        &self.pattern_text
    }

    /// Variable names in declaration order.
    pub fn variables(&self) -> &[String] {
        &self.names
    }

    pub fn number_of_variables(&self) -> usize {
        self.names.len()
    }

    pub fn number_of_explicit_regexes(&self) -> usize {
        self.explicit_regexes
    }

    pub fn number_of_literal_characters(&self) -> usize {
        self.literal_chars
    }

    pub fn number_of_regex_groups(&self) -> usize {
        self.regex_groups
    }

    pub fn matches(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }

    /// Matches and returns the raw value captured for each variable, in
    /// declaration order. A query or matrix variable the URI does not
    /// carry yields `None`.
    pub fn capture<'a>(&self, uri: &'a str) -> Option<Vec<Option<&'a str>>> {
        let caps = self.regex.captures(uri)?;
        Some(
            self.group_indexes
                .iter()
                .map(|&i| caps.get(i).map(|m| m.as_str()))
                .collect(),
        )
    }

    /// Like [`capture`](UriTemplate::capture), pairing each value with its
    /// variable name.
    pub fn capture_map<'a>(&self, uri: &'a str) -> Option<Vec<(String, Option<&'a str>)>> {
        let caps = self.regex.captures(uri)?;
        Some(
            self.names
                .iter()
                .zip(self.group_indexes.iter())
                .map(|(name, &i)| (name.clone(), caps.get(i).map(|m| m.as_str())))
                .collect(),
        )
    }

    /// Matches a URI and deserializes the percent-decoded captures into
    /// `T`: a tuple in declaration order, or a struct by field name.
    pub fn extract<T: DeserializeOwned>(&self, uri: &str) -> Result<T, Error> {
        let caps = self
            .regex
            .captures(uri)
            .ok_or_else(|| Error::NoMatch(self.pattern_text.clone(), uri.to_string()))?;
        let captures = self
            .names
            .iter()
            .zip(self.group_indexes.iter())
            .map(|(name, &i)| {
                let value = caps.get(i).and_then(|m| percent_decode(m.as_str()));
                (name.clone(), value)
            })
            .collect::<Vec<_>>();

        T::deserialize(de::CapturesDeserializer::new(&captures)).map_err(Error::from)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &UriTemplate) -> bool {
        self.pattern_text == other.pattern_text
    }
}

impl Eq for UriTemplate {}

impl Hash for UriTemplate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern_text.hash(state);
    }
}

// More specific templates sort first: most literal characters, then most
// variables, then most explicit regexes, with the pattern text as the
// final tie-break to stay consistent with equality.
impl Ord for UriTemplate {
    fn cmp(&self, other: &UriTemplate) -> Ordering {
        other
            .literal_chars
            .cmp(&self.literal_chars)
            .then_with(|| other.names.len().cmp(&self.names.len()))
            .then_with(|| other.explicit_regexes.cmp(&self.explicit_regexes))
            .then_with(|| self.pattern_text.cmp(&other.pattern_text))
    }
}

impl PartialOrd for UriTemplate {
    fn partial_cmp(&self, other: &UriTemplate) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn percent_decode(s: &str) -> Option<String> {
    percent_encoding::percent_decode(s.as_bytes())
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

// {name} with an optional ? or ; marker and ,-separated sub-names
fn template_names_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{([\w\?;][-\w\.,]*)\}").expect("the variable name pattern compiles")
    })
}

/// The parts of a URI reference fed to the substitution engine. Every
/// part may itself contain `{name}` variables.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UriParts {
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub user_info: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

enum ValueSource<'a> {
    Positional {
        values: &'a [&'a str],
        next: usize,
        seen: Vec<(String, String)>,
    },
    Map(&'a [(&'a str, &'a str)]),
}

impl ValueSource<'_> {
    fn value_for(&mut self, name: &str) -> Result<String, Error> {
        match self {
            ValueSource::Positional { values, next, seen } => {
                // a repeated name reuses the value its first occurrence took
                if let Some((_, value)) = seen.iter().find(|(n, _)| n == name) {
                    return Ok(value.clone());
                }
                match values.get(*next) {
                    Some(value) => {
                        *next += 1;
                        seen.push((name.to_string(), value.to_string()));
                        Ok(value.to_string())
                    }
                    None => Err(Error::MissingValue(name.to_string())),
                }
            }
            ValueSource::Map(pairs) => pairs
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, value)| value.to_string())
                .ok_or_else(|| Error::MissingValue(name.to_string())),
        }
    }
}

/// Substitutes variables across the parts of a URI and assembles the
/// result. Values bind to variables in order of first occurrence, left
/// to right through scheme, authority, path, query and fragment.
///
/// With `encode` set, each value is fully percent-encoded for the
/// component it lands in; otherwise only characters that are illegal
/// there are escaped, and existing `%XX` triplets pass through.
/// `encode_slash_in_path` escapes `/` in path values.
pub fn create_uri(
    parts: &UriParts,
    values: &[&str],
    encode: bool,
    encode_slash_in_path: bool,
) -> Result<String, Error> {
    let mut source = ValueSource::Positional {
        values,
        next: 0,
        seen: Vec::new(),
    };
    assemble(parts, &mut source, encode, encode_slash_in_path)
}

/// Like [`create_uri`], with values looked up by variable name.
pub fn create_uri_from_map(
    parts: &UriParts,
    values: &[(&str, &str)],
    encode: bool,
    encode_slash_in_path: bool,
) -> Result<String, Error> {
    let mut source = ValueSource::Map(values);
    assemble(parts, &mut source, encode, encode_slash_in_path)
}

fn assemble(
    parts: &UriParts,
    source: &mut ValueSource<'_>,
    encode: bool,
    encode_slash_in_path: bool,
) -> Result<String, Error> {
    let mut sb = String::new();

    if let Some(scheme) = parts.scheme.as_deref() {
        fill_component(component::Type::Scheme, scheme, source, false, &mut sb)?;
        sb.push(':');
    }

    let mut has_authority = false;
    if present(&parts.user_info).is_some()
        || present(&parts.host).is_some()
        || present(&parts.port).is_some()
    {
        has_authority = true;
        sb.push_str("//");
        if let Some(user_info) = present(&parts.user_info) {
            fill_component(component::Type::UserInfo, user_info, source, encode, &mut sb)?;
            sb.push('@');
        }
        if let Some(host) = present(&parts.host) {
            fill_component(component::Type::Host, host, source, encode, &mut sb)?;
        }
        if let Some(port) = present(&parts.port) {
            sb.push(':');
            fill_component(component::Type::Port, port, source, false, &mut sb)?;
        }
    } else if let Some(authority) = present(&parts.authority) {
        has_authority = true;
        sb.push_str("//");
        fill_component(component::Type::Authority, authority, source, encode, &mut sb)?;
    }

    // A rootless path stays rootless unless an authority precedes it. After
    // an authority the path is rooted even when empty, so a bare query or
    // fragment still hangs off "/".
    let rooted = present(&parts.path).is_some_and(|p| p.starts_with('/'));
    let has_tail = present(&parts.path).is_some()
        || present(&parts.query).is_some()
        || present(&parts.fragment).is_some();
    if has_authority && !rooted && has_tail {
        sb.push('/');
    }

    if let Some(path) = present(&parts.path) {
        let t = if encode_slash_in_path {
            component::Type::PathSegment
        } else {
            component::Type::Path
        };
        fill_component(t, path, source, encode, &mut sb)?;
    }

    if let Some(query) = present(&parts.query) {
        sb.push('?');
        fill_component(component::Type::QueryParam, query, source, encode, &mut sb)?;
    }

    if let Some(fragment) = present(&parts.fragment) {
        sb.push('#');
        fill_component(component::Type::Fragment, fragment, source, encode, &mut sb)?;
    }

    debug!("assembled {}", sb);
    Ok(sb)
}

fn present(part: &Option<String>) -> Option<&str> {
    part.as_deref().filter(|s| !s.is_empty())
}

fn fill_component(
    t: component::Type,
    template: &str,
    source: &mut ValueSource<'_>,
    encode: bool,
    out: &mut String,
) -> Result<(), Error> {
    if !template.contains('{') {
        out.push_str(template);
        return Ok(());
    }
    let normalized = TemplateParser::new(template)?.normalized_template().to_string();

    let mut last = 0;
    for caps in template_names_pattern().captures_iter(&normalized) {
        let (Some(m), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&normalized[last..m.start()]);
        let value = source.value_for(name.as_str())?;
        trace!("filling {:?} in the {:?} component", name.as_str(), t);
        if encode {
            out.push_str(&component::encode(&value, t, false));
        } else {
            out.push_str(&component::contextual_encode(&value, t, false));
        }
        last = m.end();
    }
    out.push_str(&normalized[last..]);
    Ok(())
}

/// Replaces only the variables `values` has names for, leaving the rest
/// in template form. Explicit regexes are stripped in the process.
pub fn resolve_template_values(
    t: component::Type,
    template: &str,
    encode: bool,
    values: &[(&str, &str)],
) -> Result<String, Error> {
    if template.is_empty() || !template.contains('{') {
        return Ok(template.to_string());
    }
    let normalized = TemplateParser::new(template)?.normalized_template().to_string();

    let mut sb = String::new();
    let mut last = 0;
    for caps in template_names_pattern().captures_iter(&normalized) {
        let (Some(m), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        sb.push_str(&normalized[last..m.start()]);
        match values.iter().find(|(n, _)| *n == name.as_str()) {
            Some((_, value)) => {
                if encode {
                    sb.push_str(&component::encode(value, t, false));
                } else {
                    sb.push_str(&component::contextual_encode(value, t, false));
                }
            }
            None => sb.push_str(m.as_str()),
        }
        last = m.end();
    }
    sb.push_str(&normalized[last..]);
    Ok(sb)
}
