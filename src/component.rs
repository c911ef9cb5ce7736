//! Per-component percent encoding, decoding and validation, RFC 3986.
//!
//! Each component type carries its own table of characters that may stay
//! unescaped. Tables are derived incrementally: unreserved, then sub-delims
//! for registry components, then the pchar extras, with the query family
//! subtracting the characters that would collide with parameter structure.

use std::sync::OnceLock;

use percent_encoding::{percent_decode_str, percent_encode_byte};

use crate::error::Error;

/// URI component types with distinct sets of legal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Scheme,
    Authority,
    UserInfo,
    Host,
    Port,
    Path,
    PathSegment,
    MatrixParam,
    Query,
    QueryParam,
    QueryParamSpaceEncoded,
    Fragment,
    Unreserved,
}

// sub-delims = "!" / "$" / "&" / "'" / "(" / ")" / "*" / "+" / "," / ";" / "="
const SUB_DELIMS: &str = "!$&'()*+,;=";
// characters a query must escape even though a path may carry them
const QUERY_RESERVED: &str = "!*'();:@$,/?";

type Table = [bool; 128];

struct Tables {
    scheme: Table,
    unreserved: Table,
    host: Table,
    port: Table,
    user_info: Table,
    authority: Table,
    path_segment: Table,
    matrix_param: Table,
    path: Table,
    query: Table,
    query_param: Table,
}

impl Tables {
    fn for_type(&self, t: Type) -> &Table {
        match t {
            Type::Scheme => &self.scheme,
            Type::Unreserved => &self.unreserved,
            Type::Host => &self.host,
            Type::Port => &self.port,
            Type::UserInfo => &self.user_info,
            Type::Authority => &self.authority,
            Type::PathSegment => &self.path_segment,
            Type::MatrixParam => &self.matrix_param,
            Type::Path => &self.path,
            Type::Query => &self.query,
            Type::QueryParam | Type::QueryParamSpaceEncoded => &self.query_param,
            Type::Fragment => &self.query,
        }
    }
}

fn mark(table: &mut Table, chars: &str) {
    for c in chars.chars() {
        table[c as usize] = true;
    }
}

fn clear(table: &mut Table, chars: &str) {
    for c in chars.chars() {
        table[c as usize] = false;
    }
}

fn alnum() -> Table {
    let mut t = [false; 128];
    for b in (b'0'..=b'9').chain(b'A'..=b'Z').chain(b'a'..=b'z') {
        t[b as usize] = true;
    }
    t
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut scheme = alnum();
        mark(&mut scheme, "+-.");

        let mut unreserved = alnum();
        mark(&mut unreserved, "-._~");

        let mut host = unreserved;
        mark(&mut host, SUB_DELIMS);

        let mut port = [false; 128];
        for b in b'0'..=b'9' {
            port[b as usize] = true;
        }

        let mut user_info = host;
        mark(&mut user_info, ":");

        let mut authority = user_info;
        mark(&mut authority, "@");

        // a segment escapes its own separators, '/' and ';'
        let mut path_segment = authority;
        clear(&mut path_segment, ";");

        let mut matrix_param = path_segment;
        clear(&mut matrix_param, "=");

        let mut path = authority;
        mark(&mut path, "/;");

        let mut query = path;
        clear(&mut query, QUERY_RESERVED);

        let mut query_param = query;
        clear(&mut query_param, "=&+");

        Tables {
            scheme,
            unreserved,
            host,
            port,
            user_info,
            authority,
            path_segment,
            matrix_param,
            path,
            query,
            query_param,
        }
    })
}

pub fn is_hex(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn percent_encode_char(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for b in c.encode_utf8(&mut buf).bytes() {
        out.push_str(percent_encode_byte(b));
    }
}

fn walk(s: &str, t: Type, template: bool, contextual: bool) -> String {
    let table = tables().for_type(t);
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut inside_template = false;
    let mut iter = s.char_indices();
    while let Some((i, c)) = iter.next() {
        if (c as usize) < 128 && table[c as usize] {
            out.push(c);
            continue;
        }
        if template {
            match c {
                '{' => {
                    inside_template = true;
                    out.push(c);
                    continue;
                }
                '}' => {
                    inside_template = false;
                    out.push(c);
                    continue;
                }
                _ if inside_template => {
                    out.push(c);
                    continue;
                }
                _ => {}
            }
        }
        if contextual
            && c == '%'
            && matches!(bytes.get(i + 1), Some(b) if b.is_ascii_hexdigit())
            && matches!(bytes.get(i + 2), Some(b) if b.is_ascii_hexdigit())
        {
            // an already percent-encoded octet is copied through
            out.push('%');
            if let Some((_, h)) = iter.next() {
                out.push(h);
            }
            if let Some((_, h)) = iter.next() {
                out.push(h);
            }
            continue;
        }
        if c == ' ' && t == Type::QueryParam {
            out.push('+');
        } else {
            percent_encode_char(&mut out, c);
        }
    }
    out
}

/// Percent-encodes every character that is not legal for the component,
/// including `%` itself. With `template` set, `{...}` spans pass through
/// untouched.
pub fn encode(s: &str, t: Type, template: bool) -> String {
    walk(s, t, template, false)
}

/// Like [`encode`], but an existing valid `%XX` triplet is kept as-is
/// instead of having its `%` escaped.
pub fn contextual_encode(s: &str, t: Type, template: bool) -> String {
    walk(s, t, template, true)
}

/// Escapes the template braces themselves, turning `{name}` placeholders
/// into literal `%7Bname%7D` text.
pub fn encode_template_names(s: &str) -> String {
    s.replace('{', "%7B").replace('}', "%7D")
}

fn first_invalid(s: &str, t: Type, template: bool) -> Option<(usize, char)> {
    let table = tables().for_type(t);
    for (i, c) in s.char_indices() {
        let legal = c == '%'
            || (c as usize) < 128 && table[c as usize]
            || template && (c == '{' || c == '}');
        if !legal {
            return Some((i, c));
        }
    }
    None
}

pub fn valid(s: &str, t: Type, template: bool) -> bool {
    first_invalid(s, t, template).is_none()
}

pub fn validate(s: &str, t: Type, template: bool) -> Result<(), Error> {
    match first_invalid(s, t, template) {
        Some((i, c)) => Err(Error::InvalidComponent(s.to_string(), c, i, t)),
        None => Ok(()),
    }
}

/// Percent-decodes a component. Fails on a malformed octet. A bracketed
/// IP literal host is returned unchanged so zone-id escapes survive; a
/// query param decodes `+` as space first.
pub fn decode(s: &str, t: Type) -> Result<String, Error> {
    if s.is_empty() {
        return Ok(String::new());
    }
    if t == Type::Host && s.starts_with('[') && s.ends_with(']') {
        return Ok(s.to_string());
    }
    let text = if t == Type::QueryParam {
        s.replace('+', " ")
    } else {
        s.to_string()
    };
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let ok = i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !ok {
                return Err(Error::MalformedOctet(i, s.to_string()));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(percent_decode_str(&text).decode_utf8_lossy().into_owned())
}

pub(crate) fn push_param(params: &mut Vec<(String, Vec<String>)>, name: String, value: String) {
    match params.iter_mut().find(|(n, _)| *n == name) {
        Some((_, values)) => values.push(value),
        None => params.push((name, vec![value])),
    }
}

/// Splits a raw query into an ordered multimap of parameters. Empty
/// params and params with an empty name are skipped; a param without `=`
/// maps to the empty value.
pub fn decode_query(
    query: &str,
    decode_names: bool,
    decode_values: bool,
) -> Result<Vec<(String, Vec<String>)>, Error> {
    let mut params = Vec::new();
    for param in query.split('&') {
        if param.is_empty() {
            continue;
        }
        match param.find('=') {
            Some(0) => continue,
            Some(eq) => {
                let name = maybe_decode(&param[..eq], Type::QueryParam, decode_names)?;
                let value = maybe_decode(&param[eq + 1..], Type::QueryParam, decode_values)?;
                push_param(&mut params, name, value);
            }
            None => {
                let name = maybe_decode(param, Type::QueryParam, decode_names)?;
                push_param(&mut params, name, String::new());
            }
        }
    }
    Ok(params)
}

/// Splits the matrix parameters of one path segment (everything after its
/// first `;`) into an ordered multimap.
pub fn decode_matrix(
    path_segment: &str,
    decode: bool,
) -> Result<Vec<(String, Vec<String>)>, Error> {
    let mut params = Vec::new();
    let start = match path_segment.find(';') {
        Some(i) => i + 1,
        None => return Ok(params),
    };
    for param in path_segment[start..].split(';') {
        if param.is_empty() {
            continue;
        }
        match param.find('=') {
            Some(0) => continue,
            Some(eq) => {
                let name = maybe_decode(&param[..eq], Type::MatrixParam, decode)?;
                let value = maybe_decode(&param[eq + 1..], Type::MatrixParam, decode)?;
                push_param(&mut params, name, value);
            }
            None => {
                let name = maybe_decode(param, Type::MatrixParam, decode)?;
                push_param(&mut params, name, String::new());
            }
        }
    }
    Ok(params)
}

/// Splits a path into segments, each still carrying its matrix text. A
/// leading `/` does not produce an empty first segment and a trailing `/`
/// does not produce an empty last one; interior empties are kept.
pub fn decode_path(path: &str, decode: bool) -> Result<Vec<String>, Error> {
    let mut segments = Vec::new();
    let mut s = if path.starts_with('/') { 1 } else { 0 };
    loop {
        match path[s..].find('/') {
            Some(rel) => {
                segments.push(maybe_decode(&path[s..s + rel], Type::PathSegment, decode)?);
                s += rel + 1;
                if s >= path.len() {
                    break;
                }
            }
            None => {
                segments.push(maybe_decode(&path[s..], Type::PathSegment, decode)?);
                break;
            }
        }
    }
    Ok(segments)
}

fn maybe_decode(s: &str, t: Type, decode_it: bool) -> Result<String, Error> {
    if decode_it {
        decode(s, t)
    } else {
        Ok(s.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_encoding() {
        assert_eq!(
            encode("a b c.-*_=+&%xx%20", Type::Query, false),
            "a%20b%20c.-%2A_=+&%25xx%2520"
        );
        assert_eq!(
            contextual_encode("a b c.-*_=+&%xx%20", Type::Query, false),
            "a%20b%20c.-%2A_=+&%25xx%20"
        );
    }

    #[test]
    fn query_param_encoding() {
        assert_eq!(
            encode("a b c.-*_=+&%xx%20", Type::QueryParam, false),
            "a+b+c.-%2A_%3D%2B%26%25xx%2520"
        );
        assert_eq!(
            contextual_encode("a b c.-*_=+&%xx%20", Type::QueryParam, false),
            "a+b+c.-%2A_%3D%2B%26%25xx%20"
        );
        assert_eq!(
            encode("a b c.-*_=+&%xx%20", Type::QueryParamSpaceEncoded, false),
            "a%20b%20c.-%2A_%3D%2B%26%25xx%2520"
        );
    }

    #[test]
    fn matrix_param_encoding() {
        assert_eq!(
            contextual_encode("a=b c;x", Type::MatrixParam, false),
            "a%3Db%20c%3Bx"
        );
    }

    #[test]
    fn path_and_segment_encoding() {
        assert_eq!(encode("/a b c;x/y", Type::Path, false), "/a%20b%20c;x/y");
        assert_eq!(
            encode("/a b c;x/y", Type::PathSegment, false),
            "%2Fa%20b%20c%3Bx%2Fy"
        );
    }

    #[test]
    fn contextual_percent() {
        assert_eq!(contextual_encode("%", Type::Path, false), "%25");
        assert_eq!(contextual_encode("a%20", Type::Path, false), "a%20");
        assert_eq!(contextual_encode("a%zz", Type::Path, false), "a%25zz");
        assert_eq!(contextual_encode("%2", Type::Path, false), "%252");
    }

    #[test]
    fn template_spans_pass_through() {
        assert_eq!(
            contextual_encode("a b/{c d}/e f", Type::Path, true),
            "a%20b/{c d}/e%20f"
        );
        assert_eq!(encode("{foo}", Type::Path, true), "{foo}");
        assert_eq!(encode_template_names("{foo}/{bar}"), "%7Bfoo%7D/%7Bbar%7D");
    }

    #[test]
    fn non_ascii_utf8_octets() {
        assert_eq!(encode("néme", Type::QueryParam, false), "n%C3%A9me");
        assert_eq!(encode("néme=t", Type::Query, false), "n%C3%A9me=t");
    }

    #[test]
    fn validation() {
        assert!(valid("/a/b/c", Type::Path, false));
        assert!(!valid("/x y", Type::Path, false));
        assert!(valid("/{x y}", Type::Path, true));
        assert!(valid("%zz", Type::Path, false)); // '%' always passes validation
        assert!(matches!(
            validate("/x y", Type::Path, false),
            Err(Error::InvalidComponent(_, ' ', 2, Type::Path))
        ));
    }

    #[test]
    fn decoding() {
        assert_eq!(decode("a%20b", Type::Path).unwrap(), "a b");
        assert_eq!(decode("a+b", Type::QueryParam).unwrap(), "a b");
        assert_eq!(decode("a+b", Type::QueryParamSpaceEncoded).unwrap(), "a+b");
        assert_eq!(decode("a%2Bb", Type::QueryParam).unwrap(), "a+b");
        // IP literal keeps its zone-id escape
        assert_eq!(
            decode("[fec0::abcd%251]", Type::Host).unwrap(),
            "[fec0::abcd%251]"
        );
        assert_eq!(decode("n%C3%A9me", Type::QueryParam).unwrap(), "néme");
    }

    #[test]
    fn malformed_octets() {
        for s in ["%", "%1", "%z1", "%1z", "a%2"] {
            assert!(
                matches!(decode(s, Type::Path), Err(Error::MalformedOctet(..))),
                "{s:?} should fail"
            );
        }
    }

    #[test]
    fn query_splitting() {
        let q = decode_query("a=1&b=2&a=3&&=x&c", true, true).unwrap();
        assert_eq!(
            q,
            vec![
                ("a".to_string(), vec!["1".to_string(), "3".to_string()]),
                ("b".to_string(), vec!["2".to_string()]),
                ("c".to_string(), vec![String::new()]),
            ]
        );
        // names decode independently of values
        let q = decode_query("a+b=c+d", true, false).unwrap();
        assert_eq!(q, vec![("a b".to_string(), vec!["c+d".to_string()])]);
        let q = decode_query("a+b=c+d", false, true).unwrap();
        assert_eq!(q, vec![("a+b".to_string(), vec!["c d".to_string()])]);
    }

    #[test]
    fn matrix_splitting() {
        let m = decode_matrix("seg;a=x;b;a==y;;=z", false).unwrap();
        assert_eq!(
            m,
            vec![
                ("a".to_string(), vec!["x".to_string(), "=y".to_string()]),
                ("b".to_string(), vec![String::new()]),
            ]
        );
        assert!(decode_matrix("plain-segment", false).unwrap().is_empty());
    }

    #[test]
    fn path_splitting() {
        assert_eq!(decode_path("/a/b", false).unwrap(), vec!["a", "b"]);
        assert_eq!(decode_path("a/b/", false).unwrap(), vec!["a", "b"]);
        assert_eq!(decode_path("a//b", false).unwrap(), vec!["a", "", "b"]);
        assert_eq!(decode_path("a%20b", true).unwrap(), vec!["a b"]);
    }
}
