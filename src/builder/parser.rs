//! Splits a URI reference into its raw components without decoding or
//! validating anything. Template variables are allowed anywhere; a brace
//! or bracket span shields the delimiters inside it, so `{id:a/b}` stays
//! in one piece and an IPv6 literal keeps its colons.

use crate::cursor::Cursor;
use crate::error::Error;

/// Raw components of a URI reference, exactly as they appear in the input.
///
/// Absent components are `None`; components that are present but empty come
/// back as `Some("")`, the same distinction the builder relies on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    scheme: Option<String>,
    user_info: Option<String>,
    host: Option<String>,
    port: Option<String>,
    authority: Option<String>,
    path: Option<String>,
    query: Option<String>,
    fragment: Option<String>,
    ssp: Option<String>,
    opaque: bool,
}

impl ParsedUri {
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn user_info(&self) -> Option<&str> {
        self.user_info.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The port as written, which may be a template variable rather than a
    /// number.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Everything after the scheme delimiter, as scanned. Only meaningful
    /// for opaque references.
    pub fn scheme_specific_part(&self) -> Option<&str> {
        self.ssp.as_deref()
    }

    /// True when the reference has a scheme but no hierarchical structure,
    /// like `mailto:a@b`.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }
}

/// Splits `input` into [`ParsedUri`] components.
pub fn parse(input: &str) -> Result<ParsedUri, Error> {
    if input.is_empty() {
        return Ok(ParsedUri {
            path: Some(String::new()),
            ssp: Some(String::new()),
            ..ParsedUri::default()
        });
    }
    let mut scanner = Scanner {
        ci: Cursor::new(input),
        uri: ParsedUri::default(),
    };
    scanner.parse()?;
    Ok(scanner.uri)
}

struct Scanner<'a> {
    ci: Cursor<'a>,
    uri: ParsedUri,
}

impl Scanner<'_> {
    // uri-reference = [ scheme ":" ] ( hier-part / opaque-part )
    fn parse(&mut self) -> Result<(), Error> {
        self.ci.next()?;
        let (comp, _) = self.component(Some(":/?#"), false)?;

        if self.ci.has_next() {
            if let Some(p) = self.ci.pos() {
                self.uri.ssp = Some(self.ci.input()[p + 1..].to_string());
            }
        }

        if self.ci.current()? == ':' {
            let Some(scheme) = comp else {
                return Err(Error::SchemeExpected(
                    self.ci.pos().unwrap_or(0),
                    self.ci.input().to_string(),
                ));
            };
            self.uri.scheme = Some(scheme);
            if !self.ci.has_next() {
                // a bare "scheme:" has an empty rest
                self.uri.path = Some(String::new());
                self.uri.ssp = Some(String::new());
                return Ok(());
            }
            if self.ci.next()? == '/' {
                self.parse_hierarchical()?;
            } else {
                self.uri.opaque = true;
            }
        } else {
            self.ci.set_pos(0)?;
            if self.ci.current()? == '/' {
                self.parse_hierarchical()?;
            } else {
                self.parse_path()?;
            }
        }
        Ok(())
    }

    // hier-part = [ "//" authority ] path [ "?" query ] [ "#" fragment ]
    fn parse_hierarchical(&mut self) -> Result<(), Error> {
        if self.ci.has_next() && self.ci.peek()? == '/' {
            self.ci.next()?;
            self.ci.next()?;
            self.parse_authority()?;
        }
        if !self.ci.has_next() {
            if self.ci.current()? == '/' {
                self.uri.path = Some("/".to_string());
            }
            return Ok(());
        }
        self.parse_path()
    }

    // authority = [ userinfo "@" ] host [ ":" port ]
    fn parse_authority(&mut self) -> Result<(), Error> {
        let start = self.ci.pos().unwrap_or(0);
        let (comp, _) = self.component(Some("@/?#"), true)?;
        let (host, mut end) = if self.ci.current()? == '@' {
            self.uri.user_info = comp;
            if !self.ci.has_next() {
                return Ok(());
            }
            self.ci.next()?;
            self.component(Some(":/?#"), true)?
        } else {
            // no userinfo after all, rescan with ':' as a delimiter
            self.ci.set_pos(start)?;
            self.component(Some("@:/?#"), true)?
        };
        self.uri.host = host;

        if self.ci.current()? == ':' {
            if !self.ci.has_next() {
                return Ok(());
            }
            self.ci.next()?;
            let (port, port_end) = self.component(Some("/?#"), false)?;
            self.uri.port = port;
            end = port_end;
        }

        if end > start {
            self.uri.authority = Some(self.ci.input()[start..end].to_string());
        }
        Ok(())
    }

    fn parse_path(&mut self) -> Result<(), Error> {
        let (path, _) = self.component(Some("?#"), false)?;
        self.uri.path = path;

        if self.ci.current()? == '?' {
            if !self.ci.has_next() {
                return Ok(());
            }
            self.ci.next()?;
            let (query, _) = self.component(Some("#"), false)?;
            self.uri.query = query;
        }

        if self.ci.current()? == '#' {
            if !self.ci.has_next() {
                return Ok(());
            }
            self.ci.next()?;
            let (fragment, _) = self.component(None, false)?;
            self.uri.fragment = fragment;
        }
        Ok(())
    }

    /// Scans one component starting at the current character, stopping on a
    /// delimiter at brace depth zero. Square brackets only count when
    /// `is_ip` is set. Returns the component (`None` when empty) and the
    /// byte offset just past it; the cursor is left on the delimiter, or on
    /// the last character when the input runs out.
    fn component(
        &mut self,
        delimiters: Option<&str>,
        is_ip: bool,
    ) -> Result<(Option<String>, usize), Error> {
        let mut curly = 0;
        let mut square = 0;
        let mut sb = String::new();
        let mut c = self.ci.current()?;
        loop {
            if c == '{' {
                curly += 1;
            } else if c == '}' {
                curly -= 1;
            } else if is_ip && c == '[' {
                square += 1;
            } else if is_ip && c == ']' {
                square -= 1;
            } else if curly == 0 && square == 0 && delimiters.is_some_and(|d| d.contains(c)) {
                let end = self.ci.pos().unwrap_or(0);
                return Ok(((!sb.is_empty()).then_some(sb), end));
            }
            sb.push(c);
            if !self.ci.has_next() {
                let end = self.ci.pos().unwrap_or(0) + c.len_utf8();
                return Ok((Some(sb), end));
            }
            c = self.ci.next()?;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_full_uri() {
        let parsed = parse("http://user:pw@example.com:8080/a/b?x=1#frag").unwrap();
        assert_eq!(parsed.scheme(), Some("http"));
        assert_eq!(parsed.user_info(), Some("user:pw"));
        assert_eq!(parsed.host(), Some("example.com"));
        assert_eq!(parsed.port(), Some("8080"));
        assert_eq!(parsed.authority(), Some("user:pw@example.com:8080"));
        assert_eq!(parsed.path(), Some("/a/b"));
        assert_eq!(parsed.query(), Some("x=1"));
        assert_eq!(parsed.fragment(), Some("frag"));
        assert!(!parsed.is_opaque());
        assert_eq!(
            parsed.scheme_specific_part(),
            Some("//user:pw@example.com:8080/a/b?x=1#frag")
        );
    }

    #[test]
    fn test_authority_runs_to_the_end_of_input() {
        let parsed = parse("http://example.com").unwrap();
        assert_eq!(parsed.host(), Some("example.com"));
        assert_eq!(parsed.authority(), Some("example.com"));
        assert_eq!(parsed.path(), None);
    }

    #[test]
    fn test_ipv6_host_keeps_its_colons() {
        let parsed = parse("http://[::1]:8080/x").unwrap();
        assert_eq!(parsed.host(), Some("[::1]"));
        assert_eq!(parsed.port(), Some("8080"));
        assert_eq!(parsed.authority(), Some("[::1]:8080"));
        assert_eq!(parsed.path(), Some("/x"));
    }

    #[test]
    fn test_braces_shield_delimiters() {
        let parsed = parse("foo/{bar:a/b}/baz").unwrap();
        assert_eq!(parsed.scheme(), None);
        assert_eq!(parsed.path(), Some("foo/{bar:a/b}/baz"));
        assert_eq!(parsed.query(), None);
    }

    #[test]
    fn test_template_colon_is_not_a_scheme() {
        let parsed = parse("x{a:b}/y").unwrap();
        assert_eq!(parsed.scheme(), None);
        assert_eq!(parsed.path(), Some("x{a:b}/y"));
    }

    #[test]
    fn test_template_port() {
        let parsed = parse("http://host:{p}/x").unwrap();
        assert_eq!(parsed.host(), Some("host"));
        assert_eq!(parsed.port(), Some("{p}"));
        assert_eq!(parsed.authority(), Some("host:{p}"));
    }

    #[test]
    fn test_opaque() {
        let parsed = parse("mailto:dev-list@example.com").unwrap();
        assert_eq!(parsed.scheme(), Some("mailto"));
        assert!(parsed.is_opaque());
        assert_eq!(parsed.scheme_specific_part(), Some("dev-list@example.com"));
        assert_eq!(parsed.path(), None);
        assert_eq!(parsed.authority(), None);
    }

    #[test]
    fn test_scheme_only() {
        let parsed = parse("http:").unwrap();
        assert_eq!(parsed.scheme(), Some("http"));
        assert_eq!(parsed.path(), Some(""));
        assert_eq!(parsed.scheme_specific_part(), Some(""));
        assert!(!parsed.is_opaque());
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse("").unwrap();
        assert_eq!(parsed.scheme(), None);
        assert_eq!(parsed.path(), Some(""));
        assert_eq!(parsed.scheme_specific_part(), Some(""));
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(parse("a/b").unwrap().path(), Some("a/b"));
        assert_eq!(parse("/a/b").unwrap().path(), Some("/a/b"));
        assert_eq!(parse("/").unwrap().path(), Some("/"));
    }

    #[test]
    fn test_network_reference() {
        let parsed = parse("//host/x").unwrap();
        assert_eq!(parsed.scheme(), None);
        assert_eq!(parsed.authority(), Some("host"));
        assert_eq!(parsed.host(), Some("host"));
        assert_eq!(parsed.path(), Some("/x"));
    }

    #[test]
    fn test_query_and_fragment_without_path() {
        let parsed = parse("?q=1#f").unwrap();
        assert_eq!(parsed.path(), None);
        assert_eq!(parsed.query(), Some("q=1"));
        assert_eq!(parsed.fragment(), Some("f"));
    }

    #[test]
    fn test_authority_cut_short() {
        let parsed = parse("//user@").unwrap();
        assert_eq!(parsed.user_info(), Some("user"));
        assert_eq!(parsed.host(), None);
        assert_eq!(parsed.authority(), None);

        let parsed = parse("//host:").unwrap();
        assert_eq!(parsed.host(), Some("host"));
        assert_eq!(parsed.port(), None);
        assert_eq!(parsed.authority(), None);
    }

    #[test]
    fn test_bare_trailing_delimiters() {
        let parsed = parse("a?").unwrap();
        assert_eq!(parsed.path(), Some("a"));
        assert_eq!(parsed.query(), None);

        let parsed = parse("a#").unwrap();
        assert_eq!(parsed.path(), Some("a"));
        assert_eq!(parsed.fragment(), None);
    }

    #[test]
    fn test_missing_scheme_is_an_error() {
        assert!(matches!(
            parse(":x"),
            Err(Error::SchemeExpected(0, _))
        ));
    }
}
