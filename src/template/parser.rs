use regex::Regex;

use crate::cursor::Cursor;
use crate::error::Error;

/// Pattern a path variable matches when it declares no regex of its own.
pub const DEFAULT_VALUE_PATTERN: &str = "[^/]+";

// Literal characters that would change meaning inside the compiled regex.
// '<' and '>' match literally unescaped, while their escaped forms are
// word boundaries to the regex crate, so they are not in this set.
const RESERVED_REGEX_CHARACTERS: &str = ".^&!?-:([$=)],*+|";

/// Breaks a URI template into a matching regex, a normalized form and the
/// bookkeeping needed to map variables onto capture groups.
///
/// A variable is either a path parameter `{name}` (optionally `{name:regex}`),
/// a query expansion `{?a,b}` or a matrix expansion `{;a,b}`. Query and matrix
/// expansions compile to an order-insensitive, repeatable group per name.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    template: String,
    normalized: String,
    pattern: String,
    names: Vec<String>,
    group_counts: Vec<usize>,
    name_patterns: Vec<(String, String)>,
    explicit_regexes: usize,
    literal_chars: usize,
    skip_group: usize,
}

impl TemplateParser {
    pub fn new(template: &str) -> Result<TemplateParser, Error> {
        if template.is_empty() {
            return Err(Error::EmptyTemplate);
        }
        let mut parser = TemplateParser {
            template: template.to_string(),
            normalized: String::new(),
            pattern: String::new(),
            names: Vec::new(),
            group_counts: Vec::new(),
            name_patterns: Vec::new(),
            explicit_regexes: 0,
            literal_chars: 0,
            skip_group: 0,
        };
        parser.parse(template)?;
        Ok(parser)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The regex text the template compiles to, unanchored.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The template with every explicit regex stripped, so two templates
    /// that differ only in their regexes normalize to the same text.
    pub fn normalized_template(&self) -> &str {
        &self.normalized
    }

    /// Variable names in declaration order. Query and matrix expansions
    /// contribute one entry per sub-name.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn group_counts(&self) -> &[usize] {
        &self.group_counts
    }

    /// Path variable names paired with their pattern text.
    pub fn name_patterns(&self) -> &[(String, String)] {
        &self.name_patterns
    }

    /// For each variable, the index of its top-level capture group in the
    /// compiled pattern. Nested groups inside an explicit regex are skipped
    /// over, which is what the group counts account for.
    pub fn group_indexes(&self) -> Vec<usize> {
        let mut indexes = Vec::with_capacity(self.group_counts.len());
        for (i, count) in self.group_counts.iter().enumerate() {
            let prev = if i == 0 { 0 } else { indexes[i - 1] };
            indexes.push(prev + count);
        }
        indexes
    }

    pub fn number_of_explicit_regexes(&self) -> usize {
        self.explicit_regexes
    }

    pub fn number_of_literal_characters(&self) -> usize {
        self.literal_chars
    }

    pub fn number_of_regex_groups(&self) -> usize {
        match self.group_indexes().last() {
            Some(last) => last + self.skip_group,
            None => 0,
        }
    }

    // template = *( literal-characters / "{" variable "}" )
    fn parse(&mut self, template: &str) -> Result<(), Error> {
        let mut ci = Cursor::new(template);
        let mut literals = String::new();
        while ci.has_next() {
            let c = ci.next()?;
            if c == '{' {
                self.process_literals(&mut literals);
                self.parse_name(&mut ci)?;
            } else {
                literals.push(c);
            }
        }
        self.process_literals(&mut literals);
        Ok(())
    }

    fn process_literals(&mut self, literals: &mut String) {
        if literals.is_empty() {
            return;
        }
        self.literal_chars += literals.chars().count();
        self.normalized.push_str(literals);

        let chars: Vec<char> = literals.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if RESERVED_REGEX_CHARACTERS.contains(c) {
                self.pattern.push('\\');
                self.pattern.push(c);
            } else if c == '%' {
                // a percent triplet matches either case of its hex digits
                match (chars.get(i + 1), chars.get(i + 2)) {
                    (Some(&c1), Some(&c2))
                        if c1.is_ascii_hexdigit() && c2.is_ascii_hexdigit() =>
                    {
                        self.pattern.push('%');
                        push_hex_class(&mut self.pattern, c1);
                        push_hex_class(&mut self.pattern, c2);
                        i += 2;
                    }
                    _ => self.pattern.push('%'),
                }
            } else {
                self.pattern.push(c);
            }
            i += 1;
        }
        literals.clear();
    }

    // variable = [ "?" / ";" ] name [ ":" regex ]
    // name     = (ALPHA / DIGIT / "_") *( ALPHA / DIGIT / "_" / "-" / "." )
    fn parse_name(&mut self, ci: &mut Cursor<'_>) -> Result<(), Error> {
        let mut c = consume_whitespace(ci)?;

        let mut param_type = 'p';
        if c == '?' || c == ';' {
            param_type = c;
            c = ci.next()?;
        }

        let mut name = String::new();
        if c.is_alphanumeric() || c == '_' {
            name.push(c);
        } else {
            return Err(Error::IllegalNameStart(c, position(ci), self.template.clone()));
        }

        let mut name_regex = String::new();
        loop {
            c = ci.next()?;
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                name.push(c);
            } else if c == ',' && param_type != 'p' {
                // sub-name separator, only for query and matrix expansions
                name.push(c);
            } else if c == ':' && param_type == 'p' {
                name_regex = parse_regex(ci)?;
                break;
            } else if c == '}' {
                break;
            } else if c == ' ' {
                c = consume_whitespace(ci)?;
                if c == ':' {
                    name_regex = parse_regex(ci)?;
                    break;
                } else if c == '}' {
                    break;
                } else {
                    return Err(Error::IllegalCharacterAfterName(
                        c,
                        position(ci),
                        self.template.clone(),
                    ));
                }
            } else {
                return Err(Error::IllegalNameCharacter(c, position(ci), self.template.clone()));
            }
        }

        let pattern_text;
        if param_type == '?' || param_type == ';' {
            let mut sub_names: Vec<String> = name.split(',').map(str::to_string).collect();
            while sub_names.last().is_some_and(|s| s.is_empty()) {
                sub_names.pop();
            }
            let separator = if param_type == '?' { "\\&" } else { ";/\\?" };

            // one repeatable group, so the parameters may come in any order
            let mut builder = String::from(if param_type == '?' { "\\?" } else { ";" });
            builder.push('(');
            let mut first = true;
            for sub_name in sub_names {
                builder.push_str("(&?");
                builder.push_str(&sub_name);
                builder.push_str("(=([^");
                builder.push_str(separator);
                builder.push_str("]*))?");
                builder.push(')');
                if !first {
                    builder.push('|');
                }
                self.names.push(sub_name);
                self.group_counts.push(if first { 5 } else { 3 });
                first = false;
            }
            builder.push_str(")*");
            self.skip_group = 1;
            pattern_text = builder;
            name = format!("{param_type}{name}");
        } else {
            if !name_regex.is_empty() {
                self.explicit_regexes += 1;
            }
            pattern_text = if name_regex.is_empty() {
                DEFAULT_VALUE_PATTERN.to_string()
            } else {
                name_regex.clone()
            };
            let nested = match Regex::new(&pattern_text) {
                Ok(re) => re.captures_len() - 1,
                Err(err) => {
                    return Err(Error::InvalidVariableRegex(
                        name_regex,
                        name,
                        self.template.clone(),
                        err,
                    ))
                }
            };
            match self.name_patterns.iter().find(|(n, _)| *n == name) {
                Some((_, existing)) if *existing != pattern_text => {
                    return Err(Error::ConflictingPattern(name, self.template.clone()));
                }
                Some(_) => {}
                None => self.name_patterns.push((name.clone(), pattern_text.clone())),
            }
            self.names.push(name.clone());
            // the group count carries over the nested groups of the
            // previous variable's pattern
            self.group_counts.push(1 + self.skip_group);
            self.skip_group = nested;
        }

        self.pattern.push('(');
        self.pattern.push_str(&pattern_text);
        self.pattern.push(')');

        self.normalized.push('{');
        self.normalized.push_str(&name);
        self.normalized.push('}');
        Ok(())
    }
}

// regex = *( balanced-braces / any ) up to the "}" closing the variable
fn parse_regex(ci: &mut Cursor<'_>) -> Result<String, Error> {
    let mut buffer = String::new();
    let mut brace_count = 1;
    loop {
        let c = ci.next()?;
        if c == '{' {
            brace_count += 1;
        } else if c == '}' {
            brace_count -= 1;
            if brace_count == 0 {
                break;
            }
        }
        buffer.push(c);
    }
    Ok(buffer.trim().to_string())
}

fn consume_whitespace(ci: &mut Cursor<'_>) -> Result<char, Error> {
    loop {
        let c = ci.next()?;
        if !c.is_whitespace() {
            return Ok(c);
        }
    }
}

fn position(ci: &Cursor<'_>) -> usize {
    ci.pos().unwrap_or(0)
}

fn push_hex_class(out: &mut String, c: char) {
    if c.is_ascii_digit() {
        out.push(c);
    } else {
        out.push('[');
        out.push(c.to_ascii_lowercase());
        out.push(c.to_ascii_uppercase());
        out.push(']');
    }
}
