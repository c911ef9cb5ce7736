use crate::component;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("end of input reached in {0:?}")]
    EndOfInput(String),
    #[error("position {0} is out of bounds for {1:?}")]
    OutOfBounds(usize, String),
    #[error("no current character, the cursor over {0:?} was never advanced")]
    NotStarted(String),
    #[error("a template must not be empty")]
    EmptyTemplate,
    #[error("illegal character {0:?} at position {1} starts a name in {2:?}")]
    IllegalNameStart(char, usize, String),
    #[error("illegal character {0:?} at position {1} inside a name in {2:?}")]
    IllegalNameCharacter(char, usize, String),
    #[error("illegal character {0:?} at position {1} after a name in {2:?}")]
    IllegalCharacterAfterName(char, usize, String),
    #[error("variable {0:?} declared more than once with different regexes in {1:?}")]
    ConflictingPattern(String, String),
    #[error("invalid regex {0:?} for variable {1:?} in {2:?}: {3}")]
    InvalidVariableRegex(String, String, String, regex::Error),
    #[error("a scheme is expected before ':' at position {0} in {1:?}")]
    SchemeExpected(usize, String),
    #[error("builder holds an opaque scheme specific part, hierarchical components are frozen")]
    OpaqueSsp,
    #[error("unexpected scheme {0:?} in scheme specific part {1:?}")]
    UnexpectedScheme(String, String),
    #[error("scheme specific part {0:?} carries a fragment {1:?}")]
    FragmentInSsp(String, String),
    #[error("a host must not be empty, pass None to unset it")]
    EmptyHost,
    #[error("template variable {0:?} has no value")]
    MissingValue(String),
    #[error("no path template for member {0:?}")]
    MissingMemberTemplate(String),
    #[error("malformed percent-encoded octet at index {0} in {1:?}")]
    MalformedOctet(usize, String),
    #[error("invalid character {1:?} at index {2} of {0:?} for the {3:?} component")]
    InvalidComponent(String, char, usize, component::Type),
    #[error("no match: {0:?} vs {1:?}")]
    NoMatch(String, String),
    #[error("regex parse: {0:?}")]
    RegexParse(#[from] regex::Error),
    #[error("uri creation: {0}")]
    UriCreate(#[from] iri_string::types::CreationError<String>),
    #[error("capture deserialization: {0}")]
    Deserialization(#[from] crate::template::CaptureDeserializationError),
}
