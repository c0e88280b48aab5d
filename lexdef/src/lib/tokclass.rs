use std::{error::Error, fmt, str::FromStr};

use regex::{self, Regex, RegexBuilder};

/// Modifiers attached to a token pattern, written in the conventional single-letter form
/// (`"gimsuy"`).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PatternFlags {
    /// `i`
    pub case_insensitive: bool,
    /// `m`
    pub multi_line: bool,
    /// `g`
    pub global: bool,
    /// `s`
    pub dot_matches_new_line: bool,
    /// `u`
    pub unicode: bool,
    /// `y`
    pub sticky: bool,
}

impl FromStr for PatternFlags {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = PatternFlags::default();
        for c in s.chars() {
            let f = match c {
                'i' => &mut flags.case_insensitive,
                'm' => &mut flags.multi_line,
                'g' => &mut flags.global,
                's' => &mut flags.dot_matches_new_line,
                'u' => &mut flags.unicode,
                'y' => &mut flags.sticky,
                _ => return Err(PatternError::UnknownFlag(c)),
            };
            if *f {
                return Err(PatternError::DuplicateFlag(c));
            }
            *f = true;
        }
        Ok(flags)
    }
}

impl fmt::Display for PatternFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (set, c) in [
            (self.global, 'g'),
            (self.case_insensitive, 'i'),
            (self.multi_line, 'm'),
            (self.dot_matches_new_line, 's'),
            (self.unicode, 'u'),
            (self.sticky, 'y'),
        ] {
            if set {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Errors from constructing a [TokenRegex].
#[derive(Debug)]
pub enum PatternError {
    UnknownFlag(char),
    DuplicateFlag(char),
    Regex(regex::Error),
}

impl Error for PatternError {}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PatternError::UnknownFlag(c) => write!(f, "Unknown pattern flag '{c}'"),
            PatternError::DuplicateFlag(c) => write!(f, "Pattern flag '{c}' given more than once"),
            PatternError::Regex(e) => write!(f, "Invalid regular expression: {e}"),
        }
    }
}

impl From<regex::Error> for PatternError {
    fn from(e: regex::Error) -> Self {
        PatternError::Regex(e)
    }
}

/// A token class's regular expression: its source text and flags as declared, and the
/// start-anchored form that a scanner matches with.
#[derive(Clone, Debug)]
pub struct TokenRegex {
    source: String,
    flags: PatternFlags,
    anchored: Regex,
}

impl TokenRegex {
    pub fn new(source: &str) -> Result<Self, PatternError> {
        Self::with_flags(source, "")
    }

    /// Create a pattern from `source` and the flag string `flags` (e.g. `"i"`).
    pub fn with_flags(source: &str, flags: &str) -> Result<Self, PatternError> {
        let flags = flags.parse::<PatternFlags>()?;
        // The declared form must be valid in its own right, not merely once wrapped.
        RegexBuilder::new(source)
            .case_insensitive(flags.case_insensitive)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_matches_new_line)
            .build()?;
        let anchored = add_start_of_input(source, flags)?;
        Ok(TokenRegex {
            source: source.to_owned(),
            flags,
            anchored,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> PatternFlags {
        self.flags
    }

    /// The start-anchored form of this pattern: see [add_start_of_input].
    pub fn anchored(&self) -> &Regex {
        &self.anchored
    }
}

impl PartialEq for TokenRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for TokenRegex {}

impl fmt::Display for TokenRegex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// Build a regex from `source` which can only match at the start of the text it is tested
/// against: `^(?:source)`. Case insensitivity is preserved; every other flag is dropped.
///
/// Repeated start anchors are harmless, so sources which already begin with `^` are wrapped
/// anyway.
pub fn add_start_of_input(source: &str, flags: PatternFlags) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{source})"))
        .case_insensitive(flags.case_insensitive)
        .build()
}

/// A matcher supplied as code rather than as a regular expression. Returns the length of the
/// match at the start of the input, if any.
pub type CustomMatcher = fn(&str) -> Option<usize>;

#[derive(Clone, Debug)]
pub enum Pattern {
    Regex(TokenRegex),
    /// An abstract class which is never matched directly.
    NotApplicable,
    /// A plain string. Not supported by the scanning tables.
    Literal(String),
    /// A code matcher. Not supported by the scanning tables.
    Custom(CustomMatcher),
}

impl Pattern {
    pub fn regex(&self) -> Option<&TokenRegex> {
        match self {
            Pattern::Regex(re) => Some(re),
            _ => None,
        }
    }
}

/// Where matched tokens of a class are placed.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Group {
    /// Consume matching text but discard the token.
    Skipped,
    NotApplicable,
    Named(String),
    /// A value which is not a group at all, e.g. a number or flag coming from a loosely typed
    /// front end. Kept so that it can be reported rather than silently dropped.
    Invalid(String),
}

/// A token class declaration.
#[derive(Clone, Debug)]
pub struct TokenClass {
    pub name: String,
    /// `None` if no pattern was declared at all.
    pub pattern: Option<Pattern>,
    /// `None` places tokens in the default group.
    pub group: Option<Group>,
    /// A class to prefer when it matches a strictly longer prefix at the same position.
    pub longer_alt: Option<String>,
    pub push_mode: Option<String>,
    pub pop_mode: bool,
    /// Classes this class is also a valid match for.
    pub extends: Vec<String>,
    pub lazy: bool,
    pub simple: bool,
}

impl TokenClass {
    pub fn new(name: &str, pattern: Pattern) -> Self {
        TokenClass {
            pattern: Some(pattern),
            ..Self::without_pattern(name)
        }
    }

    /// A class whose pattern is a regular expression with no flags.
    pub fn regex(name: &str, source: &str) -> Result<Self, PatternError> {
        Ok(Self::new(name, Pattern::Regex(TokenRegex::new(source)?)))
    }

    pub fn not_applicable(name: &str) -> Self {
        Self::new(name, Pattern::NotApplicable)
    }

    pub fn without_pattern(name: &str) -> Self {
        TokenClass {
            name: name.to_owned(),
            pattern: None,
            group: None,
            longer_alt: None,
            push_mode: None,
            pop_mode: false,
            extends: Vec::new(),
            lazy: false,
            simple: false,
        }
    }

    pub fn group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    pub fn skipped(self) -> Self {
        self.group(Group::Skipped)
    }

    pub fn longer_alt(mut self, name: &str) -> Self {
        self.longer_alt = Some(name.to_owned());
        self
    }

    pub fn push_mode(mut self, mode: &str) -> Self {
        self.push_mode = Some(mode.to_owned());
        self
    }

    pub fn pop_mode(mut self) -> Self {
        self.pop_mode = true;
        self
    }

    pub fn extends(mut self, name: &str) -> Self {
        self.extends.push(name.to_owned());
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn simple(mut self, simple: bool) -> Self {
        self.simple = simple;
        self
    }
}
