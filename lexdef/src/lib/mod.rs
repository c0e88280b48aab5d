//! `lexdef` analyses lexer definitions ahead of any scanning. Given a set of token class
//! declarations (optionally split into several modes), it:
//!
//!   * validates them, reporting *every* problem found rather than stopping at the first
//!     ([validate_patterns], [perform_runtime_checks], [check_lazy_mode], [check_simple_mode]);
//!   * turns them into the tables a scanner needs: start-anchored patterns and parallel
//!     per-pattern metadata ([analyse_token_classes], [StreamingAnalyser]).
//!
//! Every pattern is anchored to the start of the text it is tested against, so a scanner always
//! tests the remaining input at its current offset. [LexerDefBuilder] runs the whole pipeline
//! over a [LexerDefinition].

#![allow(clippy::new_without_default)]

use std::{error::Error, fmt};

mod analyse;
mod builder;
mod modes;
mod tokclass;
mod validate;

pub use crate::{
    analyse::{
        CachedClass, DEFAULT_GROUP, PositionalAnalysis, StreamingAnalyser, StreamingAnalysis,
        analyse_token_classes, can_match_line_terminator, count_line_terminators,
    },
    builder::{LexerDefBuilder, LexerDefinition, LexerTables},
    modes::{DEFAULT_MODE, MODES, MultiModeLexerDef, perform_runtime_checks},
    tokclass::{
        CustomMatcher, Group, Pattern, PatternError, PatternFlags, TokenClass, TokenRegex,
        add_start_of_input,
    },
    validate::{
        Filtered, ModeCheck, ValidationCtx, check_lazy_mode, check_simple_mode,
        find_duplicate_patterns, find_end_of_input_anchor, find_invalid_group_type,
        find_invalid_patterns, find_missing_patterns, find_modes_that_do_not_exist,
        find_unsupported_flags, validate_patterns,
    },
};

pub type LexDefResult<T> = Result<T, Vec<LexerDefinitionError>>;

/// A problem found in a lexer definition. Errors are accumulated and returned, never raised: it
/// is up to the caller to decide whether they are fatal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LexerDefinitionError {
    pub kind: LexerDefinitionErrorKind,
    pub message: String,
    /// The names of the offending token classes (empty for errors about the definition as a
    /// whole).
    pub token_classes: Vec<String>,
}

impl LexerDefinitionError {
    pub(crate) fn new(kind: LexerDefinitionErrorKind, message: String) -> Self {
        LexerDefinitionError {
            kind,
            message,
            token_classes: Vec::new(),
        }
    }

    pub(crate) fn for_classes<'a, I>(
        kind: LexerDefinitionErrorKind,
        message: String,
        classes: I,
    ) -> Self
    where
        I: IntoIterator<Item = &'a TokenClass>,
    {
        LexerDefinitionError {
            kind,
            message,
            token_classes: classes.into_iter().map(|c| c.name.clone()).collect(),
        }
    }
}

impl Error for LexerDefinitionError {}

impl fmt::Display for LexerDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// The various different possible lexer definition errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LexerDefinitionErrorKind {
    MissingPattern,
    InvalidPatternType,
    EndOfInputAnchorFound,
    UnsupportedFlagsFound,
    DuplicatePatternsFound,
    InvalidGroupTypeFound,
    PushModeDoesNotExist,
    MultiModeLexerWithoutDefaultMode,
    MultiModeLexerWithoutModesProperty,
    MultiModeLexerDefaultModeValueDoesNotExist,
    LexerDefinitionCannotContainUndefined,
    LexerDefinitionCannotMixLazyAndNotLazy,
    LexerDefinitionCannotMixSimpleAndNotSimple,
}

impl fmt::Display for LexerDefinitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LexerDefinitionErrorKind::MissingPattern => "Missing pattern",
            LexerDefinitionErrorKind::InvalidPatternType => "Pattern is not a regular expression",
            LexerDefinitionErrorKind::EndOfInputAnchorFound => "End of input anchor found",
            LexerDefinitionErrorKind::UnsupportedFlagsFound => "Unsupported pattern flags",
            LexerDefinitionErrorKind::DuplicatePatternsFound => "Duplicate patterns",
            LexerDefinitionErrorKind::InvalidGroupTypeFound => "Invalid group",
            LexerDefinitionErrorKind::PushModeDoesNotExist => "Push mode does not exist",
            LexerDefinitionErrorKind::MultiModeLexerWithoutDefaultMode => "No default mode",
            LexerDefinitionErrorKind::MultiModeLexerWithoutModesProperty => "No modes",
            LexerDefinitionErrorKind::MultiModeLexerDefaultModeValueDoesNotExist => {
                "Default mode does not exist"
            }
            LexerDefinitionErrorKind::LexerDefinitionCannotContainUndefined => {
                "Undefined token class"
            }
            LexerDefinitionErrorKind::LexerDefinitionCannotMixLazyAndNotLazy => {
                "Mix of lazy and non-lazy token classes"
            }
            LexerDefinitionErrorKind::LexerDefinitionCannotMixSimpleAndNotSimple => {
                "Mix of simple and non-simple token classes"
            }
        };
        write!(f, "{s}")
    }
}
