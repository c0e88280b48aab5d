use indexmap::IndexMap;
use log::debug;

use crate::{
    LexDefResult, LexerDefinitionError, LexerDefinitionErrorKind,
    analyse::{PositionalAnalysis, analyse_token_classes},
    modes::{MultiModeLexerDef, perform_runtime_checks},
    tokclass::TokenClass,
    validate::{check_lazy_mode, check_simple_mode, validate_patterns},
};

/// A lexer definition: either a plain list of token classes, or several modes.
#[derive(Clone, Debug)]
pub enum LexerDefinition {
    /// Equivalent to a multi-mode definition with one mode called [crate::DEFAULT_MODE].
    Single(Vec<TokenClass>),
    MultiMode(MultiModeLexerDef),
}

/// The scanning tables for every mode of a lexer definition.
#[derive(Debug)]
pub struct LexerTables {
    pub default_mode: String,
    pub modes: IndexMap<String, PositionalAnalysis>,
    /// Errors found in the definition. Always empty unless
    /// [LexerDefBuilder::defer_definition_errors] was set.
    pub errors: Vec<LexerDefinitionError>,
}

impl LexerTables {
    pub fn mode(&self, name: &str) -> Option<&PositionalAnalysis> {
        self.modes.get(name)
    }

    /// The tables for the mode scanning starts in.
    pub fn default_tables(&self) -> Option<&PositionalAnalysis> {
        self.mode(&self.default_mode)
    }
}

/// A `LexerDefBuilder` checks a [LexerDefinition] and, if it is usable, builds the tables for each
/// of its modes.
#[derive(Clone, Debug)]
pub struct LexerDefBuilder {
    defer_definition_errors: bool,
    ensure_homogeneous: bool,
}

impl LexerDefBuilder {
    /// Create a new `LexerDefBuilder`. By default any error in the definition causes [Self::build]
    /// to fail, and classes must agree on whether they are lazy and whether they are simple.
    pub fn new() -> Self {
        LexerDefBuilder {
            defer_definition_errors: false,
            ensure_homogeneous: true,
        }
    }

    /// If set to true, [Self::build] returns tables even when the definition contains errors,
    /// placing the errors in [LexerTables::errors]. Classes which cannot be analysed are left out
    /// of the tables. A definition whose default mode cannot be determined is always an error.
    /// Defaults to `false`.
    pub fn defer_definition_errors(mut self, defer: bool) -> Self {
        self.defer_definition_errors = defer;
        self
    }

    /// If set to true, reject definitions which mix lazy and non-lazy (or simple and non-simple)
    /// token classes. Defaults to `true`.
    pub fn ensure_homogeneous(mut self, ensure: bool) -> Self {
        self.ensure_homogeneous = ensure;
        self
    }

    pub fn build(&self, def: &LexerDefinition) -> LexDefResult<LexerTables> {
        let single;
        let def = match def {
            LexerDefinition::Single(classes) => {
                single = MultiModeLexerDef::single(classes.clone());
                &single
            }
            LexerDefinition::MultiMode(mm) => mm,
        };

        let mut errs = perform_runtime_checks(def);
        if errs.iter().any(is_structural) {
            return Err(errs);
        }
        let (Some(default_mode), Some(modes)) = (&def.default_mode, &def.modes) else {
            return Err(errs);
        };

        if self.ensure_homogeneous {
            errs.extend(check_lazy_mode(def.all_token_classes()).errors);
            errs.extend(check_simple_mode(def.all_token_classes()).errors);
        }

        let mode_names = def.mode_names();
        let mut tables = IndexMap::with_capacity(modes.len());
        for (name, entries) in modes {
            let classes = entries.iter().flatten().cloned().collect::<Vec<_>>();
            let mode_errs = validate_patterns(&classes, &mode_names);
            debug!(
                "Mode '{}': {} token classes, {} errors",
                name,
                classes.len(),
                mode_errs.len()
            );
            errs.extend(mode_errs);
            tables.insert(name.clone(), analyse_token_classes(&classes));
        }

        if !errs.is_empty() && !self.defer_definition_errors {
            return Err(errs);
        }
        Ok(LexerTables {
            default_mode: default_mode.clone(),
            modes: tables,
            errors: errs,
        })
    }
}

/// Is `e` one of the errors which stop [LexerDefBuilder::build] regardless of
/// [LexerDefBuilder::defer_definition_errors]?
fn is_structural(e: &LexerDefinitionError) -> bool {
    matches!(
        e.kind,
        LexerDefinitionErrorKind::MultiModeLexerWithoutDefaultMode
            | LexerDefinitionErrorKind::MultiModeLexerWithoutModesProperty
            | LexerDefinitionErrorKind::MultiModeLexerDefaultModeValueDoesNotExist
    )
}

#[cfg(test)]
mod test {
    use super::{LexerDefBuilder, LexerDefinition, is_structural};
    use crate::{
        LexerDefinitionErrorKind,
        modes::{DEFAULT_MODE, MultiModeLexerDef},
        tokclass::TokenClass,
    };

    fn class(name: &str, src: &str) -> TokenClass {
        TokenClass::regex(name, src).unwrap()
    }

    #[test]
    fn test_single() {
        let def = LexerDefinition::Single(vec![class("A", "a"), class("Ws", " +").skipped()]);
        let tables = LexerDefBuilder::new().build(&def).unwrap();
        assert_eq!(tables.default_mode, DEFAULT_MODE);
        assert!(tables.errors.is_empty());
        let dt = tables.default_tables().unwrap();
        assert_eq!(dt.pattern_idx_to_class, vec!["A", "Ws"]);
        assert_eq!(dt.pattern_idx_to_group[1], None);
    }

    #[test]
    fn test_errors_fail_by_default() {
        let def = LexerDefinition::Single(vec![class("A", "a"), class("B", "a")]);
        let errs = LexerDefBuilder::new().build(&def).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, LexerDefinitionErrorKind::DuplicatePatternsFound);
    }

    #[test]
    fn test_deferred_errors() {
        let def = LexerDefinition::Single(vec![
            class("A", "a"),
            TokenClass::without_pattern("B"),
            class("C", "c").push_mode("nowhere"),
        ]);
        let tables = LexerDefBuilder::new()
            .defer_definition_errors(true)
            .build(&def)
            .unwrap();
        assert_eq!(
            tables.errors.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![
                LexerDefinitionErrorKind::MissingPattern,
                LexerDefinitionErrorKind::PushModeDoesNotExist
            ]
        );
        assert_eq!(tables.default_tables().unwrap().pattern_idx_to_class, vec!["A", "C"]);
    }

    #[test]
    fn test_structural_errors_cannot_be_deferred() {
        let def = LexerDefinition::MultiMode(MultiModeLexerDef::new("x").mode("y", vec![]));
        let errs = LexerDefBuilder::new()
            .defer_definition_errors(true)
            .build(&def)
            .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(is_structural(&errs[0]));
    }

    #[test]
    fn test_undefined_entries_can_be_deferred() {
        let def = LexerDefinition::MultiMode(
            MultiModeLexerDef::new("m").mode_entries("m", vec![None, Some(class("A", "a"))]),
        );
        assert!(LexerDefBuilder::new().build(&def).is_err());
        let tables = LexerDefBuilder::new()
            .defer_definition_errors(true)
            .build(&def)
            .unwrap();
        assert_eq!(tables.errors.len(), 1);
        assert!(!is_structural(&tables.errors[0]));
        assert_eq!(tables.mode("m").unwrap().patterns_len(), 1);
    }

    #[test]
    fn test_homogeneity() {
        let def = LexerDefinition::Single(vec![class("A", "a").lazy(true), class("B", "b")]);
        let errs = LexerDefBuilder::new().build(&def).unwrap_err();
        assert_eq!(
            errs[0].kind,
            LexerDefinitionErrorKind::LexerDefinitionCannotMixLazyAndNotLazy
        );
        assert!(
            LexerDefBuilder::new()
                .ensure_homogeneous(false)
                .build(&def)
                .is_ok()
        );
    }
}
