use indexmap::IndexMap;

use crate::{LexerDefinitionError, LexerDefinitionErrorKind, tokclass::TokenClass};

/// The name of the mode a single-mode definition is placed in.
pub const DEFAULT_MODE: &str = "defaultMode";
pub const MODES: &str = "modes";

/// A lexer definition split into named modes. Scanning starts in `default_mode`; token classes
/// move between modes with push and pop actions.
///
/// Both fields are optional, and mode entries may be missing, so that definitions assembled
/// from loosely typed sources can be checked with [perform_runtime_checks] rather than rejected
/// on construction.
#[derive(Clone, Debug, Default)]
pub struct MultiModeLexerDef {
    pub default_mode: Option<String>,
    pub modes: Option<IndexMap<String, Vec<Option<TokenClass>>>>,
}

impl MultiModeLexerDef {
    /// A definition starting in `default_mode` with no modes yet.
    pub fn new(default_mode: &str) -> Self {
        MultiModeLexerDef {
            default_mode: Some(default_mode.to_owned()),
            modes: None,
        }
    }

    /// A definition with a single mode named [DEFAULT_MODE].
    pub fn single(classes: Vec<TokenClass>) -> Self {
        Self::new(DEFAULT_MODE).mode(DEFAULT_MODE, classes)
    }

    /// Add (or replace) the mode `name`.
    pub fn mode(self, name: &str, classes: Vec<TokenClass>) -> Self {
        self.mode_entries(name, classes.into_iter().map(Some).collect())
    }

    /// As [Self::mode], but entries may be missing.
    pub fn mode_entries(mut self, name: &str, entries: Vec<Option<TokenClass>>) -> Self {
        self.modes
            .get_or_insert_with(IndexMap::new)
            .insert(name.to_owned(), entries);
        self
    }

    pub fn mode_names(&self) -> Vec<&str> {
        self.modes
            .iter()
            .flat_map(|m| m.keys())
            .map(String::as_str)
            .collect()
    }

    /// Every token class of every mode, in declaration order. Classes used in more than one mode
    /// are returned once per use.
    pub fn all_token_classes(&self) -> impl Iterator<Item = &TokenClass> {
        self.modes
            .iter()
            .flat_map(|m| m.values())
            .flat_map(|cs| cs.iter().flatten())
    }
}

/// Check the structure of `def`: it must have a default mode and modes, the default mode must be
/// one of the modes, and no mode may have a missing entry.
pub fn perform_runtime_checks(def: &MultiModeLexerDef) -> Vec<LexerDefinitionError> {
    let mut errs = Vec::new();
    if def.default_mode.is_none() {
        errs.push(LexerDefinitionError::new(
            LexerDefinitionErrorKind::MultiModeLexerWithoutDefaultMode,
            format!("A multi-mode lexer must have a '{DEFAULT_MODE}'"),
        ));
    }
    match &def.modes {
        None => errs.push(LexerDefinitionError::new(
            LexerDefinitionErrorKind::MultiModeLexerWithoutModesProperty,
            format!("A multi-mode lexer must have '{MODES}'"),
        )),
        Some(modes) => {
            if let Some(dm) = &def.default_mode {
                if !modes.contains_key(dm) {
                    errs.push(LexerDefinitionError::new(
                        LexerDefinitionErrorKind::MultiModeLexerDefaultModeValueDoesNotExist,
                        format!("The {DEFAULT_MODE} '{dm}' is not one of the lexer's modes"),
                    ));
                }
            }
            for (name, entries) in modes {
                for (i, _) in entries.iter().enumerate().filter(|(_, e)| e.is_none()) {
                    errs.push(LexerDefinitionError::new(
                        LexerDefinitionErrorKind::LexerDefinitionCannotContainUndefined,
                        format!("Mode '{name}' has an undefined token class at index {i}"),
                    ));
                }
            }
        }
    }
    errs
}

#[cfg(test)]
mod test {
    use super::{DEFAULT_MODE, MultiModeLexerDef, perform_runtime_checks};
    use crate::{LexerDefinitionErrorKind, tokclass::TokenClass};

    fn class(name: &str) -> TokenClass {
        TokenClass::regex(name, &name.to_lowercase()).unwrap()
    }

    fn kinds(def: &MultiModeLexerDef) -> Vec<LexerDefinitionErrorKind> {
        perform_runtime_checks(def)
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn test_valid() {
        let def = MultiModeLexerDef::new("outer")
            .mode("outer", vec![class("A"), class("B")])
            .mode("inner", vec![class("B"), class("C")]);
        assert!(perform_runtime_checks(&def).is_empty());
        assert_eq!(def.mode_names(), vec!["outer", "inner"]);
        assert_eq!(
            def.all_token_classes()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            vec!["A", "B", "B", "C"]
        );
    }

    #[test]
    fn test_single() {
        let def = MultiModeLexerDef::single(vec![class("A")]);
        assert_eq!(def.default_mode.as_deref(), Some(DEFAULT_MODE));
        assert_eq!(def.mode_names(), vec![DEFAULT_MODE]);
        assert!(perform_runtime_checks(&def).is_empty());
    }

    #[test]
    fn test_missing_parts() {
        assert_eq!(
            kinds(&MultiModeLexerDef::default()),
            vec![
                LexerDefinitionErrorKind::MultiModeLexerWithoutDefaultMode,
                LexerDefinitionErrorKind::MultiModeLexerWithoutModesProperty
            ]
        );
        assert_eq!(
            kinds(&MultiModeLexerDef::new("m")),
            vec![LexerDefinitionErrorKind::MultiModeLexerWithoutModesProperty]
        );
        let no_default = MultiModeLexerDef {
            default_mode: None,
            ..MultiModeLexerDef::new("x").mode("m", vec![])
        };
        assert_eq!(
            kinds(&no_default),
            vec![LexerDefinitionErrorKind::MultiModeLexerWithoutDefaultMode]
        );
    }

    #[test]
    fn test_default_mode_does_not_exist() {
        let def = MultiModeLexerDef::new("nope").mode("m", vec![class("A")]);
        let errs = perform_runtime_checks(&def);
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].kind,
            LexerDefinitionErrorKind::MultiModeLexerDefaultModeValueDoesNotExist
        );
        assert!(errs[0].message.contains("'nope'"));
    }

    #[test]
    fn test_undefined_entries() {
        let def = MultiModeLexerDef::new("a")
            .mode_entries("a", vec![Some(class("A")), None, Some(class("B")), None])
            .mode_entries("b", vec![None]);
        let errs = perform_runtime_checks(&def);
        assert_eq!(
            errs.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec![
                "Mode 'a' has an undefined token class at index 1",
                "Mode 'a' has an undefined token class at index 3",
                "Mode 'b' has an undefined token class at index 0"
            ]
        );
        assert!(errs.iter().all(|e| e.token_classes.is_empty()));
        assert_eq!(def.all_token_classes().count(), 2);
    }
}
