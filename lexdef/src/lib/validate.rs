use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use log::debug;
use regex_syntax::ast::{self, Assertion, AssertionKind, Ast, Visitor};

use crate::{
    LexerDefinitionError, LexerDefinitionErrorKind,
    tokclass::{Group, Pattern, TokenClass, TokenRegex},
};

/// What a check needs to know beyond the classes themselves.
#[derive(Debug)]
pub struct ValidationCtx {
    pub mode_names: HashSet<String>,
}

impl ValidationCtx {
    pub fn new(mode_names: &[&str]) -> Self {
        ValidationCtx {
            mode_names: mode_names.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// The result of one check: the errors it found, and the classes later checks should see.
#[derive(Debug)]
pub struct Filtered<'a> {
    pub errors: Vec<LexerDefinitionError>,
    pub valid: Vec<&'a TokenClass>,
}

type Check = for<'a> fn(&ValidationCtx, Vec<&'a TokenClass>) -> Filtered<'a>;

/// The checks run by [validate_patterns], in order.
const PIPELINE: [(&str, Check); 7] = [
    ("missing patterns", find_missing_patterns),
    ("invalid patterns", find_invalid_patterns),
    ("end of input anchors", find_end_of_input_anchor),
    ("unsupported flags", find_unsupported_flags),
    ("duplicate patterns", find_duplicate_patterns),
    ("invalid groups", find_invalid_group_type),
    ("unknown push modes", find_modes_that_do_not_exist),
];

/// Check `classes` for every problem which would stop them being scanned. `mode_names` must
/// contain every mode of the complete lexer definition, not just the mode `classes` belong to.
///
/// A class rejected for lacking a usable pattern is not considered by any later check.
pub fn validate_patterns(classes: &[TokenClass], mode_names: &[&str]) -> Vec<LexerDefinitionError> {
    let ctx = ValidationCtx::new(mode_names);
    let mut errors = Vec::new();
    let mut valid = classes.iter().collect::<Vec<_>>();
    for (name, check) in PIPELINE {
        let f = check(&ctx, valid);
        debug!(
            "{}: {} errors, {} classes remain",
            name,
            f.errors.len(),
            f.valid.len()
        );
        errors.extend(f.errors);
        valid = f.valid;
    }
    errors
}

fn class_error(
    kind: LexerDefinitionErrorKind,
    class: &TokenClass,
    msg: String,
) -> LexerDefinitionError {
    LexerDefinitionError::for_classes(kind, msg, [class])
}

/// Split `classes` into those for which `bad` holds (reported with `report`) and the rest.
fn partition<'a>(
    classes: Vec<&'a TokenClass>,
    bad: impl Fn(&TokenClass) -> bool,
    report: impl Fn(&TokenClass) -> LexerDefinitionError,
) -> Filtered<'a> {
    let (rejected, valid): (Vec<_>, Vec<_>) = classes.into_iter().partition(|c| bad(*c));
    Filtered {
        errors: rejected.into_iter().map(report).collect(),
        valid,
    }
}

/// As [partition], but every class remains valid.
fn report_only<'a>(
    classes: Vec<&'a TokenClass>,
    bad: impl Fn(&TokenClass) -> bool,
    report: impl Fn(&TokenClass) -> LexerDefinitionError,
) -> Filtered<'a> {
    Filtered {
        errors: classes.iter().filter(|c| bad(**c)).map(|c| report(*c)).collect(),
        valid: classes,
    }
}

fn declared_regex(c: &TokenClass) -> Option<&TokenRegex> {
    c.pattern.as_ref().and_then(Pattern::regex)
}

pub fn find_missing_patterns<'a>(_: &ValidationCtx, classes: Vec<&'a TokenClass>) -> Filtered<'a> {
    partition(
        classes,
        |c| c.pattern.is_none(),
        |c| {
            class_error(
                LexerDefinitionErrorKind::MissingPattern,
                c,
                format!("Token class '{}' does not declare a pattern", c.name),
            )
        },
    )
}

/// Only regular expressions (and the not-applicable marker) can be analysed.
pub fn find_invalid_patterns<'a>(_: &ValidationCtx, classes: Vec<&'a TokenClass>) -> Filtered<'a> {
    partition(
        classes,
        |c| !matches!(c.pattern, Some(Pattern::Regex(_)) | Some(Pattern::NotApplicable)),
        |c| {
            class_error(
                LexerDefinitionErrorKind::InvalidPatternType,
                c,
                format!("Token class '{}' must have a regular expression pattern", c.name),
            )
        },
    )
}

struct EndAnchorFinder;

impl Visitor for EndAnchorFinder {
    type Output = ();
    // Returned as soon as an end anchor is found, to stop the traversal.
    type Err = ();

    fn finish(self) -> Result<(), ()> {
        Ok(())
    }

    fn visit_pre(&mut self, ast: &Ast) -> Result<(), ()> {
        match ast {
            Ast::Assertion(a) if is_end_anchor(a) => Err(()),
            _ => Ok(()),
        }
    }
}

fn is_end_anchor(a: &Assertion) -> bool {
    matches!(a.kind, AssertionKind::EndLine | AssertionKind::EndText)
}

/// Does `re`'s source contain an unescaped `$` or `\z`?
fn has_end_of_input_anchor(re: &TokenRegex) -> bool {
    match ast::parse::Parser::new().parse(re.source()) {
        Ok(a) => ast::visit(&a, EndAnchorFinder).is_err(),
        // Not reachable for a constructed TokenRegex, whose source has been parsed already.
        Err(_) => false,
    }
}

pub fn find_end_of_input_anchor<'a>(
    _: &ValidationCtx,
    classes: Vec<&'a TokenClass>,
) -> Filtered<'a> {
    report_only(
        classes,
        |c| declared_regex(c).is_some_and(has_end_of_input_anchor),
        |c| {
            class_error(
                LexerDefinitionErrorKind::EndOfInputAnchorFound,
                c,
                format!(
                    "Token class '{}' has a pattern containing an end of input anchor",
                    c.name
                ),
            )
        },
    )
}

pub fn find_unsupported_flags<'a>(_: &ValidationCtx, classes: Vec<&'a TokenClass>) -> Filtered<'a> {
    report_only(
        classes,
        |c| declared_regex(c).is_some_and(|re| re.flags().multi_line || re.flags().global),
        |c| {
            class_error(
                LexerDefinitionErrorKind::UnsupportedFlagsFound,
                c,
                format!(
                    "Token class '{}' has a pattern with the global ('g') or multi-line ('m') flag",
                    c.name
                ),
            )
        },
    )
}

/// Report each set of classes whose patterns have identical source text. Only textual identity
/// is detected: `a+` and `aa*` are not considered duplicates.
pub fn find_duplicate_patterns<'a>(
    _: &ValidationCtx,
    classes: Vec<&'a TokenClass>,
) -> Filtered<'a> {
    let mut by_source: IndexMap<&str, IndexSet<&str>> = IndexMap::new();
    for c in &classes {
        if let Some(re) = declared_regex(c) {
            by_source.entry(re.source()).or_default().insert(&c.name);
        }
    }
    let errors = by_source
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(src, names)| {
            let names = names.into_iter().map(str::to_owned).collect::<Vec<_>>();
            LexerDefinitionError {
                kind: LexerDefinitionErrorKind::DuplicatePatternsFound,
                message: format!(
                    "The pattern '{}' is used by more than one token class: {}",
                    src,
                    names.join(", ")
                ),
                token_classes: names,
            }
        })
        .collect();
    Filtered {
        errors,
        valid: classes,
    }
}

pub fn find_invalid_group_type<'a>(
    _: &ValidationCtx,
    classes: Vec<&'a TokenClass>,
) -> Filtered<'a> {
    report_only(
        classes,
        |c| matches!(c.group, Some(Group::Invalid(_))),
        |c| {
            let v = match &c.group {
                Some(Group::Invalid(v)) => v.as_str(),
                _ => "",
            };
            class_error(
                LexerDefinitionErrorKind::InvalidGroupTypeFound,
                c,
                format!(
                    "Token class '{}' has group '{}': a group must be skipped, not applicable, \
                     or a name",
                    c.name, v
                ),
            )
        },
    )
}

pub fn find_modes_that_do_not_exist<'a>(
    ctx: &ValidationCtx,
    classes: Vec<&'a TokenClass>,
) -> Filtered<'a> {
    report_only(
        classes,
        |c| {
            c.push_mode
                .as_ref()
                .is_some_and(|m| !ctx.mode_names.contains(m))
        },
        |c| {
            class_error(
                LexerDefinitionErrorKind::PushModeDoesNotExist,
                c,
                format!(
                    "Token class '{}' pushes mode '{}' which does not exist",
                    c.name,
                    c.push_mode.as_deref().unwrap_or_default()
                ),
            )
        },
    )
}

/// The result of a homogeneity check.
#[derive(Debug)]
pub struct ModeCheck {
    /// True if every class has the property checked for (vacuously true if there are none).
    pub uniform: bool,
    pub errors: Vec<LexerDefinitionError>,
}

fn check_homogeneous<'a, I>(
    classes: I,
    has: fn(&TokenClass) -> bool,
    kind: LexerDefinitionErrorKind,
    (with, without): (&str, &str),
) -> ModeCheck
where
    I: IntoIterator<Item = &'a TokenClass>,
{
    let mut seen = HashSet::new();
    let (yes, no): (Vec<&TokenClass>, Vec<&TokenClass>) = classes
        .into_iter()
        .filter(|c| seen.insert(c.name.as_str()))
        .partition(|c| has(*c));
    let mut errors = Vec::new();
    if !yes.is_empty() && !no.is_empty() {
        let names = |cs: &[&TokenClass]| {
            cs.iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join("\n\t")
        };
        errors.push(LexerDefinitionError::for_classes(
            kind,
            format!(
                "A lexer cannot mix {with} and {without} token classes:\n\
                 {with}:\n\t{}\n{without}:\n\t{}",
                names(&yes),
                names(&no)
            ),
            yes.iter().chain(no.iter()).copied(),
        ));
    }
    ModeCheck {
        uniform: no.is_empty(),
        errors,
    }
}

/// Check that the classes of a lexer are either all lazy or all not lazy. Classes are
/// deduplicated by name.
pub fn check_lazy_mode<'a, I>(classes: I) -> ModeCheck
where
    I: IntoIterator<Item = &'a TokenClass>,
{
    check_homogeneous(
        classes,
        |c| c.lazy,
        LexerDefinitionErrorKind::LexerDefinitionCannotMixLazyAndNotLazy,
        ("lazy", "non-lazy"),
    )
}

/// Check that the classes of a lexer are either all simple or all not simple. Classes are
/// deduplicated by name.
pub fn check_simple_mode<'a, I>(classes: I) -> ModeCheck
where
    I: IntoIterator<Item = &'a TokenClass>,
{
    check_homogeneous(
        classes,
        |c| c.simple,
        LexerDefinitionErrorKind::LexerDefinitionCannotMixSimpleAndNotSimple,
        ("simple", "non-simple"),
    )
}

#[cfg(test)]
mod test {
    use super::{
        ValidationCtx, check_lazy_mode, check_simple_mode, find_duplicate_patterns,
        find_end_of_input_anchor, find_invalid_patterns, find_missing_patterns, validate_patterns,
    };
    use crate::{
        LexerDefinitionErrorKind,
        tokclass::{Group, Pattern, TokenClass, TokenRegex},
    };

    fn class(name: &str, src: &str) -> TokenClass {
        TokenClass::regex(name, src).unwrap()
    }

    fn kinds(classes: &[TokenClass], modes: &[&str]) -> Vec<LexerDefinitionErrorKind> {
        validate_patterns(classes, modes)
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn test_valid() {
        let cs = vec![
            class("A", "a"),
            class("B", "b").skipped(),
            TokenClass::not_applicable("C"),
            TokenClass::not_applicable("D"),
            class("E", r"\$").push_mode("m"),
        ];
        assert!(validate_patterns(&cs, &["m"]).is_empty());
    }

    #[test]
    fn test_missing_and_invalid_filter() {
        let ctx = ValidationCtx::new(&[]);
        let cs = [
            class("A", "a"),
            TokenClass::without_pattern("B"),
            TokenClass::new("C", Pattern::Literal("c".to_owned())),
        ];
        let f = find_missing_patterns(&ctx, cs.iter().collect());
        assert_eq!(f.errors.len(), 1);
        assert_eq!(f.errors[0].token_classes, vec!["B"]);
        assert_eq!(f.valid.len(), 2);
        let f = find_invalid_patterns(&ctx, f.valid);
        assert_eq!(f.errors[0].kind, LexerDefinitionErrorKind::InvalidPatternType);
        assert_eq!(f.errors[0].token_classes, vec!["C"]);
        assert_eq!(
            f.valid.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["A"]
        );
    }

    #[test]
    fn test_rejected_classes_are_not_rechecked() {
        // Both lack a usable pattern, so neither is reported as a duplicate or for its group.
        let cs = vec![
            TokenClass::without_pattern("A").group(Group::Invalid("1".to_owned())),
            TokenClass::without_pattern("B"),
        ];
        assert_eq!(
            kinds(&cs, &[]),
            vec![
                LexerDefinitionErrorKind::MissingPattern,
                LexerDefinitionErrorKind::MissingPattern
            ]
        );
    }

    #[test]
    fn test_end_of_input_anchor() {
        let ctx = ValidationCtx::new(&[]);
        let cs = [
            class("A", "a$"),
            class("B", r"a\z"),
            class("C", r"a\$"),
            class("D", "[$]"),
            class("E", "(?:x|$)"),
        ];
        let f = find_end_of_input_anchor(&ctx, cs.iter().collect());
        assert_eq!(
            f.errors
                .iter()
                .flat_map(|e| e.token_classes.iter())
                .collect::<Vec<_>>(),
            vec!["A", "B", "E"]
        );
        assert_eq!(f.valid.len(), 5);
    }

    #[test]
    fn test_unsupported_flags() {
        let cs = vec![
            TokenClass::new("A", Pattern::Regex(TokenRegex::with_flags("a", "g").unwrap())),
            TokenClass::new("B", Pattern::Regex(TokenRegex::with_flags("b", "m").unwrap())),
            TokenClass::new("C", Pattern::Regex(TokenRegex::with_flags("c", "i").unwrap())),
        ];
        assert_eq!(
            kinds(&cs, &[]),
            vec![
                LexerDefinitionErrorKind::UnsupportedFlagsFound,
                LexerDefinitionErrorKind::UnsupportedFlagsFound
            ]
        );
    }

    #[test]
    fn test_duplicates() {
        let ctx = ValidationCtx::new(&[]);
        let cs = [
            class("A", "x"),
            class("B", "y"),
            class("C", "x"),
            class("D", "y"),
            class("E", "x"),
            class("F", "z"),
            TokenClass::not_applicable("G"),
            TokenClass::not_applicable("H"),
        ];
        let f = find_duplicate_patterns(&ctx, cs.iter().collect());
        assert_eq!(f.errors.len(), 2);
        assert_eq!(f.errors[0].token_classes, vec!["A", "C", "E"]);
        assert_eq!(f.errors[1].token_classes, vec!["B", "D"]);
        assert!(f.errors[0].message.contains("'x'"));
        assert_eq!(f.valid.len(), cs.len());
    }

    #[test]
    fn test_groups_and_push_modes() {
        let cs = vec![
            class("A", "a").group(Group::Invalid("42".to_owned())),
            class("B", "b").group(Group::NotApplicable),
            class("C", "c").group(Group::Named("g".to_owned())),
            class("D", "d").push_mode("nowhere"),
            class("E", "e").push_mode("inner"),
        ];
        let errs = validate_patterns(&cs, &["outer", "inner"]);
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].kind, LexerDefinitionErrorKind::InvalidGroupTypeFound);
        assert_eq!(errs[0].token_classes, vec!["A"]);
        assert_eq!(
            errs[0].message,
            "Token class 'A' has group '42': a group must be skipped, not applicable, or a name"
        );
        assert_eq!(errs[1].kind, LexerDefinitionErrorKind::PushModeDoesNotExist);
        assert!(errs[1].message.contains("nowhere"));
    }

    #[test]
    fn test_lazy_mode() {
        let cs = [
            class("A", "a").lazy(true),
            class("B", "b"),
            class("A", "a").lazy(true),
        ];
        let r = check_lazy_mode(&cs);
        assert!(!r.uniform);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(
            r.errors[0].kind,
            LexerDefinitionErrorKind::LexerDefinitionCannotMixLazyAndNotLazy
        );
        assert_eq!(r.errors[0].token_classes, vec!["A", "B"]);
        assert!(r.errors[0].message.contains("lazy:\n\tA\nnon-lazy:\n\tB"));

        let all = [class("A", "a").lazy(true), class("B", "b").lazy(true)];
        let r = check_lazy_mode(&all);
        assert!(r.uniform && r.errors.is_empty());
        let none = [class("A", "a"), class("B", "b")];
        let r = check_lazy_mode(&none);
        assert!(!r.uniform && r.errors.is_empty());
        assert!(check_lazy_mode(Vec::<&TokenClass>::new()).uniform);
    }

    #[test]
    fn test_simple_mode() {
        let cs = [class("A", "a").simple(true), class("B", "b")];
        let r = check_simple_mode(&cs);
        assert!(!r.uniform);
        assert_eq!(
            r.errors[0].kind,
            LexerDefinitionErrorKind::LexerDefinitionCannotMixSimpleAndNotSimple
        );
        assert!(check_simple_mode(&cs[..1]).uniform);
    }
}
