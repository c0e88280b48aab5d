use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use regex::Regex;
use regex_syntax::{
    ParserBuilder,
    hir::{Class, Hir, HirKind},
};
use vob::Vob;

use crate::tokclass::{Group, Pattern, TokenClass, TokenRegex};

/// The group of tokens whose class declares no group.
pub const DEFAULT_GROUP: &str = "default";

/// Scanning tables for a single mode, indexed by pattern position. Classes without a regular
/// expression pattern (e.g. abstract classes) have no position.
#[derive(Clone, Debug)]
pub struct PositionalAnalysis {
    /// Start-anchored patterns, in declaration order.
    pub all_patterns: Vec<Regex>,
    pub pattern_idx_to_class: Vec<String>,
    /// `None` if matched tokens are discarded.
    pub pattern_idx_to_group: Vec<Option<String>>,
    pub pattern_idx_to_longer_alt_idx: Vec<Option<usize>>,
    /// `false` only if the pattern provably cannot match a line terminator, in which case a
    /// scanner need not look for line terminators in the matched text.
    pub pattern_idx_to_can_line_terminator: Vob,
    pub pattern_idx_to_push_mode: Vec<Option<String>>,
    pub pattern_idx_to_pop_mode: Vob,
    /// Every explicitly named group.
    pub empty_groups: IndexSet<String>,
}

impl PositionalAnalysis {
    pub fn patterns_len(&self) -> usize {
        self.all_patterns.len()
    }

    /// A fresh, empty token collection for every named group. Call once per scan.
    pub fn clone_empty_groups<T>(&self) -> IndexMap<String, Vec<T>> {
        self.empty_groups
            .iter()
            .map(|g| (g.clone(), Vec::new()))
            .collect()
    }
}

/// The classes which take part in scanning, paired with their pattern.
fn relevant_classes(classes: &[TokenClass]) -> Vec<(&TokenClass, &TokenRegex)> {
    classes
        .iter()
        .filter_map(|c| match &c.pattern {
            Some(Pattern::Regex(re)) => Some((c, re)),
            Some(Pattern::NotApplicable) => None,
            _ => {
                warn!("Token class '{}' has no usable pattern and is ignored", c.name);
                None
            }
        })
        .collect()
}

/// The group tokens of `class` are placed in, or `None` if they are discarded.
fn output_group(class: &TokenClass) -> Option<String> {
    match &class.group {
        None => Some(DEFAULT_GROUP.to_owned()),
        Some(Group::Named(n)) => Some(n.clone()),
        Some(Group::Skipped) | Some(Group::NotApplicable) => None,
        Some(Group::Invalid(v)) => {
            warn!(
                "Token class '{}' has an invalid group '{}': its tokens are discarded",
                class.name, v
            );
            None
        }
    }
}

/// Build the positional scanning tables for `classes`.
pub fn analyse_token_classes(classes: &[TokenClass]) -> PositionalAnalysis {
    let relevant = relevant_classes(classes);
    let mut pattern_idx_to_can_line_terminator = Vob::new();
    let mut pattern_idx_to_pop_mode = Vob::new();
    let mut empty_groups = IndexSet::new();
    for (c, re) in &relevant {
        pattern_idx_to_can_line_terminator.push(can_match_line_terminator(re));
        pattern_idx_to_pop_mode.push(c.pop_mode);
        if let Some(Group::Named(n)) = &c.group {
            empty_groups.insert(n.clone());
        }
    }

    let analysis = PositionalAnalysis {
        all_patterns: relevant.iter().map(|(_, re)| re.anchored().clone()).collect(),
        pattern_idx_to_class: relevant.iter().map(|(c, _)| c.name.clone()).collect(),
        pattern_idx_to_group: relevant.iter().map(|(c, _)| output_group(c)).collect(),
        pattern_idx_to_longer_alt_idx: relevant
            .iter()
            .map(|(c, _)| {
                c.longer_alt
                    .as_ref()
                    .and_then(|alt| relevant.iter().position(|(o, _)| &o.name == alt))
            })
            .collect(),
        pattern_idx_to_can_line_terminator,
        pattern_idx_to_push_mode: relevant.iter().map(|(c, _)| c.push_mode.clone()).collect(),
        pattern_idx_to_pop_mode,
        empty_groups,
    };
    debug!(
        "{} of {} token classes have patterns",
        analysis.patterns_len(),
        classes.len()
    );
    analysis
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Returns true if the anchored form of `re` could match a line terminator (`\n`, `\r`, U+2028 or
/// U+2029). This never returns false for a pattern which can match one, though it may return true
/// for some which cannot. If the pattern cannot be parsed, returns true.
pub fn can_match_line_terminator(re: &TokenRegex) -> bool {
    let hir = ParserBuilder::new()
        .case_insensitive(re.flags().case_insensitive)
        .build()
        .parse(re.anchored().as_str());
    match hir {
        Ok(hir) => hir_can_match_line_terminator(&hir),
        Err(_) => true,
    }
}

fn hir_can_match_line_terminator(hir: &Hir) -> bool {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => false,
        HirKind::Literal(lit) => match std::str::from_utf8(&lit.0) {
            Ok(s) => s.chars().any(is_line_terminator),
            Err(_) => lit.0.iter().any(|b| *b == b'\n' || *b == b'\r'),
        },
        HirKind::Class(Class::Unicode(cls)) => cls.ranges().iter().any(|r| {
            ['\n', '\r', '\u{2028}', '\u{2029}']
                .iter()
                .any(|c| r.start() <= *c && *c <= r.end())
        }),
        HirKind::Class(Class::Bytes(cls)) => cls
            .ranges()
            .iter()
            .any(|r| [b'\n', b'\r'].iter().any(|b| r.start() <= *b && *b <= r.end())),
        HirKind::Repetition(rep) => rep.max != Some(0) && hir_can_match_line_terminator(&rep.sub),
        HirKind::Capture(cap) => hir_can_match_line_terminator(&cap.sub),
        HirKind::Concat(hirs) | HirKind::Alternation(hirs) => {
            hirs.iter().any(hir_can_match_line_terminator)
        }
    }
}

/// Count the line terminators in `text`. `\r\n` counts as one line terminator.
pub fn count_line_terminators(text: &str) -> usize {
    let mut n = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => n += 1,
            '\r' if chars.peek() != Some(&'\n') => n += 1,
            _ => (),
        }
    }
    n
}

/// Scanning tables keyed by class name, for streaming lexers.
#[derive(Clone, Debug)]
pub struct StreamingAnalysis {
    pub token_name_to_pattern: IndexMap<String, Regex>,
    /// `None` if matched tokens are discarded.
    pub token_name_to_group: IndexMap<String, Option<String>>,
    /// The patterns of skipped classes, in declaration order.
    pub skipped_patterns: Vec<Regex>,
    /// Every pattern, in declaration order.
    pub idx_to_pattern: Vec<Regex>,
}

/// What is remembered about a class between analyses.
#[derive(Clone, Debug)]
pub struct CachedClass {
    /// The class's position in the declaration list it was last analysed in (including classes
    /// without a pattern).
    pub idx: usize,
    /// The anchored pattern, if the class has one.
    pub pattern: Option<Regex>,
    /// The anchored patterns of every class this class extends.
    pub extending_patterns: Vec<Regex>,
    declared: Option<TokenRegex>,
}

/// Builds [StreamingAnalysis]es, remembering per-class results in a side table so that lexers
/// sharing token classes do not redo work. Declarations themselves are never modified.
#[derive(Debug, Default)]
pub struct StreamingAnalyser {
    cache: HashMap<String, CachedClass>,
}

impl StreamingAnalyser {
    pub fn new() -> Self {
        StreamingAnalyser {
            cache: HashMap::new(),
        }
    }

    /// The cached analysis of the class called `name`, if it has been analysed.
    pub fn cached(&self, name: &str) -> Option<&CachedClass> {
        self.cache.get(name)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn analyse(&mut self, classes: &[TokenClass]) -> StreamingAnalysis {
        for (idx, c) in classes.iter().enumerate() {
            let declared = c.pattern.as_ref().and_then(Pattern::regex);
            match self.cache.get_mut(&c.name) {
                Some(cached) if cached.declared.as_ref() == declared => cached.idx = idx,
                _ => {
                    debug!("caching token class '{}'", c.name);
                    self.cache.insert(
                        c.name.clone(),
                        CachedClass {
                            idx,
                            pattern: declared.map(|re| re.anchored().clone()),
                            extending_patterns: Vec::new(),
                            declared: declared.cloned(),
                        },
                    );
                }
            }
        }
        // Done as a second pass, since a class may extend one declared after it.
        for c in classes {
            let extending_patterns = c
                .extends
                .iter()
                .filter_map(|n| self.cache.get(n).and_then(|e| e.pattern.clone()))
                .collect::<Vec<_>>();
            if let Some(cached) = self.cache.get_mut(&c.name) {
                cached.extending_patterns = extending_patterns;
            }
        }

        let mut analysis = StreamingAnalysis {
            token_name_to_pattern: IndexMap::new(),
            token_name_to_group: IndexMap::new(),
            skipped_patterns: Vec::new(),
            idx_to_pattern: Vec::new(),
        };
        for (c, _) in relevant_classes(classes) {
            let Some(re) = self.cache.get(&c.name).and_then(|e| e.pattern.clone()) else {
                continue;
            };
            if c.group == Some(Group::Skipped) {
                analysis.skipped_patterns.push(re.clone());
            }
            analysis
                .token_name_to_group
                .insert(c.name.clone(), output_group(c));
            analysis.idx_to_pattern.push(re.clone());
            analysis.token_name_to_pattern.insert(c.name.clone(), re);
        }
        analysis
    }
}
