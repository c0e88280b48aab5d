use indexmap::IndexMap;
use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    prod::Grammar,
    shape::{ShapeMap, build_is_collection_for_rules},
};

/// Performs an analysis on a given `Subject`.
pub trait Analysis<Subject> {
    /// Perform an analysis on a given subject. The mechanisms by which you retrieve the
    /// results of an analysis are not specified by the trait, and particular to the types
    /// that implement the trait.
    fn analyse(&mut self, subject: &Subject);
}

/// The CST shapes of every rule in a grammar. Once computed, the shapes are only ever read, so a
/// single `GrammarShapes` can be shared by any number of parses.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GrammarShapes {
    rules: IndexMap<String, ShapeMap>,
}

impl GrammarShapes {
    pub fn new() -> Self {
        GrammarShapes {
            rules: IndexMap::new(),
        }
    }

    /// Compute the shapes of every rule in `grm`.
    pub fn from_grammar(grm: &Grammar) -> Self {
        let mut shapes = GrammarShapes::new();
        shapes.analyse(grm);
        shapes
    }

    pub fn shape(&self, rule: &str) -> Option<&ShapeMap> {
        self.rules.get(rule)
    }

    /// Returns true if `key` is a collection within `rule`. Unknown rules and keys are not
    /// collections.
    pub fn is_collection(&self, rule: &str, key: &str) -> bool {
        self.rules.get(rule).is_some_and(|s| s.is_collection(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ShapeMap)> {
        self.rules.iter().map(|(n, s)| (n.as_str(), s))
    }
}

/// Each rule is analysed in isolation: no state is carried from one rule to the next. Any shapes
/// from a previous analysis are replaced, so rules since redefined or removed from `grm` do not
/// keep stale shapes.
impl Analysis<Grammar> for GrammarShapes {
    fn analyse(&mut self, grm: &Grammar) {
        self.rules = build_is_collection_for_rules(grm.iter_rules());
        debug!("computed CST shapes of {} rules", self.rules.len());
    }
}

#[cfg(test)]
mod test {
    use super::{Analysis, GrammarShapes};
    use crate::{
        prod::{Grammar, Production, Rule},
        shape::{CstShape, build_is_collection},
    };

    fn grammar() -> Grammar {
        let mut grm = Grammar::new();
        grm.add_rule(Rule::new(
            "args",
            vec![Production::RepetitionWithSeparator {
                definition: vec![Production::non_terminal("expr")],
                separator: "COMMA".to_owned(),
            }],
        ));
        grm.add_rule(Rule::new(
            "expr",
            vec![Production::Alternation(vec![
                vec![Production::terminal("INT")],
                vec![
                    Production::terminal("LPAREN"),
                    Production::non_terminal("expr"),
                    Production::terminal("RPAREN"),
                ],
            ])],
        ));
        grm
    }

    #[test]
    fn test_grammar_shapes() {
        let shapes = GrammarShapes::from_grammar(&grammar());
        assert_eq!(
            shapes.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["args", "expr"]
        );
        assert!(shapes.is_collection("args", "expr"));
        assert!(shapes.is_collection("args", "COMMA"));
        assert!(!shapes.is_collection("expr", "expr"));
        assert_eq!(
            shapes.shape("expr").unwrap().get("INT"),
            Some(CstShape::None)
        );
        assert!(!shapes.is_collection("missing", "expr"));
        assert!(shapes.shape("missing").is_none());
    }

    #[test]
    fn test_reanalysis_is_stable() {
        let grm = grammar();
        let mut shapes = GrammarShapes::from_grammar(&grm);
        let before = shapes.shape("args").unwrap().clone();
        shapes.analyse(&grm);
        assert_eq!(shapes.shape("args").unwrap(), &before);
        assert_eq!(shapes.iter().count(), 2);
    }

    #[test]
    fn test_redefined_rule_is_reanalysed() {
        let mut grm = Grammar::new();
        grm.add_rule(Rule::new("r", vec![Production::terminal("A")]));
        grm.add_rule(Rule::new("s", vec![Production::terminal("B")]));
        let mut shapes = GrammarShapes::from_grammar(&grm);
        assert!(!shapes.is_collection("r", "A"));

        grm.add_rule(Rule::new(
            "r",
            vec![Production::Repetition(vec![Production::terminal("A")])],
        ));
        shapes.analyse(&grm);
        assert!(shapes.is_collection("r", "A"));
        assert_eq!(
            shapes.shape("r"),
            Some(&build_is_collection(&grm.rule("r").unwrap().definition))
        );

        // Rules no longer in the grammar are forgotten.
        let mut smaller = Grammar::new();
        smaller.add_rule(grm.rule("s").unwrap().clone());
        shapes.analyse(&smaller);
        assert!(shapes.shape("r").is_none());
        assert_eq!(shapes.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["s"]);
    }
}
