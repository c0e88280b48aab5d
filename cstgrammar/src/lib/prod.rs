use indexmap::{IndexMap, IndexSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single node in a rule's production tree. Every variant other than `Terminal` and
/// `NonTerminal` holds a nested sequence of child productions.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Production {
    /// A reference to a token class by name.
    Terminal(String),
    /// A reference to another rule by name.
    NonTerminal(String),
    /// Zero or one occurrence of the body.
    Option(Vec<Production>),
    /// Zero or more occurrences of the body.
    Repetition(Vec<Production>),
    /// One or more occurrences of the body.
    RepetitionMandatory(Vec<Production>),
    /// Zero or more occurrences of the body, with `separator` between each.
    RepetitionWithSeparator {
        definition: Vec<Production>,
        separator: String,
    },
    /// One or more occurrences of the body, with `separator` between each.
    RepetitionMandatoryWithSeparator {
        definition: Vec<Production>,
        separator: String,
    },
    /// An ordered choice: exactly one alternative is taken. An empty alternative is allowed.
    Alternation(Vec<Vec<Production>>),
    /// A plain grouping of a sequence.
    Flat(Vec<Production>),
}

impl Production {
    pub fn terminal(name: &str) -> Self {
        Production::Terminal(name.to_owned())
    }

    pub fn non_terminal(name: &str) -> Self {
        Production::NonTerminal(name.to_owned())
    }

    /// Calls `f` with every terminal, non-terminal, and separator name reachable from this node,
    /// in depth-first, left-to-right order. Names may be reported more than once.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        match self {
            Production::Terminal(n) | Production::NonTerminal(n) => f(n),
            Production::Option(def)
            | Production::Repetition(def)
            | Production::RepetitionMandatory(def)
            | Production::Flat(def) => walk_seq(def, f),
            Production::RepetitionWithSeparator {
                definition,
                separator,
            }
            | Production::RepetitionMandatoryWithSeparator {
                definition,
                separator,
            } => {
                walk_seq(definition, f);
                f(separator);
            }
            Production::Alternation(alts) => {
                for alt in alts {
                    walk_seq(alt, f);
                }
            }
        }
    }
}

fn walk_seq<'a>(seq: &'a [Production], f: &mut dyn FnMut(&'a str)) {
    for p in seq {
        p.walk(f);
    }
}

/// Returns the distinct keys reachable anywhere in `seq`, in order of first occurrence.
pub fn referenced_keys(seq: &[Production]) -> IndexSet<&str> {
    let mut keys = IndexSet::new();
    walk_seq(seq, &mut |n| {
        keys.insert(n);
    });
    keys
}

/// A named rule and the sequence of productions it derives.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    pub name: String,
    pub definition: Vec<Production>,
}

impl Rule {
    pub fn new(name: &str, definition: Vec<Production>) -> Self {
        Rule {
            name: name.to_owned(),
            definition,
        }
    }

    pub fn referenced_keys(&self) -> IndexSet<&str> {
        referenced_keys(&self.definition)
    }
}

/// A grammar: rules in declaration order. Analyses only read from it.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar {
    // Using an IndexMap means that we retain the order in which rules were added.
    rules: IndexMap<String, Rule>,
}

impl Grammar {
    pub fn new() -> Self {
        Grammar {
            rules: IndexMap::new(),
        }
    }

    /// Add `rule`, replacing (and returning) any existing rule with the same name.
    pub fn add_rule(&mut self, rule: Rule) -> Option<Rule> {
        self.rules.insert(rule.name.clone(), rule)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn iter_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn rules_len(&self) -> usize {
        self.rules.len()
    }
}
