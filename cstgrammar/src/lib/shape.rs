use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prod::{Production, Rule, referenced_keys};

/// How a child slot of a CST node is populated.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CstShape {
    /// At most one value per derivation.
    None,
    /// An ordered collection of values.
    Collection,
    /// Reserved: no analysis currently produces this.
    Optional,
}

/// The shape of every key (terminal or non-terminal name) reachable from a rule, in order of
/// first occurrence in the rule's production tree.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeMap {
    shapes: IndexMap<String, CstShape>,
}

impl ShapeMap {
    pub fn get(&self, key: &str) -> Option<CstShape> {
        self.shapes.get(key).copied()
    }

    /// Returns true if `key` is known and classified as [CstShape::Collection].
    pub fn is_collection(&self, key: &str) -> bool {
        self.get(key) == Some(CstShape::Collection)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CstShape)> {
        self.shapes.iter().map(|(k, s)| (k.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Promote `key` to [CstShape::Collection]. Promotion is never undone.
    fn promote(&mut self, key: &str) {
        if let Some(s) = self.shapes.get_mut(key) {
            if *s != CstShape::Collection {
                trace!("'{}' promoted to a collection", key);
                *s = CstShape::Collection;
            }
        }
    }
}

impl FromIterator<(String, CstShape)> for ShapeMap {
    fn from_iter<I: IntoIterator<Item = (String, CstShape)>>(iter: I) -> Self {
        ShapeMap {
            shapes: iter.into_iter().collect(),
        }
    }
}

/// One unit of pending work on a path.
#[derive(Clone, Copy)]
enum Item<'a> {
    Prod(&'a Production),
    /// A separator: behaves exactly like a terminal.
    Key(&'a str),
    /// Leave the innermost repetition.
    ExitIteration,
}

/// A partially explored derivation path.
#[derive(Clone)]
struct PathState<'a> {
    /// Remaining work, stored in reverse so that the head of the sequence is the last element.
    todo: Vec<Item<'a>>,
    /// One entry per enclosing repetition.
    in_iteration: Vec<bool>,
    /// How often each key has been consumed on this path so far.
    occurrences: HashMap<&'a str, usize>,
}

impl<'a> PathState<'a> {
    /// Return a copy of this path with `seq` prepended to the remaining work.
    fn then(&self, seq: &'a [Production]) -> Self {
        let mut next = self.clone();
        next.push_front(seq);
        next
    }

    fn push_front(&mut self, seq: &'a [Production]) {
        self.todo.extend(seq.iter().rev().map(Item::Prod));
    }

    /// Return the two successors of a repetition: one path which runs `body` once more and one
    /// which leaves the loop. Both start inside the loop's iteration context, which the
    /// [Item::ExitIteration] marker pops again.
    fn iterate(&self, sep: Option<&'a str>, body: &'a [Production]) -> (Self, Self) {
        let mut skip = self.clone();
        skip.todo.push(Item::ExitIteration);
        skip.in_iteration.push(true);
        let mut take = skip.clone();
        take.push_front(body);
        if let Some(sep) = sep {
            take.todo.push(Item::Key(sep));
        }
        (take, skip)
    }
}

/// Determine, for every key referenced in `definition`, whether it can occur more than once in a
/// single successful derivation.
///
/// Every possible path through the production tree is explored, with each repetition body taken
/// either once or not at all. A key is a collection if some path consumes it twice or consumes it
/// while inside a repetition. The result is the union over all paths, so exploration order has no
/// effect on it.
///
/// For the purposes of this analysis, a separated repetition `X (SEP X)*` is equivalent to
/// `(SEP X)*`, which is how it is explored.
pub fn build_is_collection(definition: &[Production]) -> ShapeMap {
    let mut result = referenced_keys(definition)
        .into_iter()
        .map(|k| (k.to_owned(), CstShape::None))
        .collect::<ShapeMap>();

    let mut start = PathState {
        todo: Vec::new(),
        in_iteration: Vec::new(),
        occurrences: HashMap::new(),
    };
    start.push_front(definition);
    let mut paths = vec![start];
    let mut explored = 0usize;

    while let Some(mut path) = paths.pop() {
        let item = match path.todo.pop() {
            Some(item) => item,
            None => {
                // A complete path (possibly an empty alternative).
                explored += 1;
                continue;
            }
        };
        match item {
            Item::ExitIteration => {
                path.in_iteration.pop();
                paths.push(path);
            }
            Item::Key(key) => {
                consume(&mut result, &mut path, key);
                paths.push(path);
            }
            Item::Prod(prod) => match prod {
                Production::Terminal(key) | Production::NonTerminal(key) => {
                    consume(&mut result, &mut path, key);
                    paths.push(path);
                }
                Production::Option(def) | Production::Flat(def) => {
                    path.push_front(def);
                    paths.push(path);
                }
                Production::Repetition(def) | Production::RepetitionMandatory(def) => {
                    let (take, skip) = path.iterate(None, def);
                    paths.push(take);
                    paths.push(skip);
                }
                Production::RepetitionWithSeparator {
                    definition,
                    separator,
                }
                | Production::RepetitionMandatoryWithSeparator {
                    definition,
                    separator,
                } => {
                    let (take, skip) = path.iterate(Some(separator.as_str()), definition);
                    paths.push(take);
                    paths.push(skip);
                }
                Production::Alternation(alts) => {
                    // Pushed in reverse so that alternatives are popped, and thus explored, in
                    // declaration order.
                    for alt in alts.iter().rev() {
                        paths.push(path.then(alt));
                    }
                }
            },
        }
    }

    debug!(
        "shape computed: {} keys, {} complete paths",
        result.len(),
        explored
    );
    result
}

fn consume<'a>(result: &mut ShapeMap, path: &mut PathState<'a>, key: &'a str) {
    let n = path.occurrences.entry(key).or_insert(0);
    *n += 1;
    if *n > 1 || path.in_iteration.last().copied().unwrap_or(false) {
        result.promote(key);
    }
}

/// Run [build_is_collection] independently on each rule, keyed by rule name.
pub fn build_is_collection_for_rules<'a, I>(rules: I) -> IndexMap<String, ShapeMap>
where
    I: IntoIterator<Item = &'a Rule>,
{
    rules
        .into_iter()
        .map(|r| {
            debug!("computing CST shape of rule '{}'", r.name);
            (r.name.clone(), build_is_collection(&r.definition))
        })
        .collect()
}
