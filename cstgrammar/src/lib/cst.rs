use std::fmt;

use indexmap::IndexMap;
use log::warn;

use crate::shape::{CstShape, ShapeMap};

/// A token that can be stored in a CST. The token's class name is the key under which it is
/// recorded in its parent node.
pub trait CstToken: fmt::Debug {
    fn token_class(&self) -> &str;
}

/// A convenience token type: a class name, the matched text, and its byte offset in the input.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DefaultToken {
    class: String,
    image: String,
    start: usize,
}

impl DefaultToken {
    pub fn new(class: &str, image: &str, start: usize) -> Self {
        DefaultToken {
            class: class.to_owned(),
            image: image.to_owned(),
            start,
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn start(&self) -> usize {
        self.start
    }
}

impl CstToken for DefaultToken {
    fn token_class(&self) -> &str {
        &self.class
    }
}

impl fmt::Display for DefaultToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {:?}@{}", self.class, self.image, self.start)
    }
}

/// Either a token or a nested node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CstElement<T> {
    Token(T),
    Node(CstNode<T>),
}

/// The contents of a single child slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CstChild<T> {
    Single(CstElement<T>),
    /// Elements in the order they were matched.
    Collection(Vec<CstElement<T>>),
}

impl<T> CstChild<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, CstElement<T>> {
        match self {
            CstChild::Single(e) => std::slice::from_ref(e).iter(),
            CstChild::Collection(es) => es.iter(),
        }
    }
}

pub type CstChildren<T> = IndexMap<String, CstChild<T>>;

/// One node per rule invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CstNode<T> {
    pub name: String,
    pub children: CstChildren<T>,
}

/// Create the children of a fresh node: every collection key starts as an empty collection; every
/// other key is absent until it is first written.
pub fn init_children_dictionary<T>(shape: &ShapeMap) -> CstChildren<T> {
    shape
        .iter()
        .filter(|(_, s)| *s == CstShape::Collection)
        .map(|(k, _)| (k.to_owned(), CstChild::Collection(Vec::new())))
        .collect()
}

/// Record `token` in `node` under its class name. `is_collection` must be the key's
/// classification in the rule's [ShapeMap].
pub fn add_terminal_to_cst<T: CstToken>(node: &mut CstNode<T>, token: T, is_collection: bool) {
    let key = token.token_class().to_owned();
    node.add(key, CstElement::Token(token), is_collection);
}

/// Record `child` in `node` under the child's rule name. `is_collection` must be the key's
/// classification in the rule's [ShapeMap].
pub fn add_nonterminal_to_cst<T>(node: &mut CstNode<T>, child: CstNode<T>, is_collection: bool) {
    let key = child.name.clone();
    node.add(key, CstElement::Node(child), is_collection);
}

impl<T> CstNode<T> {
    /// Create an empty node for rule `name` with shape `shape`.
    pub fn new(name: &str, shape: &ShapeMap) -> Self {
        CstNode {
            name: name.to_owned(),
            children: init_children_dictionary(shape),
        }
    }

    fn add(&mut self, key: String, elem: CstElement<T>, is_collection: bool) {
        if is_collection {
            match self.children.get_mut(&key) {
                Some(CstChild::Collection(es)) => es.push(elem),
                Some(c @ CstChild::Single(_)) => {
                    // Only possible if the caller's flags disagree with the shape analysis.
                    warn!("'{}' in '{}' was a single value", key, self.name);
                    let prev = std::mem::replace(c, CstChild::Collection(Vec::new()));
                    if let CstChild::Single(e) = prev {
                        *c = CstChild::Collection(vec![e, elem]);
                    }
                }
                None => {
                    self.children.insert(key, CstChild::Collection(vec![elem]));
                }
            }
        } else if self
            .children
            .insert(key.clone(), CstChild::Single(elem))
            .is_some()
        {
            warn!("'{}' in '{}' written more than once", key, self.name);
        }
    }

    pub fn child(&self, key: &str) -> Option<&CstChild<T>> {
        self.children.get(key)
    }

    /// All tokens recorded under `key`, in match order.
    pub fn tokens(&self, key: &str) -> impl Iterator<Item = &T> {
        self.children
            .get(key)
            .into_iter()
            .flat_map(|c| c.iter())
            .filter_map(|e| match e {
                CstElement::Token(t) => Some(t),
                CstElement::Node(_) => None,
            })
    }

    /// All nodes recorded under `key`, in match order.
    pub fn nodes(&self, key: &str) -> impl Iterator<Item = &CstNode<T>> {
        self.children
            .get(key)
            .into_iter()
            .flat_map(|c| c.iter())
            .filter_map(|e| match e {
                CstElement::Node(n) => Some(n),
                CstElement::Token(_) => None,
            })
    }
}

impl<T: fmt::Display> CstNode<T> {
    /// Return a pretty-printed version of this node.
    pub fn pp(&self) -> String {
        let mut s = format!("{}\n", self.name);
        let mut st = self.rev_elements(1).collect::<Vec<_>>(); // Stack of (indent, key, element)
        while let Some((indent, key, e)) = st.pop() {
            for _ in 0..indent {
                s.push(' ');
            }
            s.push_str(key);
            s.push_str(": ");
            match e {
                CstElement::Token(t) => s.push_str(&t.to_string()),
                CstElement::Node(n) => {
                    s.push_str(&n.name);
                    st.extend(n.rev_elements(indent + 1));
                }
            }
            s.push('\n');
        }
        s
    }

    /// Every child element with its key, last first, so that pushing them onto a stack pops them
    /// in match order.
    fn rev_elements(&self, indent: usize) -> impl Iterator<Item = (usize, &str, &CstElement<T>)> {
        self.children
            .iter()
            .rev()
            .flat_map(move |(k, c)| c.iter().rev().map(move |e| (indent, k.as_str(), e)))
    }
}
