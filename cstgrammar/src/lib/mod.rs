#![allow(clippy::new_without_default)]

//! Static analysis of grammar productions for concrete syntax tree (CST) construction.
//!
//! A parser that builds a CST allocates one node per rule invocation, and each node has one
//! named child slot per terminal or non-terminal the rule references. Before any parsing happens,
//! this crate works out whether each slot holds a single value or an ordered collection:
//!
//!   * A key which can be consumed at most once in any single derivation of a rule is
//!     [CstShape::None].
//!   * A key which can be consumed more than once (because it appears twice in a sequence, or
//!     anywhere inside a repetition) is [CstShape::Collection].
//!
//! For example, given a rule `r: A B A` and a rule `s: A (B)*`, `A` is a collection in `r` but
//! not in `s`, and `B` is a collection in `s` but not in `r`.
//!
//! Shapes are computed once per rule with [build_is_collection] (or for a whole grammar with
//! [GrammarShapes]) and then used, without recomputation, by the [cst] builder functions during
//! every parse.

pub mod analysis;
pub mod cst;
pub mod prod;
pub mod shape;

pub use crate::{
    analysis::{Analysis, GrammarShapes},
    cst::{
        CstChild, CstElement, CstNode, CstToken, DefaultToken, add_nonterminal_to_cst,
        add_terminal_to_cst, init_children_dictionary,
    },
    prod::{Grammar, Production, Rule},
    shape::{CstShape, ShapeMap, build_is_collection, build_is_collection_for_rules},
};
