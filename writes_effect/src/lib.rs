//! Component L: the writes-effect evaluator.
//!
//! A static over-approximation of which column key-ids a task writes,
//! computed without running the task — used to short-circuit
//! schema-delta bookkeeping and to answer "could this node possibly
//! touch key K" questions ahead of execution.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

/// A writes-effect expression, as declared on a `TaskSpec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritesExpr {
    Keys(Vec<u32>),
    FromParam(String),
    SwitchEnum {
        param: String,
        cases: Vec<(String, WritesExpr)>,
    },
    Union(Vec<WritesExpr>),
}

/// What a param name is bound to in the evaluation environment `γ`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// `FromParam` resolves to a concrete key-id.
    KeyId(u32),
    /// `SwitchEnum`'s discriminant resolves to a case name.
    CaseName(String),
}

/// The evaluation environment: a subset of a node's resolved
/// parameters relevant to its writes-effect expression.
#[derive(Debug, Clone, Default)]
pub struct Env(BTreeMap<String, Binding>);

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, param: impl Into<String>, binding: Binding) -> Self {
        self.0.insert(param.into(), binding);
        self
    }

    fn get(&self, param: &str) -> Option<&Binding> {
        self.0.get(param)
    }
}

/// The three possible precision levels of an evaluated effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// The exact, unique set of keys written.
    Exact,
    /// One of a known, bounded set of possibilities.
    May,
    /// Not statically determinable.
    Unknown,
}

/// The result of evaluating a [`WritesExpr`] against an [`Env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectResult {
    pub kind: EffectKind,
    /// Sorted, deduplicated. Empty (and meaningless) when `kind` is
    /// `Unknown`.
    pub keys: Vec<u32>,
}

impl EffectResult {
    fn exact(keys: BTreeSet<u32>) -> Self {
        Self {
            kind: EffectKind::Exact,
            keys: keys.into_iter().collect(),
        }
    }

    fn may(keys: BTreeSet<u32>) -> Self {
        Self {
            kind: EffectKind::May,
            keys: keys.into_iter().collect(),
        }
    }

    fn unknown() -> Self {
        Self {
            kind: EffectKind::Unknown,
            keys: Vec::new(),
        }
    }

    /// Canonical JSON form, stable under reordering of the
    /// expression's `Keys`/`Union`/`SwitchEnum` sub-parts (since
    /// `keys` is already sorted and deduplicated by construction).
    pub fn canonical_json(&self) -> String {
        let kind = match self.kind {
            EffectKind::Exact => "Exact",
            EffectKind::May => "May",
            EffectKind::Unknown => "Unknown",
        };
        json!({ "kind": kind, "keys": self.keys }).to_string()
    }
}

/// Evaluate `expr` against the binding environment `γ`.
pub fn eval(expr: &WritesExpr, env: &Env) -> EffectResult {
    match expr {
        WritesExpr::Keys(keys) => EffectResult::exact(keys.iter().copied().collect()),

        WritesExpr::FromParam(param) => match env.get(param) {
            Some(Binding::KeyId(key)) => EffectResult::exact(std::iter::once(*key).collect()),
            _ => EffectResult::unknown(),
        },

        WritesExpr::SwitchEnum { param, cases } => match env.get(param) {
            Some(Binding::CaseName(name)) => {
                if let Some((_, case_expr)) = cases.iter().find(|(case_name, _)| case_name == name) {
                    eval(case_expr, env)
                } else {
                    EffectResult::unknown()
                }
            }
            _ => {
                let results: Vec<EffectResult> = cases.iter().map(|(_, e)| eval(e, env)).collect();
                if results.iter().any(|r| r.kind == EffectKind::Unknown) {
                    EffectResult::unknown()
                } else {
                    let union: BTreeSet<u32> = results.into_iter().flat_map(|r| r.keys).collect();
                    EffectResult::may(union)
                }
            }
        },

        WritesExpr::Union(exprs) => {
            let results: Vec<EffectResult> = exprs.iter().map(|e| eval(e, env)).collect();
            if results.iter().any(|r| r.kind == EffectKind::Unknown) {
                return EffectResult::unknown();
            }
            let all_exact = results.iter().all(|r| r.kind == EffectKind::Exact);
            let union: BTreeSet<u32> = results.into_iter().flat_map(|r| r.keys).collect();
            if all_exact {
                EffectResult::exact(union)
            } else {
                EffectResult::may(union)
            }
        }
    }
}

/// Canonical JSON serialisation of the expression itself (not its
/// evaluation), used when digesting a task spec. `Keys` are sorted
/// and deduplicated, `SwitchEnum` cases are emitted as a JSON object
/// so they sort alphabetically by case name, and object keys sort
/// alphabetically throughout (both guaranteed by `serde_json`'s
/// default `BTreeMap`-backed `Map`).
pub fn canonical_json(expr: &WritesExpr) -> String {
    to_value(expr).to_string()
}

fn to_value(expr: &WritesExpr) -> Value {
    match expr {
        WritesExpr::Keys(keys) => {
            let sorted: BTreeSet<u32> = keys.iter().copied().collect();
            json!({ "Keys": sorted.into_iter().collect::<Vec<_>>() })
        }
        WritesExpr::FromParam(param) => json!({ "FromParam": param }),
        WritesExpr::SwitchEnum { param, cases } => {
            let cases_obj: BTreeMap<String, Value> =
                cases.iter().map(|(name, expr)| (name.clone(), to_value(expr))).collect();
            json!({ "SwitchEnum": { "param": param, "cases": cases_obj } })
        }
        WritesExpr::Union(exprs) => {
            json!({ "Union": exprs.iter().map(to_value).collect::<Vec<_>>() })
        }
    }
}
