//! The parsed form of a permission rule string.
//!
//! `"is owner AND NOT is banned"` becomes
//! `And(Check("is owner"), Not(Check("is banned")))`.  Parsing lives in
//! warden-policy; this module only holds the tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A boolean combination of named checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleExpr {
    Check(String),
    And(Box<RuleExpr>, Box<RuleExpr>),
    Or(Box<RuleExpr>, Box<RuleExpr>),
    Not(Box<RuleExpr>),
}

impl RuleExpr {
    pub fn check(name: impl Into<String>) -> Self {
        RuleExpr::Check(name.into())
    }

    pub fn and(self, right: RuleExpr) -> Self {
        RuleExpr::And(Box::new(self), Box::new(right))
    }

    pub fn or(self, right: RuleExpr) -> Self {
        RuleExpr::Or(Box::new(self), Box::new(right))
    }

    pub fn negate(self) -> Self {
        RuleExpr::Not(Box::new(self))
    }

    /// Every check name referenced by the rule, left to right, with repeats.
    pub fn check_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RuleExpr::Check(name) => out.push(name),
            RuleExpr::And(left, right) | RuleExpr::Or(left, right) => {
                left.collect_names(out);
                right.collect_names(out);
            }
            RuleExpr::Not(inner) => inner.collect_names(out),
        }
    }

    /// Nesting depth; a bare check has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            RuleExpr::Check(_) => 1,
            RuleExpr::And(left, right) | RuleExpr::Or(left, right) => {
                1 + left.depth().max(right.depth())
            }
            RuleExpr::Not(inner) => 1 + inner.depth(),
        }
    }
}

/// Fully parenthesized form; re-parses to the same tree.
impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleExpr::Check(name) => f.write_str(name),
            RuleExpr::And(left, right) => write!(f, "({} AND {})", left, right),
            RuleExpr::Or(left, right) => write!(f, "({} OR {})", left, right),
            RuleExpr::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}
