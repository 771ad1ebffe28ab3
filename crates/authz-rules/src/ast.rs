//! Rule language syntax tree
//!
//! A module is a package path plus an ordered list of rules. Several rules
//! may share a head name; together they form one logical rule, and every
//! definition whose body holds must agree on its value.

use serde_json::{Number, Value};
use std::fmt;

/// A package of rules, the unit of compilation
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Package path, e.g. `["pomerium", "policy"]`
    pub package: Vec<String>,

    /// Rules in emission order
    pub rules: Vec<Rule>,
}

/// A single rule definition
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// `default name = value` rules apply only when no other definition holds
    pub default: bool,

    pub head: Head,

    /// Conjunction of expressions, evaluated in order
    pub body: Vec<Expr>,

    /// Synthetic or parsed source position, used in diagnostics only
    pub location: Option<Location>,
}

/// A rule head: `name(args) = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    pub name: String,

    /// Positional parameters; non-empty for helper functions
    pub args: Vec<String>,

    /// Result value, `true` when omitted
    pub value: Option<Term>,
}

/// A position in rule source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub row: usize,
    pub col: usize,
}

/// One conjunct of a rule body
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Holds when the term is defined and not `false`
    Term(Term),

    /// Holds when the inner expression does not
    Not(Box<Expr>),

    /// `name := term`, binds a local variable
    Assign(String, Term),

    /// `left op right`
    Compare(CompareOp, Term, Term),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A value-producing term
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Term>),

    /// A local variable, a parameter, or a 0-arity rule of the module
    Var(String),

    /// A path into a variable, `input`, or `data`
    Ref(Ref),

    /// A helper-function rule or builtin call
    Call(String, Vec<Term>),
}

/// `head.field[index]...`
#[derive(Debug, Clone, PartialEq)]
pub struct Ref {
    pub head: String,
    pub path: Vec<Term>,
}

impl Module {
    /// Create an empty module for a dotted package path
    pub fn new(package: &str) -> Self {
        Self {
            package: package.split('.').map(str::to_string).collect(),
            rules: Vec::new(),
        }
    }

    /// The dotted package path
    pub fn package_path(&self) -> String {
        self.package.join(".")
    }

    /// Iterate over every definition with the given head name
    pub fn rules_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.head.name == name)
    }
}

impl Rule {
    /// A rule with the given head name, no value, and an empty body
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            default: false,
            head: Head {
                name: name.into(),
                args: Vec::new(),
                value: None,
            },
            body: Vec::new(),
            location: None,
        }
    }

    /// `default name = value`
    pub fn default_value(name: impl Into<String>, value: Term) -> Self {
        let mut rule = Self::new(name).with_value(value);
        rule.default = true;
        rule
    }

    pub fn with_value(mut self, value: Term) -> Self {
        self.head.value = Some(value);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.head.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn push(&mut self, expr: Expr) {
        self.body.push(expr);
    }

    pub fn name(&self) -> &str {
        &self.head.name
    }

    pub fn arity(&self) -> usize {
        self.head.args.len()
    }
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn int(value: i64) -> Self {
        Self::Number(Number::from(value))
    }

    /// `input.a.b`
    pub fn input<'a>(path: impl IntoIterator<Item = &'a str>) -> Self {
        Self::reference("input", path)
    }

    /// A ref with only field segments
    pub fn reference<'a>(head: &str, path: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Ref(Ref {
            head: head.to_string(),
            path: path.into_iter().map(Term::string).collect(),
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self::Call(name.into(), args)
    }

    /// Convert a JSON value to a literal term
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            Value::Object(_) => None,
        }
    }
}

impl Expr {
    /// `name := term`
    pub fn assign(name: impl Into<String>, term: Term) -> Self {
        Self::Assign(name.into(), term)
    }

    /// `not term`
    pub fn not(term: Term) -> Self {
        Self::Not(Box::new(Self::Term(term)))
    }

    pub fn eq(left: Term, right: Term) -> Self {
        Self::Compare(CompareOp::Eq, left, right)
    }

    pub fn ne(left: Term, right: Term) -> Self {
        Self::Compare(CompareOp::Ne, left, right)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        f.write_str(op)
    }
}
