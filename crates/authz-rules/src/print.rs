//! Render a syntax tree back to rule-language source

use std::fmt;

use crate::ast::{Expr, Module, Ref, Rule, Term};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "package {}", self.package_path())?;
        for rule in &self.rules {
            write!(f, "\n\n{rule}")?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.default {
            f.write_str("default ")?;
        }
        f.write_str(&self.head.name)?;
        if !self.head.args.is_empty() {
            write!(f, "({})", self.head.args.join(", "))?;
        }
        match (&self.head.value, self.body.is_empty()) {
            (Some(value), _) => write!(f, " = {value}")?,
            // a bare head with neither value nor body would not parse back
            (None, true) => f.write_str(" = true")?,
            (None, false) => {}
        }
        if !self.body.is_empty() {
            f.write_str(" {")?;
            for expr in &self.body {
                write!(f, "\n\t{expr}")?;
            }
            f.write_str("\n}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => write!(f, "{term}"),
            Self::Not(inner) => write!(f, "not {inner}"),
            Self::Assign(name, term) => write!(f, "{name} := {term}"),
            Self::Compare(op, left, right) => write!(f, "{left} {op} {right}"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write_string(f, s),
            Self::Array(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            Self::Var(name) => f.write_str(name),
            Self::Ref(r) => write!(f, "{r}"),
            Self::Call(name, args) => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.head)?;
        for segment in &self.path {
            match segment {
                Term::String(s) if is_identifier(s) => write!(f, ".{s}")?,
                other => write!(f, "[{other}]")?,
            }
        }
        Ok(())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    // JSON escaping is a subset of what the rule language accepts
    match serde_json::to_string(s) {
        Ok(quoted) => f.write_str(&quoted),
        Err(_) => Err(fmt::Error),
    }
}

const KEYWORDS: &[&str] = &[
    "as", "contains", "default", "else", "every", "false", "if", "import", "in", "not", "null", "package", "some",
    "true", "with",
];

/// Whether `s` is reserved by the rule language
pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// Whether `s` can be written as a bare identifier
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(s)
}
