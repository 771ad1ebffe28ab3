//! Policy evaluation
//!
//! Every compiled script is queried in order and its `allow`/`deny` values
//! are merged into one verdict. Any later script that produces a denial
//! replaces an earlier one; `allow` is the disjunction of all scripts.

use authz_core::{Context, Denial, Error, PolicyInput, PolicyOutput, Result};
use authz_rules::{DataStore, ResultSet};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::compiler::{CompiledScript, ProgramCompiler};
use crate::config::PolicyConfig;

/// Evaluates requests against one loaded policy configuration.
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    scripts: Arc<[CompiledScript]>,
}

impl PolicyEvaluator {
    /// Compile a configuration with the Rego engine
    pub fn new(ctx: &Context, config: &PolicyConfig, store: Arc<dyn DataStore>) -> Result<Self> {
        let compiler = ProgramCompiler::default().with_store(store);
        Self::with_compiler(ctx, &compiler, config)
    }

    /// Compile a configuration with a custom compiler
    pub fn with_compiler(ctx: &Context, compiler: &ProgramCompiler, config: &PolicyConfig) -> Result<Self> {
        let scripts = compiler.compile(ctx, config)?;
        info!(scripts = scripts.len(), "Policy evaluator ready");
        Ok(Self::from_scripts(scripts))
    }

    /// Wrap already compiled scripts, evaluated in the given order
    pub fn from_scripts(scripts: Vec<CompiledScript>) -> Self {
        Self {
            scripts: scripts.into(),
        }
    }

    pub fn scripts(&self) -> &[CompiledScript] {
        &self.scripts
    }

    /// Evaluate a request.
    ///
    /// Fails if any script fails to execute or yields no result; callers
    /// should treat failure as a denial.
    pub fn evaluate(&self, ctx: &Context, input: &PolicyInput) -> Result<PolicyOutput> {
        let started = Instant::now();
        metrics::counter!("authz_policy_evaluations_total").increment(1);

        let result = input
            .to_document()
            .and_then(|document| self.evaluate_document(ctx, &document));

        metrics::histogram!("authz_policy_evaluation_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(output) if output.deny.is_some() => {
                metrics::counter!("authz_policy_denials_total").increment(1);
            }
            Ok(_) => {}
            Err(e) => {
                metrics::counter!("authz_policy_evaluation_errors_total", "phase" => e.phase().as_str()).increment(1);
            }
        }
        result
    }

    /// Evaluate a raw input document
    pub fn evaluate_document(&self, ctx: &Context, document: &Value) -> Result<PolicyOutput> {
        let mut output = PolicyOutput::new();

        for script in self.scripts.iter() {
            ctx.check()?;
            let results = script
                .query
                .eval(ctx, document)
                .map_err(|e| Error::query(script.index, e))?;
            let first = results
                .first()
                .ok_or_else(|| Error::query(script.index, Error::EmptyResult { index: script.index }))?;

            let partial = script_output(script.index, first);
            debug!(
                script = script.index,
                origin = %script.origin,
                allow = partial.allow,
                deny = partial.deny.is_some(),
                "Evaluated policy script"
            );
            output = output.merge(&partial);
        }

        Ok(output)
    }
}

fn script_output(index: usize, result: &ResultSet) -> PolicyOutput {
    let value = result.get("result");
    PolicyOutput {
        allow: get_allow(value),
        deny: get_deny(index, value),
    }
}

/// `result.allow` when it is a boolean, otherwise `false`
fn get_allow(value: Option<&Value>) -> bool {
    value
        .and_then(|v| v.get("allow"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// `result.deny` when it is a `[status, message]` pair with an integer-like
/// status
fn get_deny(index: usize, value: Option<&Value>) -> Option<Denial> {
    let pair = value?.get("deny")?.as_array()?;
    let [status, message] = pair.as_slice() else {
        return None;
    };

    match stringify(status).parse::<i64>() {
        Ok(status) => Some(Denial::new(status, stringify(message))),
        Err(e) => {
            warn!(script = index, status = %status, error = %e, "Ignoring denial with invalid status");
            None
        }
    }
}

/// Strings as-is, everything else in JSON form
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
