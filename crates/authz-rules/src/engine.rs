//! Evaluation engine contract and the Rego engine
//!
//! An engine turns one script plus one query into a prepared query. A
//! prepared query is immutable and answers any number of concurrent
//! executions, each against its own input document and a snapshot of the
//! data store taken when the execution starts.

use authz_core::{Context, Error, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::print::is_identifier;
use crate::store::{DataStore, MemoryStore};

/// Per-deployment augmentation of the input document, applied before every
/// execution of a prepared query
pub trait InputHook: Send + Sync {
    fn augment(&self, input: &mut Value) -> Result<()>;
}

/// Variable bindings of one query solution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub bindings: Map<String, Value>,
}

impl ResultSet {
    /// The value bound to `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

/// A compiled script ready for execution
pub trait PreparedQuery: Send + Sync {
    /// Execute against `input`, returning every solution
    fn eval(&self, ctx: &Context, input: &Value) -> Result<Vec<ResultSet>>;
}

impl fmt::Debug for dyn PreparedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedQuery").finish_non_exhaustive()
    }
}

/// Compiles scripts into prepared queries
pub trait Engine: Send + Sync {
    fn prepare(&self, ctx: &Context, request: PrepareRequest) -> Result<Arc<dyn PreparedQuery>>;
}

/// Everything an engine needs to prepare one script
#[derive(Clone)]
pub struct PrepareRequest {
    /// Logical module name, used in diagnostics
    pub module_name: String,

    /// Rego source
    pub source: String,

    /// Query of the form `<var> = data.<path>`
    pub query: String,

    pub store: Arc<dyn DataStore>,

    pub hook: Option<Arc<dyn InputHook>>,
}

impl PrepareRequest {
    /// A request with an empty store and no hook
    pub fn new(module_name: impl Into<String>, source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            source: source.into(),
            query: query.into(),
            store: Arc::new(MemoryStore::new()),
            hook: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_hook(mut self, hook: Option<Arc<dyn InputHook>>) -> Self {
        self.hook = hook;
        self
    }
}

impl fmt::Debug for PrepareRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrepareRequest")
            .field("module_name", &self.module_name)
            .field("query", &self.query)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Evaluates Rego programs with `regorus`
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for RuleEngine {
    fn prepare(&self, ctx: &Context, request: PrepareRequest) -> Result<Arc<dyn PreparedQuery>> {
        ctx.check()?;
        check_query(&request.query)?;

        let mut engine = regorus::Engine::new();
        engine
            .add_policy(request.module_name.clone(), request.source)
            .map_err(|e| Error::compile(format!("{}: {e}", request.module_name)))?;

        let query = RegoQuery {
            template: Mutex::new(engine),
            query: request.query,
            store: request.store,
            hook: request.hook,
        };

        // Unsafe variables and other semantic errors only surface once the
        // module is evaluated, so run it against an undefined input.
        query
            .execute(None, |message| Error::compile(message))
            .map_err(|e| match e {
                Error::Compile(message) => Error::compile(format!("{}: {message}", request.module_name)),
                other => other,
            })?;
        ctx.check()?;

        debug!(
            module = %request.module_name,
            query = %query.query,
            "Prepared rule module"
        );
        Ok(Arc::new(query))
    }
}

/// Accept only queries binding one variable, `<var> = <term>`
fn check_query(query: &str) -> Result<()> {
    let supported = match query.split_once('=') {
        Some((variable, target)) => {
            is_identifier(variable.trim()) && !target.starts_with('=') && !target.trim().is_empty()
        }
        None => false,
    };
    if supported {
        Ok(())
    } else {
        Err(Error::compile(format!(
            "unsupported query '{query}', expected '<var> = data.<path>'"
        )))
    }
}

struct RegoQuery {
    /// Engine holding the parsed module; cloned for every execution
    template: Mutex<regorus::Engine>,
    query: String,
    store: Arc<dyn DataStore>,
    hook: Option<Arc<dyn InputHook>>,
}

impl RegoQuery {
    fn execute(&self, input: Option<&Value>, fail: fn(String) -> Error) -> Result<Vec<ResultSet>> {
        let mut engine = self.template.lock().clone();

        let data = self.store.get(&[]).unwrap_or_else(|| Value::Object(Map::new()));
        engine
            .add_data(to_rego(&data, fail)?)
            .map_err(|e| fail(format!("invalid data document: {e}")))?;
        if let Some(input) = input {
            engine.set_input(to_rego(input, fail)?);
        }

        let results = engine
            .eval_query(self.query.clone(), false)
            .map_err(|e| fail(e.to_string()))?;

        results
            .result
            .iter()
            .map(|result| -> Result<ResultSet> {
                let json = result.bindings.to_json_str().map_err(|e| fail(e.to_string()))?;
                let bindings = serde_json::from_str(&json)?;
                Ok(ResultSet { bindings })
            })
            .collect()
    }
}

impl PreparedQuery for RegoQuery {
    fn eval(&self, ctx: &Context, input: &Value) -> Result<Vec<ResultSet>> {
        ctx.check()?;

        let results = match &self.hook {
            Some(hook) => {
                let mut document = input.clone();
                hook.augment(&mut document)?;
                self.execute(Some(&document), |message| Error::eval(message))?
            }
            None => self.execute(Some(input), |message| Error::eval(message))?,
        };

        ctx.check()?;
        if results.is_empty() {
            debug!(query = %self.query, "Query produced no result");
        }
        Ok(results)
    }
}

fn to_rego(value: &Value, fail: fn(String) -> Error) -> Result<regorus::Value> {
    let json = serde_json::to_string(value)?;
    regorus::Value::from_json_str(&json).map_err(|e| fail(e.to_string()))
}
