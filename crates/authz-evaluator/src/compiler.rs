//! Program compilation
//!
//! A configuration compiles to an ordered list of prepared queries: the
//! generated base program first, then every override fragment.

use authz_core::{Context, Error, Result};
use authz_policy::{Criterion, CriterionRegistry, Generator};
use authz_rules::{DataStore, Engine, InputHook, MemoryStore, PrepareRequest, PreparedQuery, RuleEngine};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PolicyConfig;

/// Query every script is prepared with
pub const RESULT_QUERY: &str = "result = data.pomerium.policy";

/// Origin label of the generated program
pub const BASE_ORIGIN: &str = "base policy";

/// One script unit in source form
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub origin: String,
    pub source: String,
}

/// A prepared query and its position in evaluation order
#[derive(Clone)]
pub struct CompiledScript {
    pub index: usize,
    pub origin: String,
    pub query: Arc<dyn PreparedQuery>,
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("index", &self.index)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Compiles policy configurations with one engine, store, and hook
#[derive(Clone)]
pub struct ProgramCompiler {
    engine: Arc<dyn Engine>,
    store: Arc<dyn DataStore>,
    hook: Option<Arc<dyn InputHook>>,
    criteria: CriterionRegistry,
}

impl ProgramCompiler {
    /// A compiler using the given engine, an empty store, and the built-in
    /// criteria
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            store: Arc::new(MemoryStore::new()),
            hook: None,
            criteria: CriterionRegistry::with_defaults(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn InputHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Replace the criterion registry
    pub fn with_criteria(mut self, criteria: CriterionRegistry) -> Self {
        self.criteria = criteria;
        self
    }

    /// Register an additional criterion
    pub fn register(&mut self, criterion: Arc<dyn Criterion>) {
        self.criteria.register(criterion);
    }

    /// Render every script of a configuration, base program first
    pub fn scripts(&self, config: &PolicyConfig) -> Result<Vec<Script>> {
        let mut generator = Generator::new(self.criteria.clone());
        let module = generator.generate(&config.to_ppl())?;

        let mut scripts = vec![Script {
            origin: BASE_ORIGIN.to_string(),
            source: module.to_string(),
        }];
        scripts.extend(config.fragments().into_iter().map(|fragment| Script {
            origin: fragment.origin,
            source: fragment.source.to_string(),
        }));
        Ok(scripts)
    }

    /// Compile every script of a configuration
    pub fn compile(&self, ctx: &Context, config: &PolicyConfig) -> Result<Vec<CompiledScript>> {
        let scripts = self.scripts(config)?;
        let mut compiled = Vec::with_capacity(scripts.len());

        for (index, script) in scripts.into_iter().enumerate() {
            ctx.check()?;
            debug!(script = index, origin = %script.origin, "Compiling policy script");

            let request = PrepareRequest::new(script.origin.as_str(), script.source, RESULT_QUERY)
                .with_store(Arc::clone(&self.store))
                .with_hook(self.hook.clone());
            let query = self
                .engine
                .prepare(ctx, request)
                .map_err(|e| Error::script(index, script.origin.as_str(), e))?;

            compiled.push(CompiledScript {
                index,
                origin: script.origin,
                query,
            });
        }

        info!(scripts = compiled.len(), "Compiled policy scripts");
        Ok(compiled)
    }
}

impl Default for ProgramCompiler {
    fn default() -> Self {
        Self::new(Arc::new(RuleEngine::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_core::Phase;
    use authz_policy::{Condition, Policy, PolicyRule};
    use serde_json::json;

    fn config_with_fragments(fragments: &[&str]) -> PolicyConfig {
        PolicyConfig {
            allow_public_unauthenticated_access: true,
            sub_policies: vec![crate::config::SubPolicy {
                id: "ops".to_string(),
                name: String::new(),
                rego: fragments.iter().map(|s| s.to_string()).collect(),
            }],
            ..PolicyConfig::default()
        }
    }

    #[test]
    fn test_base_program_comes_first() {
        let compiler = ProgramCompiler::default();
        let config = config_with_fragments(&["package pomerium.policy\ndeny = [403, \"no\"]\n", ""]);

        let scripts = compiler.scripts(&config).unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].origin, BASE_ORIGIN);
        assert!(scripts[0].source.starts_with("package pomerium.policy\n\ndefault allow = false"));
        assert!(scripts[0].source.contains("accept_0 = true"));
        assert_eq!(scripts[1].origin, "sub-policy 'ops' fragment 0");

        let compiled = compiler.compile(&Context::background(), &config).unwrap();
        let indexes: Vec<usize> = compiled.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn test_each_compile_uses_a_fresh_generator() {
        let compiler = ProgramCompiler::default();
        let config = config_with_fragments(&[]);
        let first = compiler.scripts(&config).unwrap();
        let second = compiler.scripts(&config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_broken_fragment_is_wrapped_with_position() {
        let compiler = ProgramCompiler::default();
        let config = config_with_fragments(&["package pomerium.policy\nallow = true\n", "package pomerium.policy\nallow {\n"]);

        let err = compiler.compile(&Context::background(), &config).unwrap_err();
        assert_eq!(err.phase(), Phase::Construction);
        match err {
            Error::Script { index, origin, .. } => {
                assert_eq!(index, 2);
                assert_eq!(origin, "sub-policy 'ops' fragment 1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_fragment_is_compiled_and_rejected() {
        let compiler = ProgramCompiler::default();
        let config = config_with_fragments(&["", "  \n"]);

        let scripts = compiler.scripts(&config).unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[1].origin, "sub-policy 'ops' fragment 1");

        let err = compiler.compile(&Context::background(), &config).unwrap_err();
        assert_eq!(err.phase(), Phase::Construction);
        assert!(matches!(err, Error::Script { index: 1, .. }), "unexpected error: {err}");
    }

    #[test]
    fn test_unknown_criterion_blocks_compilation() {
        let config = PolicyConfig {
            policy: Policy::new(vec![
                PolicyRule::new("deny").with_or(vec![Condition::criterion("ip_blocked", json!(true))])
            ]),
            ..PolicyConfig::default()
        };
        let err = ProgramCompiler::default().compile(&Context::background(), &config).unwrap_err();
        assert!(matches!(err, Error::UnknownCriterion { .. }));
    }

    #[test]
    fn test_cancelled_context_stops_compilation() {
        let ctx = Context::background();
        ctx.token().cancel();
        let err = ProgramCompiler::default().compile(&ctx, &PolicyConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
