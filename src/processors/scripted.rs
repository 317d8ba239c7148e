//! Adapter running an external script engine as a chain processor.

use std::fmt;

use crate::model::Configuration;
use crate::processors::{ProcessContext, ProcessOutput, Processor, ProcessorError};

const DEFAULT_PRIORITY: i32 = 100;

/// External scripting engine. `enter` and `exit` bracket every `execute`
/// call with the tenant's execution context.
pub trait ScriptEngine: Send + Sync {
    fn supports(&self, doc: &Configuration) -> bool;

    fn enter(&self, tenant: &str);

    fn exit(&self, tenant: &str);

    fn execute(
        &self,
        doc: &Configuration,
        ctx: &ProcessContext<'_>,
    ) -> Result<ProcessOutput, String>;
}

/// Calls `exit` when dropped, so the context is left on every return path.
struct TenantScope<'e, E: ScriptEngine + ?Sized> {
    engine: &'e E,
    tenant: &'e str,
}

impl<'e, E: ScriptEngine + ?Sized> TenantScope<'e, E> {
    fn enter(engine: &'e E, tenant: &'e str) -> Self {
        engine.enter(tenant);
        Self { engine, tenant }
    }
}

impl<E: ScriptEngine + ?Sized> Drop for TenantScope<'_, E> {
    fn drop(&mut self) {
        self.engine.exit(self.tenant);
    }
}

pub struct ScriptedProcessor<E> {
    name: &'static str,
    priority: i32,
    engine: E,
}

impl<E: ScriptEngine> ScriptedProcessor<E> {
    pub fn new(name: &'static str, engine: E) -> Self {
        Self {
            name,
            priority: DEFAULT_PRIORITY,
            engine,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E> fmt::Debug for ScriptedProcessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedProcessor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl<E: ScriptEngine> Processor for ScriptedProcessor<E> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn supports(&self, doc: &Configuration) -> bool {
        self.engine.supports(doc)
    }

    fn process(
        &self,
        doc: &Configuration,
        ctx: &ProcessContext<'_>,
    ) -> Result<ProcessOutput, ProcessorError> {
        let _scope = TenantScope::enter(&self.engine, ctx.tenant);
        self.engine
            .execute(doc, ctx)
            .map_err(|message| ProcessorError::Engine {
                path: doc.path().to_string(),
                message,
            })
    }
}
