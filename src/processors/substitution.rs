//! `${...}` substitution from the tenant profile and the process environment.
//!
//! # Responsibilities
//! - Flatten the tenant profile document into `a.b[0].c` style variables
//! - Resolve variables that reference other variables, bounded by a pass limit
//! - Replace placeholders in every other document of the tenant
//! - Reprocess the whole tenant when its profile changes
//!
//! # Design Decisions
//! - Profile variables override environment variables of the same name
//! - A placeholder is only replaced by a fully resolved value; unknown or
//!   cyclic references stay in the document verbatim
//! - The environment is captured once at construction, filtered by a blacklist

use dashmap::DashMap;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::config::ProcessorConfig;
use crate::model::{Configuration, COMMONS_TENANT};
use crate::processors::format::DocumentFormat;
use crate::processors::{ProcessContext, ProcessOutput, Processor, ProcessorError};

const PRIORITY: i32 = 20;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^${}]+)\}").expect("Invalid placeholder regex"));

type Variables = BTreeMap<String, String>;

#[derive(Debug)]
pub struct SubstitutionProcessor {
    profile_file: String,
    environment: Variables,
    max_passes: usize,
    /// The environment resolved against itself, for tenants without a profile.
    defaults: Arc<Variables>,
    /// Tenant → resolved variables from its last processed profile.
    variables: DashMap<String, Arc<Variables>>,
}

impl SubstitutionProcessor {
    /// Build from settings, snapshotting the current process environment.
    pub fn from_config(config: &ProcessorConfig) -> Self {
        let environment = std::env::vars()
            .filter(|(name, _)| {
                !config
                    .env_blacklist
                    .iter()
                    .any(|blocked| blocked.eq_ignore_ascii_case(name))
            })
            .collect();
        Self::with_environment(
            config.profile_file.clone(),
            environment,
            config.max_substitution_passes,
        )
    }

    /// Build with an explicit environment.
    pub fn with_environment(
        profile_file: impl Into<String>,
        environment: Variables,
        max_passes: usize,
    ) -> Self {
        let defaults = Arc::new(resolve(environment.clone(), max_passes));
        Self {
            profile_file: profile_file.into(),
            environment,
            max_passes,
            defaults,
            variables: DashMap::new(),
        }
    }

    /// Resolved variables currently known for `tenant`.
    pub fn variables_of(&self, tenant: &str) -> Arc<Variables> {
        self.variables
            .get(tenant)
            .map(|vars| Arc::clone(vars.value()))
            .unwrap_or_else(|| Arc::clone(&self.defaults))
    }

    fn is_profile(&self, doc: &Configuration, ctx: &ProcessContext<'_>) -> bool {
        doc.path() == ctx.tenant_path(&self.profile_file)
    }

    fn load_profile(
        &self,
        doc: &Configuration,
        ctx: &ProcessContext<'_>,
    ) -> Result<(), ProcessorError> {
        if doc.is_blank() {
            self.variables.remove(ctx.tenant);
            return Ok(());
        }
        let format = DocumentFormat::from_path(doc.path()).unwrap_or(DocumentFormat::Yaml);
        let profile = format.parse(doc.path(), doc.content())?;

        let mut vars = self.environment.clone();
        flatten("", &profile, &mut vars);
        let resolved = resolve(vars, self.max_passes);
        tracing::debug!(
            tenant = %ctx.tenant,
            variables = resolved.len(),
            "Loaded tenant profile"
        );
        self.variables
            .insert(ctx.tenant.to_string(), Arc::new(resolved));
        Ok(())
    }
}

impl Processor for SubstitutionProcessor {
    fn name(&self) -> &'static str {
        "substitution"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn supports(&self, doc: &Configuration) -> bool {
        doc.path().ends_with(&format!("/{}", self.profile_file)) || doc.content().contains("${")
    }

    fn process(
        &self,
        doc: &Configuration,
        ctx: &ProcessContext<'_>,
    ) -> Result<ProcessOutput, ProcessorError> {
        if ctx.tenant == COMMONS_TENANT {
            return Ok(ProcessOutput::none());
        }

        if self.is_profile(doc, ctx) {
            self.load_profile(doc, ctx)?;
            let mut output = ProcessOutput::none();
            if ctx.changed {
                output.reprocess = ctx
                    .in_memory
                    .keys()
                    .filter(|path| path.as_str() != doc.path())
                    .cloned()
                    .collect();
            }
            return Ok(output);
        }

        if doc.is_blank() {
            return Ok(ProcessOutput::none());
        }
        let vars = self.variables_of(ctx.tenant);
        let content = substitute(doc.content(), &vars);
        if content == doc.content() {
            return Ok(ProcessOutput::none());
        }
        Ok(ProcessOutput::rewrite(Configuration::new(doc.path(), content)))
    }
}

/// Substitute variables into each other until nothing changes or the pass
/// limit is reached.
fn resolve(mut vars: Variables, max_passes: usize) -> Variables {
    for _ in 0..max_passes {
        let snapshot = vars.clone();
        let mut progressed = false;
        for value in vars.values_mut() {
            let next = substitute(value, &snapshot);
            if next != *value {
                *value = next;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    vars
}

/// Replace every placeholder whose variable has a fully resolved value.
fn substitute(text: &str, vars: &Variables) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match vars.get(caps[1].trim()) {
            Some(value) if !PLACEHOLDER.is_match(value) => value.clone(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Flatten a profile into dotted / indexed keys.
fn flatten(prefix: &str, value: &Value, out: &mut Variables) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&format!("{prefix}[{index}]"), child, out);
            }
        }
        Value::Null => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), String::new());
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
