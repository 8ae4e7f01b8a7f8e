// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rendering of a [`Configuration`] through the proxy config template.
//!
//! Templates bind the serialized field names of the configuration
//! aggregate: `Upstreams`, `Servers`, `StatusPort`, `DNSResolver`, and so on.

use crate::error::Result;
use crate::types::Configuration;
use minijinja::value::ValueKind;
use minijinja::{Environment, Output, State, UndefinedBehavior, Value};
use std::path::Path;
use tracing::info;

const BUILTIN: &str = include_str!("../../templates/nginx.conf.j2");

pub struct Template {
    env: Environment<'static>,
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_formatter(format_value);
        Self {
            env,
            source: source.into(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN)
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration template {}", path.display());
        let source = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(source))
    }

    pub fn render(&self, conf: &Configuration) -> Result<String> {
        Ok(self.env.render_str(&self.source, conf)?)
    }
}

/// Booleans print as `true`/`false`, the spelling proxy configs expect
fn format_value(
    out: &mut Output<'_>,
    state: &State<'_, '_>,
    value: &Value,
) -> std::result::Result<(), minijinja::Error> {
    if value.kind() == ValueKind::Bool {
        out.write_str(if value.is_true() { "true" } else { "false" })?;
        return Ok(());
    }
    minijinja::escape_formatter(out, state, value)
}
