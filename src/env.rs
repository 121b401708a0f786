// src/env.rs

//! Deployment environment predicate.
//!
//! The environment is resolved once per process from `DEVPIPE_ENV` and never
//! changes afterwards. It only gates pipeline stages; the task graph looks the
//! same in every environment.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::Deserialize;

/// Process-wide variable selecting the environment.
pub const ENV_VAR: &str = "DEVPIPE_ENV";

static RESOLVED: OnceLock<Environment> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Resolve the environment for this process.
    ///
    /// The first call reads `DEVPIPE_ENV`; every later call returns the same
    /// value even if the variable changes.
    pub fn resolve() -> Environment {
        *RESOLVED.get_or_init(|| {
            let value = std::env::var(ENV_VAR).ok();
            Environment::from_selector(value.as_deref())
        })
    }

    /// Map the raw selector value onto an environment.
    ///
    /// Only `production` selects production; anything else, including an
    /// absent variable, is development.
    pub fn from_selector(value: Option<&str>) -> Environment {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    /// Return `effect` only if this environment is `env`.
    pub fn when<T>(self, env: Environment, effect: T) -> Option<T> {
        (self == env).then_some(effect)
    }

    /// Return `effect` only if this environment is not `env`.
    pub fn unless<T>(self, env: Environment, effect: T) -> Option<T> {
        (self != env).then_some(effect)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "invalid environment: {other} (expected \"development\" or \"production\")"
            )),
        }
    }
}

/// `when(env, effect)` against the process environment.
pub fn when<T>(env: Environment, effect: T) -> Option<T> {
    Environment::resolve().when(env, effect)
}

/// `unless(env, effect)` against the process environment.
pub fn unless<T>(env: Environment, effect: T) -> Option<T> {
    Environment::resolve().unless(env, effect)
}

/// Environment condition attached to a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Apply only in this environment (`apply-if`).
    When(Environment),
    /// Apply in every environment except this one (`apply-unless`).
    Unless(Environment),
}

impl Gate {
    /// Whether a stage carrying this gate participates under `current`.
    pub fn admits(self, current: Environment) -> bool {
        match self {
            Gate::When(env) => current.when(env, ()).is_some(),
            Gate::Unless(env) => current.unless(env, ()).is_some(),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::When(env) => write!(f, "when {env}"),
            Gate::Unless(env) => write!(f, "unless {env}"),
        }
    }
}
