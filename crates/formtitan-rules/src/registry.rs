//! Named validator registry
//!
//! Built-in checks are registered under the same names a definition uses in
//! `customRules`, so a definition can reference them directly and a host can
//! replace any of them. Registration replaces by name; last write wins.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use formtitan_core::value::{display_string, format_number, is_blank, length_of, to_number};

/// A validator: `(value, options, form_data) -> error message`
pub type RuleFn = Arc<dyn Fn(Option<&Value>, &Value, &Value) -> Option<String> + Send + Sync>;

pub const REQUIRED: &str = "required";
pub const MIN_LENGTH: &str = "minLength";
pub const MAX_LENGTH: &str = "maxLength";
pub const PATTERN: &str = "pattern";
pub const EMAIL: &str = "email";
pub const MIN: &str = "min";
pub const MAX: &str = "max";

lazy_static! {
    static ref EMAIL_SHAPE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Compiled `pattern` sources, shared by clones of a registry
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    compiled: Arc<RwLock<HashMap<String, Regex>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source` once; later calls reuse the compiled regex
    pub fn get_or_compile(&self, source: &str) -> Result<Regex, regex::Error> {
        if let Some(re) = self.compiled.read().unwrap_or_else(PoisonError::into_inner).get(source) {
            return Ok(re.clone());
        }
        let re = Regex::new(source)?;
        self.compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.to_string(), re.clone());
        Ok(re)
    }

    pub fn len(&self) -> usize {
        self.compiled.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct RuleRegistry {
    rules: HashMap<String, RuleFn>,
    patterns: PatternCache,
}

impl RuleRegistry {
    /// Registry without any rule
    pub fn empty() -> Self {
        Self { rules: HashMap::new(), patterns: PatternCache::new() }
    }

    /// Registry holding the built-in rules
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(REQUIRED, required);
        registry.register(MIN_LENGTH, min_length);
        registry.register(MAX_LENGTH, max_length);
        let patterns = registry.patterns.clone();
        registry.register(PATTERN, move |value, options, _data| pattern(&patterns, value, options));
        registry.register(EMAIL, email);
        registry.register(MIN, min);
        registry.register(MAX, max);
        registry
    }

    /// Register a rule, returning the one it replaced
    pub fn register<F>(&mut self, name: impl Into<String>, rule: F) -> Option<RuleFn>
    where
        F: Fn(Option<&Value>, &Value, &Value) -> Option<String> + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Arc::new(rule))
    }

    pub fn get(&self, name: &str) -> Option<&RuleFn> {
        self.rules.get(name)
    }

    /// Regexes compiled for the `pattern` rule
    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RuleRegistry").field("rules", &self.names()).finish()
    }
}

// ============================================================================
// Built-in rules
// ============================================================================

fn required(value: Option<&Value>, _options: &Value, _data: &Value) -> Option<String> {
    is_blank(value).then(|| "This field is required".to_string())
}

fn min_length(value: Option<&Value>, options: &Value, _data: &Value) -> Option<String> {
    let n = options.get(MIN_LENGTH)?.as_u64()?;
    let value = value.filter(|v| !is_blank(Some(v)))?;
    (length_of(value) < n as usize).then(|| format!("Must be at least {} characters", n))
}

fn max_length(value: Option<&Value>, options: &Value, _data: &Value) -> Option<String> {
    let n = options.get(MAX_LENGTH)?.as_u64()?;
    let value = value.filter(|v| !is_blank(Some(v)))?;
    (length_of(value) > n as usize).then(|| format!("Must be no more than {} characters", n))
}

fn pattern(patterns: &PatternCache, value: Option<&Value>, options: &Value) -> Option<String> {
    let source = options.get(PATTERN)?.as_str()?;
    let value = value.filter(|v| !is_blank(Some(v)))?;
    match patterns.get_or_compile(source) {
        Ok(re) => (!re.is_match(&display_string(value))).then(|| "Invalid format".to_string()),
        Err(err) => {
            tracing::warn!(pattern = source, error = %err, "skipping pattern that does not compile");
            None
        }
    }
}

fn email(value: Option<&Value>, _options: &Value, _data: &Value) -> Option<String> {
    let value = value.filter(|v| !is_blank(Some(v)))?;
    (!EMAIL_SHAPE.is_match(&display_string(value))).then(|| "Invalid email address".to_string())
}

fn min(value: Option<&Value>, options: &Value, _data: &Value) -> Option<String> {
    let bound = options.get(MIN)?.as_f64()?;
    let value = value.filter(|v| !is_blank(Some(v)))?;
    (to_number(Some(value)) < bound).then(|| format!("Must be at least {}", format_number(bound)))
}

fn max(value: Option<&Value>, options: &Value, _data: &Value) -> Option<String> {
    let bound = options.get(MAX)?.as_f64()?;
    let value = value.filter(|v| !is_blank(Some(v)))?;
    (to_number(Some(value)) > bound).then(|| format!("Must be no more than {}", format_number(bound)))
}
