//! Variable store
//!
//! Carries values from one test case to the next and lets a group configure
//! its cases through a single init file. Every templated string of a case is
//! resolved against the store right before it is used.

mod template;

use std::collections::HashMap;

use crate::common::{Error, Result};

pub use template::Template;

/// Snapshot of the process environment variables that seed a store
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

impl Environment {
    /// Capture every process environment variable whose name starts with `prefix`
    pub fn capture(prefix: &str) -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.to_string_lossy().into_owned()))
        }), prefix)
    }

    /// Build a snapshot from explicit pairs, keeping only prefixed names
    pub fn from_vars<I>(vars: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            vars: vars
                .into_iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Store of template variables shared by the cases of one group
#[derive(Debug, Clone, Default)]
pub struct Store {
    data: HashMap<String, String>,
}

impl Store {
    /// Create a store seeded from the environment snapshot, then `initial`.
    ///
    /// Initial values overwrite environment values with the same name.
    pub fn new(env: &Environment, initial: &HashMap<String, String>) -> Self {
        let mut data: HashMap<String, String> = env.vars.iter().cloned().collect();
        data.extend(initial.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { data }
    }

    /// Set a variable, overwriting any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    /// Get a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace template actions in `text` with store values.
    ///
    /// Example: `Hello, {{.name}}!` uses the variable `name`. Missing
    /// variables render as empty strings; only malformed templates fail.
    pub fn replace(&self, text: &str) -> Result<String> {
        // Fast path: nothing to resolve
        if !text.contains("{{") {
            return Ok(text.to_string());
        }

        let template = Template::parse(text).map_err(|message| Error::TemplateParse {
            template: text.to_string(),
            message,
        })?;

        template
            .execute(&self.data)
            .map_err(|message| Error::TemplateExec {
                template: text.to_string(),
                message,
            })
    }

    /// Resolve an optional templated field
    pub fn replace_opt(&self, text: Option<&str>) -> Result<Option<String>> {
        text.map(|t| self.replace(t)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        Environment::from_vars(
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            "TESTS_",
        )
    }

    fn init(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_store() {
        let mut store = Store::new(&Environment::default(), &HashMap::new());
        store.set("a", "NEW A");
        assert_eq!(store.replace("ab{{.a}}bb").unwrap(), "abNEW Abb");
    }

    #[test]
    fn test_filled_store() {
        let mut store = Store::new(&Environment::default(), &init(&[("b", "NEW B")]));
        store.set("a", "NEW A");
        assert_eq!(store.replace("ab{{.a}}b{{.b}}b").unwrap(), "abNEW AbNEW Bb");
    }

    #[test]
    fn test_environment_prefix_filter() {
        let env = env(&[("TESTS_HOST", "localhost"), ("HOME", "/root")]);
        assert_eq!(env.len(), 1);

        let store = Store::new(&env, &HashMap::new());
        assert_eq!(store.get("TESTS_HOST"), Some("localhost"));
        assert_eq!(store.get("HOME"), None);
    }

    #[test]
    fn test_initial_values_override_environment() {
        let env = env(&[("TESTS_HOST", "from-env")]);
        let store = Store::new(&env, &init(&[("TESTS_HOST", "from-init")]));
        assert_eq!(store.get("TESTS_HOST"), Some("from-init"));
    }

    #[test]
    fn test_set_overwrites() {
        let mut store = Store::default();
        store.set("token", "one");
        store.set("token", "two");
        assert_eq!(store.get("token"), Some("two"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_is_pure() {
        let store = Store::new(&Environment::default(), &init(&[("x", "1")]));
        let first = store.replace("{{.x}}-{{.y}}").unwrap();
        let second = store.replace("{{.x}}-{{.y}}").unwrap();
        assert_eq!(first, "1-");
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("y"), None);
    }

    #[test]
    fn test_replace_is_idempotent_on_resolved_text() {
        let store = Store::new(&Environment::default(), &init(&[("x", "value")]));
        let resolved = store.replace("id={{.x}}").unwrap();
        assert_eq!(store.replace(&resolved).unwrap(), resolved);
    }

    #[test]
    fn test_replace_reports_syntax_errors() {
        let store = Store::default();
        let err = store.replace("{{.x").unwrap_err();
        assert!(matches!(err, Error::TemplateParse { .. }));
    }

    #[test]
    fn test_replace_reports_execution_errors() {
        let store = Store::new(&Environment::default(), &init(&[("a", "x")]));
        let err = store.replace("{{.a.b}}").unwrap_err();
        assert!(matches!(err, Error::TemplateExec { .. }));
    }

    #[test]
    fn test_replace_opt() {
        let store = Store::new(&Environment::default(), &init(&[("a", "x")]));
        assert_eq!(store.replace_opt(None).unwrap(), None);
        assert_eq!(store.replace_opt(Some("{{.a}}")).unwrap(), Some("x".to_string()));
    }
}
