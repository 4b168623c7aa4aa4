//! Record keys: `namespace:identifier`.
//!
//! Identifiers are not escaped. `("a:b", "c")` and `("a", "b:c")` produce the same
//! key, so callers that need isolation must keep `:` out of one side.

/// Separator between namespace and identifier.
pub const KEY_SEPARATOR: char = ':';

/// Derives backend keys for a counter's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Builder for keys under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        let mut prefix = namespace.into();
        prefix.push(KEY_SEPARATOR);
        Self { prefix }
    }

    /// Key for `id`.
    pub fn key(&self, id: &str) -> String {
        let mut key = String::with_capacity(self.prefix.len() + id.len());
        key.push_str(&self.prefix);
        key.push_str(id);
        key
    }

    /// Namespace without the trailing separator.
    pub fn namespace(&self) -> &str {
        &self.prefix[..self.prefix.len() - KEY_SEPARATOR.len_utf8()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_colon() {
        let keys = KeyBuilder::new("login");
        assert_eq!(keys.key("10.0.0.1"), "login:10.0.0.1");
        assert_eq!(keys.key(""), "login:");
        assert_eq!(keys.namespace(), "login");
    }

    #[test]
    fn distinct_ids_get_distinct_keys() {
        let keys = KeyBuilder::new("ns");
        assert_ne!(keys.key("A"), keys.key("B"));
    }

    #[test]
    fn separator_in_namespace_can_collide() {
        assert_eq!(KeyBuilder::new("a:b").key("c"), KeyBuilder::new("a").key("b:c"));
    }
}
