//! Custom element tag resolution.
//!
//! The IR builder asks a [`TagResolver`] for the module specifier of every
//! tag that contains a dash. Resolution is the host's business; two stock
//! resolvers cover the common cases.

use indexmap::IndexMap;

pub trait TagResolver {
    /// Module specifier for `tag`, or `None` when the tag is unknown.
    fn resolve(&self, tag: &str) -> Option<String>;
}

impl<F> TagResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, tag: &str) -> Option<String> {
        self(tag)
    }
}

/// `x-foo-bar` resolves to `x/fooBar`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceResolver;

impl TagResolver for NamespaceResolver {
    fn resolve(&self, tag: &str) -> Option<String> {
        let (namespace, rest) = tag.split_once('-')?;
        if namespace.is_empty() || rest.is_empty() {
            return None;
        }
        let mut name = String::with_capacity(rest.len());
        let mut upper = false;
        for c in rest.chars() {
            if c == '-' {
                upper = true;
            } else if upper {
                name.extend(c.to_uppercase());
                upper = false;
            } else {
                name.push(c);
            }
        }
        Some(format!("{}/{}", namespace, name))
    }
}

/// Explicit tag → specifier table. Unknown tags do not resolve.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    tags: IndexMap<String, String>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: &str, specifier: &str) {
        self.tags.insert(tag.to_ascii_lowercase(), specifier.to_string());
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for TagTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut table = TagTable::new();
        for (tag, specifier) in iter {
            table.insert(tag, specifier);
        }
        table
    }
}

impl TagResolver for TagTable {
    fn resolve(&self, tag: &str) -> Option<String> {
        self.tags.get(&tag.to_ascii_lowercase()).cloned()
    }
}
