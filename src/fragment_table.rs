use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ir::Namespace;

/// What a part inside a hoisted fragment binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PartKind {
    Text,
    Attribute { name: String },
    Listener { event: String },
}

/// Insertion point addressed by the pre-order index of its node within the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSlot {
    pub id: u32,
    #[serde(flatten)]
    pub kind: PartKind,
}

impl PartSlot {
    fn canonical(&self) -> String {
        match &self.kind {
            PartKind::Text => format!("{}:text", self.id),
            PartKind::Attribute { name } => format!("{}:attr:{}", self.id, name),
            PartKind::Listener { event } => format!("{}:on:{}", self.id, event),
        }
    }
}

/// Canonical markup of a hoisted subtree plus its part list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentDescriptor {
    /// Template literal body; dynamic text appears as `${"t<n>"}`.
    pub html: String,
    pub parts: Vec<PartSlot>,
    /// Namespace of the root element; foreign markup needs its own parse context.
    #[serde(default)]
    pub namespace: Namespace,
}

impl FragmentDescriptor {
    pub fn digest(&self) -> String {
        let namespace = match self.namespace {
            Namespace::Html => "html",
            Namespace::Svg => "svg",
            Namespace::MathMl => "mathml",
        };
        let mut canonical = format!("{}\n{}", namespace, self.html);
        for part in &self.parts {
            canonical.push('\n');
            canonical.push_str(&part.canonical());
        }
        compute_hash(&canonical)
    }
}

pub fn compute_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insertion-ordered, content-addressed fragment store.
///
/// Append-only while the static pass runs, then frozen.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StaticFragmentTable {
    entries: IndexMap<String, FragmentDescriptor>,
    #[serde(skip)]
    frozen: bool,
}

impl StaticFragmentTable {
    pub fn new() -> Self {
        StaticFragmentTable::default()
    }

    /// Stores `descriptor` unless identical content is already present.
    /// Returns the digest keying the entry.
    pub fn insert(&mut self, descriptor: FragmentDescriptor) -> Result<String, String> {
        if self.frozen {
            return Err(format!(
                "Cannot add fragment \"{}\" after table is frozen.",
                descriptor.html
            ));
        }
        let digest = descriptor.digest();
        self.entries.entry(digest.clone()).or_insert(descriptor);
        Ok(digest)
    }

    pub fn get(&self, digest: &str) -> Option<&FragmentDescriptor> {
        self.entries.get(digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FragmentDescriptor)> {
        self.entries.iter().map(|(digest, d)| (digest.as_str(), d))
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(html: &str) -> FragmentDescriptor {
        FragmentDescriptor {
            html: html.to_string(),
            parts: vec![],
            namespace: Namespace::Html,
        }
    }

    #[test]
    fn test_identical_content_shares_one_entry() {
        let mut table = StaticFragmentTable::new();
        let a = table.insert(descriptor("<p>Hello</p>")).unwrap();
        let b = table.insert(descriptor("<p>Hello</p>")).unwrap();
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        table.insert(descriptor("<p>Bye</p>")).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_parts_distinguish_entries() {
        let mut table = StaticFragmentTable::new();
        table.insert(descriptor("<p></p>")).unwrap();
        table
            .insert(FragmentDescriptor {
                html: "<p></p>".to_string(),
                parts: vec![PartSlot {
                    id: 0,
                    kind: PartKind::Attribute {
                        name: "title".to_string(),
                    },
                }],
                namespace: Namespace::Html,
            })
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_namespace_distinguishes_entries() {
        let mut table = StaticFragmentTable::new();
        let html = table.insert(descriptor("<a></a>")).unwrap();
        let svg = table
            .insert(FragmentDescriptor {
                namespace: Namespace::Svg,
                ..descriptor("<a></a>")
            })
            .unwrap();
        assert_ne!(html, svg);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_frozen_table_rejects_inserts() {
        let mut table = StaticFragmentTable::new();
        table.freeze();
        assert!(table.is_frozen());
        assert!(table.insert(descriptor("<p></p>")).is_err());
    }

    #[test]
    fn test_compute_hash_is_hex_sha256() {
        let hash = compute_hash("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
