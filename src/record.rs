//! Bibliographic records.
//!
//! A [`Record`] is what the BibTeX adapter hands over: an id, an entry type
//! and a map of lower-cased field names to TeX-flavoured strings. A
//! [`Publication`] is the same record after normalization, ready to be
//! passed to a template.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeTuple, Serializer};

/// A raw bibliographic record as read from a `.bib` file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// The citation key (e.g., "smith2020")
    pub id: String,
    /// The entry type, lower-cased (e.g., "article")
    pub entry_type: String,
    /// Field values keyed by lower-cased field name
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Creates an empty record with the given id and entry type.
    pub fn new(id: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entry_type: entry_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter. Field names are lower-cased.
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// One author name split into its last and first components.
///
/// Serializes as the two-element sequence `[last, first]`, so templates can
/// use either `author[0]` / `author[1]` or iterate over the pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Author {
    pub last: String,
    pub first: String,
}

impl Author {
    pub fn new(last: impl Into<String>, first: impl Into<String>) -> Self {
        Self {
            last: last.into(),
            first: first.into(),
        }
    }
}

impl Serialize for Author {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.last)?;
        tuple.serialize_element(&self.first)?;
        tuple.end()
    }
}

/// A normalized record, as exposed to templates.
///
/// `id` and `type` are always present; `author` is present only if the
/// source record had an author field. Every other field is flattened into
/// the top level under its own name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Publication {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Vec<Author>>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Publication {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The first listed author, if any.
    pub fn first_author(&self) -> Option<&Author> {
        self.author.as_ref().and_then(|authors| authors.first())
    }
}
