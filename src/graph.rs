//! The annotation graph consumed by the resolver.
//!
//! Entities live in an arena indexed by id; references between them are
//! plain ids, never live pointers, so a cyclic graph can be represented
//! (and rejected at resolution time) without ownership cycles.

use serde::{Deserialize, Serialize};

use core::hash::BuildHasherDefault;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use seahash::SeaHasher;

use crate::error::{Result, TemporaError};
use crate::interval::Interval;

pub type EntityHasher = BuildHasherDefault<SeaHasher>;

// ------------- Span -------------
/// Character offsets `(start, end)` of an entity in its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span(pub usize, pub usize);

impl Span {
    /// Whether `other` lies within this span.
    pub fn covers(&self, other: &Span) -> bool {
        self.0 <= other.0 && other.1 <= self.1
    }
}
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.0, self.1)
    }
}
/// Parses the annotation form `"start,end"`.
impl FromStr for Span {
    type Err = TemporaError;
    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| TemporaError::Parse(format!("'{s}' is not a span")))
        };
        match s.split_once(',') {
            Some((start, end)) => Ok(Span(parse(start)?, parse(end)?)),
            None => Err(TemporaError::Parse(format!("'{s}' is not a span"))),
        }
    }
}

// ------------- PropertyValue -------------
/// In JSON an integer or a string is a literal, `{"ref": "<id>"}` a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Reference {
        #[serde(rename = "ref")]
        id: String,
    },
    Text(String),
}

impl PropertyValue {
    pub fn reference(id: impl Into<String>) -> Self {
        PropertyValue::Reference { id: id.into() }
    }
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            PropertyValue::Reference { id } => Some(id),
            _ => None,
        }
    }
}
impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_owned())
    }
}
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}
impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Reference { id } => write!(f, "{}", id),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

// ------------- Entity -------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Entity {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { id: id.into(), type_name: type_name.into(), span: None, properties: BTreeMap::new() }
    }
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some(Span(start, end));
        self
    }
    pub fn literal(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
    pub fn reference(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.properties.insert(name.into(), PropertyValue::reference(id));
        self
    }
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
    /// Ids of the entities this one refers to.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.properties.values().filter_map(PropertyValue::as_reference)
    }
}

// ------------- AnnotationGraph -------------
#[derive(Debug, Clone, Default)]
pub struct AnnotationGraph {
    entities: Vec<Entity>,
    index: HashMap<String, usize, EntityHasher>,
}

impl AnnotationGraph {
    pub fn new(entities: Vec<Entity>) -> Result<Self> {
        let mut index = HashMap::with_capacity_and_hasher(entities.len(), EntityHasher::default());
        for (position, entity) in entities.iter().enumerate() {
            match index.entry(entity.id.clone()) {
                Entry::Vacant(e) => {
                    e.insert(position);
                }
                Entry::Occupied(_) => return Err(TemporaError::DuplicateEntity(entity.id.clone())),
            }
        }
        Ok(Self { entities, index })
    }
    /// Reads a JSON array of entities.
    pub fn from_json(json: &str) -> Result<Self> {
        let entities: Vec<Entity> = serde_json::from_str(json)?;
        Self::new(entities)
    }
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entities)?)
    }
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|&position| &self.entities[position])
    }
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
    pub fn len(&self) -> usize {
        self.entities.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
    /// Entities no other entity refers to, ordered by span start. Entities
    /// without a span come last, in input order.
    pub fn top_level(&self) -> Vec<&Entity> {
        let referenced: HashSet<&str, EntityHasher> = self
            .entities
            .iter()
            .flat_map(|e| e.references().filter(move |r| *r != e.id))
            .collect();
        let mut top: Vec<&Entity> = self
            .entities
            .iter()
            .filter(|e| !referenced.contains(e.id.as_str()))
            .collect();
        top.sort_by_key(|e| (e.span.is_none(), e.span.map(|s| s.0)));
        top
    }
}

impl TryFrom<Vec<Entity>> for AnnotationGraph {
    type Error = TemporaError;
    fn try_from(entities: Vec<Entity>) -> Result<Self> {
        Self::new(entities)
    }
}

// ------------- KnownIntervals -------------
/// Key of a pre-resolved interval: an optional entity type and an optional
/// value, e.g. `(None, "DocTime")` for the document creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KnownKey {
    pub kind: Option<String>,
    pub value: Option<String>,
}

impl KnownKey {
    pub fn new(kind: Option<&str>, value: Option<&str>) -> Self {
        Self { kind: kind.map(str::to_owned), value: value.map(str::to_owned) }
    }
    pub fn doc_time() -> Self {
        Self::new(None, Some("DocTime"))
    }
    pub fn event(span: Span) -> Self {
        Self { kind: Some("Event".to_owned()), value: Some(span.to_string()) }
    }
}
impl fmt::Display for KnownKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            self.kind.as_deref().unwrap_or("None"),
            self.value.as_deref().unwrap_or("None")
        )
    }
}

/// Anchors supplied from outside the graph. Read-only while resolving, so
/// one table can be shared by concurrent resolutions.
#[derive(Debug, Clone, Default)]
pub struct KnownIntervals {
    kept: HashMap<KnownKey, Interval, EntityHasher>,
}

impl KnownIntervals {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_doc_time(mut self, interval: Interval) -> Self {
        self.insert(KnownKey::doc_time(), interval);
        self
    }
    pub fn insert(&mut self, key: KnownKey, interval: Interval) -> Option<Interval> {
        self.kept.insert(key, interval)
    }
    pub fn get(&self, key: &KnownKey) -> Option<Interval> {
        self.kept.get(key).copied()
    }
    /// `(None, "DocTime")`, falling back to `(None, None)`.
    pub fn doc_time(&self) -> Option<Interval> {
        self.get(&KnownKey::doc_time())
            .or_else(|| self.get(&KnownKey::new(None, None)))
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
