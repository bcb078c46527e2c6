//! Normalized paths and the step arena used while evaluating
//!
//! Every node visited during evaluation is recorded in a [`PathArena`] as a
//! step pointing back at its parent by index. A [`NormalizedPath`] is only
//! materialized for the nodes that end up in the result.

use serde::{Serialize, Serializer};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;

/// One step of a normalized path
///
/// Ordering puts names before indices at the same position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathElement {
    /// Object member name
    Name(String),
    /// Array index (always non-negative once normalized)
    Index(usize),
}

/// The location of a single node, root first
///
/// Paths compare step by step; a path that is a strict prefix of another
/// sorts before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedPath {
    elements: SmallVec<[PathElement; 8]>,
}

impl NormalizedPath {
    /// The path of the document root (`$`)
    pub fn root() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Number of steps below the root
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Unescaped pointer tokens, one per step
    pub fn tokens(&self) -> Vec<String> {
        self.elements
            .iter()
            .map(|e| match e {
                PathElement::Name(name) => name.clone(),
                PathElement::Index(index) => index.to_string(),
            })
            .collect()
    }

    /// RFC 6901 form, e.g. `/store/book/0`
    pub fn to_json_pointer(&self) -> String {
        let mut pointer = String::new();
        for token in self.tokens() {
            pointer.push('/');
            pointer.push_str(&token.replace('~', "~0").replace('/', "~1"));
        }
        pointer
    }

    /// Look the path up in `document`
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        document.pointer(&self.to_json_pointer())
    }
}

impl FromIterator<PathElement> for NormalizedPath {
    fn from_iter<I: IntoIterator<Item = PathElement>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for element in &self.elements {
            match element {
                PathElement::Name(name) => {
                    f.write_str("['")?;
                    for ch in name.chars() {
                        match ch {
                            '\'' => f.write_str("\\'")?,
                            '\\' => f.write_str("\\\\")?,
                            _ => write!(f, "{ch}")?,
                        }
                    }
                    f.write_str("']")?;
                }
                PathElement::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for NormalizedPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Index of a step in a [`PathArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StepId(usize);

#[derive(Debug, Clone, Copy)]
enum Step<'a> {
    Root,
    Name(&'a str),
    Index(usize),
}

#[derive(Debug, Clone)]
struct Entry<'a> {
    parent: Option<StepId>,
    step: Step<'a>,
    value: &'a Value,
}

/// Append-only store of visited steps, each linked to its parent by index
#[derive(Debug, Clone)]
pub(crate) struct PathArena<'a> {
    entries: Vec<Entry<'a>>,
}

impl<'a> PathArena<'a> {
    pub(crate) const ROOT: StepId = StepId(0);

    pub(crate) fn new(root: &'a Value) -> Self {
        Self {
            entries: vec![Entry {
                parent: None,
                step: Step::Root,
                value: root,
            }],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every step recorded after `mark`
    pub(crate) fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark.max(1));
    }

    pub(crate) fn value(&self, id: StepId) -> &'a Value {
        self.entries[id.0].value
    }

    pub(crate) fn parent(&self, id: StepId) -> Option<StepId> {
        self.entries[id.0].parent
    }

    pub(crate) fn push_name(&mut self, parent: StepId, name: &'a str, value: &'a Value) -> StepId {
        self.push(parent, Step::Name(name), value)
    }

    pub(crate) fn push_index(&mut self, parent: StepId, index: usize, value: &'a Value) -> StepId {
        self.push(parent, Step::Index(index), value)
    }

    fn push(&mut self, parent: StepId, step: Step<'a>, value: &'a Value) -> StepId {
        let id = StepId(self.entries.len());
        self.entries.push(Entry {
            parent: Some(parent),
            step,
            value,
        });
        id
    }

    /// Materialize the path of `id`, root first
    pub(crate) fn path(&self, id: StepId) -> NormalizedPath {
        let mut elements = SmallVec::<[PathElement; 8]>::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let entry = &self.entries[current.0];
            match entry.step {
                Step::Root => {}
                Step::Name(name) => elements.push(PathElement::Name(name.to_string())),
                Step::Index(index) => elements.push(PathElement::Index(index)),
            }
            cursor = entry.parent;
        }
        elements.reverse();
        NormalizedPath { elements }
    }

    /// Start a new arena holding only the ancestry of `id`
    ///
    /// Returns the new arena, the id of `id` inside it, and the ids of the
    /// copied chain in this arena (root first) for [`PathArena::absorb`].
    pub(crate) fn fork(&self, id: StepId) -> (PathArena<'a>, StepId, Vec<StepId>) {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.entries[current.0].parent;
        }
        chain.reverse();

        let entries = chain
            .iter()
            .enumerate()
            .map(|(i, original)| Entry {
                parent: i.checked_sub(1).map(StepId),
                ..self.entries[original.0].clone()
            })
            .collect::<Vec<_>>();
        let local = StepId(entries.len() - 1);
        (PathArena { entries }, local, chain)
    }

    /// Append the steps of a forked arena, returning a translation table
    /// from the fork's ids to ids in this arena
    pub(crate) fn absorb(&mut self, fork: PathArena<'a>, chain: &[StepId]) -> Vec<StepId> {
        let mut mapping: Vec<StepId> = Vec::with_capacity(fork.entries.len());
        for (i, entry) in fork.entries.into_iter().enumerate() {
            if let Some(&original) = chain.get(i) {
                mapping.push(original);
                continue;
            }
            let parent = entry.parent.map(|p| mapping[p.0]);
            mapping.push(StepId(self.entries.len()));
            self.entries.push(Entry { parent, ..entry });
        }
        mapping
    }

    pub(crate) fn translate(mapping: &[StepId], id: StepId) -> StepId {
        mapping[id.0]
    }
}
