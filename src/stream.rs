//! Streaming traversal: the driving loop and recursive subtree extraction
//!
//! `StreamParser` drives a [`Cursor`] token by token. Every element start
//! seen at driving-loop level that survives the skip filters is extracted
//! into its full subtree and handed to the caller's sink; the extraction
//! recurses across descendant elements over the same cursor, so each
//! recursive call leaves the cursor on the node that ended its subtree.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::cursor::{Cursor, NodeKind};
use crate::error::Result;
use crate::escape;
use crate::value::{Array, Object, Value};

/// Accumulator state for one child name under one parent scope.
///
/// The second sighting of a name converts the single entry into a list
/// exactly once; every later sighting appends.
#[derive(Debug)]
enum Slot {
    Single(Value),
    Promoted(Array),
}

impl Slot {
    fn place(&mut self, node: Value) {
        match self {
            Self::Single(prior) => {
                let prior = std::mem::take(prior);
                *self = Self::Promoted(Array::from(vec![prior, node]));
            }
            Self::Promoted(list) => list.push(node),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Single(node) => node,
            Self::Promoted(list) => Value::Array(list),
        }
    }
}

/// Streaming tree builder over a token cursor.
///
/// By default the first top-level element is discarded, which on a
/// single-rooted document delivers the root's children one by one. Use
/// [`with_skip_elements(0)`](Self::with_skip_elements) to receive the
/// root itself.
#[derive(Debug)]
pub struct StreamParser<C> {
    cursor: C,
    skip_elements: u32,
    skip_depth: usize,
}

impl<C: Cursor> StreamParser<C> {
    /// Create a parser with the default filters (`skip_elements = 1`,
    /// `skip_depth = 0`)
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            skip_elements: 1,
            skip_depth: 0,
        }
    }

    /// Number of leading top-level elements to silently discard
    #[must_use]
    pub fn with_skip_elements(mut self, n: u32) -> Self {
        self.skip_elements = n;
        self
    }

    /// Minimum depth required for a top-level element to be delivered
    #[must_use]
    pub fn with_skip_depth(mut self, n: usize) -> Self {
        self.skip_depth = n;
        self
    }

    /// Drives the traversal to completion, invoking `sink` once per
    /// accepted top-level element.
    ///
    /// The cursor is closed on every exit path. A traversal error takes
    /// precedence over a close error; a close failure after a clean
    /// traversal surfaces as
    /// [`ErrorKind::IncompleteParse`](crate::ErrorKind::IncompleteParse)
    /// even though every element was already delivered.
    pub fn for_each<F>(mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(Value),
    {
        let walked = self.walk(&mut sink);
        let closed = self.cursor.close();
        walked.and(closed)
    }

    /// Accumulating form of [`for_each`](Self::for_each)
    pub fn collect_all(self) -> Result<Vec<Value>> {
        let mut elements = Vec::new();
        self.for_each(|element| elements.push(element))?;
        Ok(elements)
    }

    fn walk<F>(&mut self, sink: &mut F) -> Result<()>
    where
        F: FnMut(Value),
    {
        while self.cursor.advance()? {
            if self.cursor.kind() != NodeKind::ElementStart {
                continue;
            }
            if self.should_skip() {
                debug!(name = self.cursor.name(), "discarding top-level element");
                continue;
            }
            let (name, body) = self.extract()?;
            let mut element = Object::new();
            element.insert(name, body);
            sink(Value::Object(element));
        }
        Ok(())
    }

    // The element budget is consulted first and decrements on every
    // discarded candidate until it reaches zero, then stays inert.
    fn should_skip(&mut self) -> bool {
        if self.skip_elements >= 1 {
            self.skip_elements -= 1;
            return true;
        }
        self.cursor.depth() < self.skip_depth
    }

    /// Extracts the subtree of the element the cursor rests on.
    ///
    /// Returns the element's name and its body: an ordered mapping with
    /// `attributes` and `name` first, one key per distinct child name in
    /// appearance order, and `value` if a text segment ended the node.
    /// On return the cursor rests on the node that ended the subtree.
    fn extract(&mut self) -> Result<(String, Value)> {
        let name = self.cursor.name().to_owned();
        let parent_depth = self.cursor.depth();
        trace!(%name, depth = parent_depth, "extracting subtree");

        let mut attributes = Object::new();
        for (key, raw) in self.cursor.attributes() {
            attributes.insert(key.clone(), escape::sanitize(raw));
        }

        let mut body = Object::new();
        body.insert("attributes", attributes);
        body.insert("name", name.clone());

        if self.cursor.is_self_closing() {
            body.insert("value", Value::Null);
            return Ok((name, Value::Object(body)));
        }

        let mut children: IndexMap<String, Slot> = IndexMap::new();

        while self.cursor.advance()? {
            match self.cursor.kind() {
                NodeKind::ElementEnd if self.cursor.depth() == parent_depth => break,
                NodeKind::Text | NodeKind::CData => {
                    // first scalar wins: the element becomes leaf-valued
                    // and its remaining tokens fall through to the caller
                    let value = escape::sanitize(self.cursor.text());
                    flush_children(&mut body, children);
                    body.insert("value", value);
                    return Ok((name, Value::Object(body)));
                }
                NodeKind::ElementStart => {
                    let (child_name, child_body) = self.extract()?;
                    match children.entry(child_name) {
                        Entry::Occupied(mut slot) => slot.get_mut().place(child_body),
                        Entry::Vacant(slot) => {
                            slot.insert(Slot::Single(child_body));
                        }
                    }
                }
                NodeKind::ElementEnd | NodeKind::Whitespace | NodeKind::Other => {}
            }
        }

        // reached on the matching end tag, or at end of stream on a
        // truncated document (close() then reports the malformation)
        flush_children(&mut body, children);
        Ok((name, Value::Object(body)))
    }
}

fn flush_children(body: &mut Object, children: IndexMap<String, Slot>) {
    for (child_name, slot) in children {
        body.insert(child_name, slot.into_value());
    }
}
