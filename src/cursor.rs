//! Token-cursor contract between the token source and the tree builder

use crate::error::Result;

/// Kind of the node the cursor currently rests on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Opening tag of an element (including self-closing elements)
    ElementStart,
    /// Closing tag of an element
    ElementEnd,
    /// Text content with at least one non-whitespace character
    Text,
    /// CDATA section content, captured raw
    CData,
    /// Text content that is entirely whitespace
    Whitespace,
    /// Markup with no structural meaning (comments, processing
    /// instructions, doctype declarations)
    Other,
}

/// A forward-only cursor over a stream of XML parse events.
///
/// The cursor rests on one node at a time; the accessors report that
/// node's state and never move the cursor. A cursor is exclusively owned
/// by a single traversal and never reused across documents.
pub trait Cursor {
    /// Moves to the next node. Returns `Ok(false)` at end of stream.
    fn advance(&mut self) -> Result<bool>;

    /// Kind of the current node
    fn kind(&self) -> NodeKind;

    /// Tag name of the current node; empty for non-element nodes
    fn name(&self) -> &str;

    /// Text content of the current node; empty for element nodes
    fn text(&self) -> &str;

    /// Number of ancestors enclosing the current node. An element's
    /// closing tag reports the same depth as its opening tag.
    fn depth(&self) -> usize;

    /// True if the current node is a self-closing element
    fn is_self_closing(&self) -> bool;

    /// Attributes of the current element in document order, values
    /// entity-decoded but otherwise raw; empty for non-element nodes
    fn attributes(&self) -> &[(String, String)];

    /// Finalizes the underlying source. Fails with
    /// [`ErrorKind::IncompleteParse`](crate::ErrorKind::IncompleteParse)
    /// if the stream was left in an inconsistent state.
    fn close(&mut self) -> Result<()>;
}
