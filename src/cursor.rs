//! Seek-capable view over a forward-only result stream
//!
//! The store only hands out forward-ordered result streams, but the table
//! virtualization needs random access by position (binary search seeks to
//! arbitrary midpoints). [`SeekableCursor`] buffers a stream's rows once at
//! build time and exposes explicit seek reads. Owners hold their cursors
//! exclusively; there is no shared cursor state.

/// A positioned cursor over rows buffered from a sequential stream.
#[derive(Clone, Debug)]
pub struct SeekableCursor<T> {
    rows: Vec<T>,
    position: Option<usize>,
}

impl<T> SeekableCursor<T> {
    /// Wrap rows already read from the stream, in stream order.
    pub fn new(rows: Vec<T>) -> Self {
        SeekableCursor {
            rows,
            position: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position the cursor on `position` and read the row there.
    /// Out-of-range positions leave the cursor unpositioned and return None.
    pub fn seek(&mut self, position: usize) -> Option<&T> {
        if position >= self.rows.len() {
            self.position = None;
            return None;
        }
        self.position = Some(position);
        self.rows.get(position)
    }

    /// The row the cursor currently sits on, if any.
    pub fn current(&self) -> Option<&T> {
        self.position.and_then(|position| self.rows.get(position))
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }
}
