/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/bounded.rs

    A Vec with a caller-chosen capacity that refuses to grow past it.
*/
use crate::SiftError;
use std::ops::Deref;

/// A growable container with a hard capacity. Pushing past the capacity returns
/// [SiftError::CapacityExceeded] instead of truncating or reallocating.
///
/// Dereferences to a slice for read access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundedVec<T> {
    items: Vec<T>,
    capacity: usize,
    what: &'static str,
}

impl<T> BoundedVec<T> {
    /// Create a new, empty BoundedVec.
    /// `what` names the contents for error reporting, e.g. "sectors".
    pub fn new(capacity: usize, what: &'static str) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(64)),
            capacity,
            what,
        }
    }

    pub fn push(&mut self, item: T) -> Result<(), SiftError> {
        if self.items.len() >= self.capacity {
            log::warn!(
                "BoundedVec::push(): capacity of {} {} exceeded",
                self.capacity,
                self.what
            );
            return Err(SiftError::CapacityExceeded {
                what:  self.what,
                limit: self.capacity,
            });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Deref for BoundedVec<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a BoundedVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_fails_fast_when_full() {
        let mut v = BoundedVec::new(2, "peaks");
        v.push(1).unwrap();
        v.push(2).unwrap();
        assert!(v.is_full());
        match v.push(3) {
            Err(SiftError::CapacityExceeded { what, limit }) => {
                assert_eq!(what, "peaks");
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(&*v, &[1, 2]);
    }
}
