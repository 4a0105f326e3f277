//! Listener handles.

use std::fmt;
use std::rc::Rc;

/// A shared callback registered with a [`Signal`](super::Signal).
///
/// Identity is the callback allocation: clones of one listener are the same
/// listener, two listeners built from equal closures are not.
pub struct Listener<A> {
    callback: Rc<dyn Fn(&A)>,
}

impl<A> Listener<A> {
    /// Wraps a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&A) + 'static,
    {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Invokes the callback directly.
    #[inline]
    pub fn call(&self, args: &A) {
        (self.callback)(args);
    }

    /// Address of the callback allocation.
    #[inline]
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.callback).cast::<()>() as usize
    }
}

impl<A> Clone for Listener<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<A> PartialEq for Listener<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<A> Eq for Listener<A> {}

impl<A> fmt::Debug for Listener<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:#x})", self.key())
    }
}

impl<A, F> From<F> for Listener<A>
where
    F: Fn(&A) + 'static,
{
    fn from(callback: F) -> Self {
        Self::new(callback)
    }
}
