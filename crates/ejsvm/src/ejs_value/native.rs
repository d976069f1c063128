use std::any::Any;
use std::fmt;

use crate::gc::Mark;

/// Payload of a native record: closures, exceptions, iterators and other
/// host values that may embed references to heap records.
///
/// `#[derive(Mark)]` with `#[mark(native)]` implements this trait with no
/// finalizer.
pub trait NativeVar: Mark + Any {
    /// Called once when the collector reclaims a record whose type has a finalizer
    fn finalize(&mut self) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn NativeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeVar({:?})", self.as_any().type_id())
    }
}
