// Ejscript VM core
// Generational mark-and-sweep collector, type-pool allocator and the dynamic
// property store it traverses

extern crate self as ejsvm;

#[cfg(test)]
mod test;

pub mod ejs_value;
pub mod ejs_vm;
pub mod gc;

pub use ejs_value::{EjsObject, EjsType, NativeVar, QName, TypeDef};
pub use ejs_vm::{CallFrame, EjsError, EjsHeap, EjsResult, HeapOption, TuneProfile};
pub use ejsvm_derive::Mark;
pub use gc::{CollectInfo, CollectMode, EjsTypeId, Mark, Marker, Slot, VarId};
