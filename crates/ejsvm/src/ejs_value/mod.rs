// Values held in the heap: qualified names, objects and type descriptors

pub mod ejs_object;
mod ejs_type;
mod native;
mod qname;

pub use ejs_object::{EjsObject, PropertyNames, SingleMatch};
pub use ejs_type::{
    EjsType, TYPE_BOOLEAN, TYPE_NATIVE, TYPE_NUMBER, TYPE_OBJECT, TYPE_STRING, TypeDef,
    TypeRegistry,
};
pub use native::NativeVar;
pub use qname::QName;
