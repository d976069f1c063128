//! Procedural macros for the ejsvm collector.
//!
//! Provides `#[derive(Mark)]` to implement the marking hook for native
//! payload types: every field is reported to the marker, so any
//! `VarId`, `Option<VarId>` or collection of them is kept alive.
//!
//! # Attributes
//!
//! - `#[mark(skip)]` on a field: do not visit it (the field type then
//!   need not implement `Mark`)
//! - `#[mark(native)]` on the type: also implement `NativeVar` with no
//!   finalizer, so the value can be boxed into a native record
//!
//! # Example
//!
//! ```ignore
//! use ejsvm::{Mark, Slot, VarId};
//!
//! #[derive(Mark)]
//! #[mark(native)]
//! struct Closure {
//!     scope: Slot,
//!     captured: Vec<VarId>,
//!     #[mark(skip)]
//!     code_offset: usize,
//! }
//! ```

mod derive_mark;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derive `ejsvm::gc::Mark` for a struct or enum.
#[proc_macro_derive(Mark, attributes(mark))]
pub fn derive_mark(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_mark::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
