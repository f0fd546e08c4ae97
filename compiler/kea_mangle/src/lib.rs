//! Mangling and demangling of Kea symbol names.
//!
//! Compiled artifacts carry every exported entity as one flat string:
//! `$s4main3fooyyF` is `main.foo() -> ()`. This crate owns both
//! directions and the tooling around them:
//!
//! - [`demangler`]: untrusted symbol text to a [`NodeArena`] tree, with
//!   budgets on nodes, depth and repeat counts
//! - [`printer`]: trees to readable names, tuned by [`DemangleOptions`]
//! - [`remangler`] over [`mangler`]: trees back to canonical symbol
//!   text, with round-trip verification
//! - [`classify`]: thunk, calling-convention and module questions asked
//!   of raw symbols
//! - [`legacy`]: the `_Tt` runtime dialect for nominal types
//!
//! The convenience surface lives at the crate root:
//!
//! ```
//! use kea_mangle::DemangleOptions;
//!
//! let display = kea_mangle::demangle_symbol_as_string(
//!     "$s4main3fooyyF",
//!     &DemangleOptions::default(),
//! );
//! assert_eq!(display, "main.foo() -> ()");
//! ```

pub mod classify;
pub mod demangler;
pub mod error;
pub mod flavor;
pub mod kind;
pub mod legacy;
pub mod mangler;
pub mod node;
pub mod printer;
pub mod punycode;
pub mod remangler;
pub mod substitution;
pub mod text;

pub use classify::{
    has_native_calling_convention, is_thunk_symbol, strip_specialization, symbol_module,
    thunk_target,
};
pub use demangler::{demangle_symbol_as_node, demangle_type_as_node, Context, Demangled};
pub use error::{Budget, DemangleError, MangleError};
pub use flavor::{is_mangled_name, recognized_prefix, ManglingFlavor};
pub use kind::Kind;
pub use legacy::remangle_runtime_name;
pub use mangler::ManglingObserver;
pub use node::{NodeArena, NodeId};
pub use printer::{render, DemangleOptions};
pub use remangler::{demangle_required, mangle_node, mangle_node_with_observer, verify_round_trip};

/// Demangles `mangled` for display, echoing the input when it does not
/// demangle or its tree has no display form.
#[must_use]
pub fn demangle_symbol_as_string(mangled: &str, options: &DemangleOptions) -> String {
    match demangle_symbol_as_node(mangled) {
        Ok(demangled) => match render(&demangled.arena, demangled.root, options) {
            Some(display) => display,
            None => {
                tracing::debug!(symbol = mangled, "tree has no display form");
                mangled.to_owned()
            }
        },
        Err(err) => {
            tracing::debug!(symbol = mangled, %err, "demangle failed");
            mangled.to_owned()
        }
    }
}
