//! Procedural macros for relmap.
//!
//! `#[derive(Model)]` generates the `relmap_core::Model` and
//! `relmap_core::ParamSource` implementations for a struct with named
//! fields. Generated code refers to `relmap_core` by path, so the crate using
//! the derive must depend on `relmap-core` (directly or through `relmap`).
//!
//! ```ignore
//! #[derive(Model, Debug, Default)]
//! #[relmap(table = "teams")]
//! struct Team {
//!     #[relmap(primary_key, auto_increment)]
//!     id: i64,
//!     name: String,
//!     #[relmap(has_many = "heroes")]
//!     heroes: Vec<Hero>,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model_derive;

/// Derive `Model` and `ParamSource`.
///
/// Struct attribute: `#[relmap(table = "name")]`.
///
/// Field attributes: `primary_key`, `auto_increment`, `column = "c"`,
/// `rename = "alias"`, `ignore`, and one of `has_one`, `has_many`,
/// `belongs_to` (optionally `= "target_table"`).
#[proc_macro_derive(Model, attributes(relmap))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match model_derive::parse_model(&input) {
        Ok(def) => model_derive::generate_model_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
