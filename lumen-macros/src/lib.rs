extern crate proc_macro;

mod entity;
mod errors;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `lumen::Entity`, a `<Name>Column` enum and a `<Name>Setters` trait
/// for the entity's create and update builders.
///
/// ```ignore
/// #[derive(Debug, Clone, Default, lumen::Entity)]
/// #[lumen(table = "posts", label = "Post", edges = "POST_EDGES")]
/// pub struct Post {
///     #[lumen(id)]
///     pub id: i64,
///     pub name: String,
///     pub user_id: i64,
///     #[lumen(skip)]
///     pub edges: PostEdges,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(lumen))]
pub fn entity_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match entity::expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
