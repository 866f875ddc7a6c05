//! Compile errors reported by `#[derive(Entity)]`

use proc_macro2::Span;

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("#[derive(Entity)] only supports structs with named fields, '{entity_name}' is not one")]
    NotAStruct { entity_name: String },

    #[error("No table name specified for entity '{entity_name}'.\n\nPlease add #[lumen(table = \"table_name\")].\n\nExample:\n    #[derive(Entity)]\n    #[lumen(table = \"users\")]\n    struct User {{ ... }}")]
    NoTableName { entity_name: String },

    #[error("No primary key field found in entity '{entity_name}'.\n\nPlease mark one field with #[lumen(id)] or name it 'id'.")]
    NoPrimaryKey { entity_name: String },

    #[error("Multiple primary key fields found in entity '{entity_name}'. Please mark exactly one field with #[lumen(id)].")]
    MultiplePrimaryKeys { entity_name: String },

    #[error("Primary key '{field_name}' of entity '{entity_name}' must be i64 or i32")]
    UnsupportedPrimaryKey {
        entity_name: String,
        field_name: String,
    },

    #[error("Unknown lumen attribute '{attribute}'")]
    UnknownAttribute { attribute: String },
}

impl EntityError {
    pub fn into_syn(self, span: Span) -> syn::Error {
        syn::Error::new(span, self.to_string())
    }
}
