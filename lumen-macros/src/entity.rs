use heck::ToUpperCamelCase;
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, Path, PathArguments, Type};

use crate::errors::EntityError;

struct EntityAttrs {
    table: Option<String>,
    label: Option<String>,
    edges: Option<Path>,
}

struct FieldInfo {
    ident: Ident,
    column: String,
    variant: Ident,
    ty: Type,
    /// Inner type of an `Option<T>` field
    nullable: Option<Type>,
    is_id: bool,
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let entity_name = name.to_string();
    let vis = &input.vis;

    let attrs = parse_entity_attrs(input)?;
    let table = attrs.table.ok_or_else(|| {
        EntityError::NoTableName {
            entity_name: entity_name.clone(),
        }
        .into_syn(name.span())
    })?;
    let label = attrs.label.unwrap_or_else(|| entity_name.clone());
    let edges = match attrs.edges {
        Some(path) => quote! { #path },
        None => quote! { &[] },
    };

    let fields = collect_fields(input)?;
    let id = primary_key(&entity_name, &fields, name.span())?;
    let id_ident = &id.ident;
    let id_column = &id.column;
    if !is_integer_key(&id.ty) {
        return Err(EntityError::UnsupportedPrimaryKey {
            entity_name,
            field_name: id.ident.to_string(),
        }
        .into_syn(id.ident.span()));
    }

    let column_enum = format_ident!("{}Column", name);
    let setters = format_ident!("{}Setters", name);

    // primary key first, declaration order otherwise
    let mut ordered: Vec<&FieldInfo> = vec![id];
    ordered.extend(fields.iter().filter(|f| !f.is_id));

    let variants: Vec<&Ident> = ordered.iter().map(|f| &f.variant).collect();
    let columns: Vec<&String> = ordered.iter().map(|f| &f.column).collect();
    let idents: Vec<&Ident> = ordered.iter().map(|f| &f.ident).collect();
    let types: Vec<&Type> = ordered.iter().map(|f| &f.ty).collect();

    let field_specs = fields.iter().filter(|f| !f.is_id).map(|f| {
        let column = &f.column;
        let nullable = f.nullable.is_some();
        quote! { ::lumen::FieldSpec { column: #column, nullable: #nullable } }
    });

    let setter_fns = fields.iter().filter(|f| !f.is_id).map(|f| setter_methods(f, &column_enum));

    Ok(quote! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #vis enum #column_enum {
            #(#variants),*
        }

        impl #column_enum {
            pub const ALL: &'static [#column_enum] = &[#(#column_enum::#variants),*];
        }

        impl ::lumen::Column for #column_enum {
            type Entity = #name;

            fn as_str(&self) -> &'static str {
                match self {
                    #(#column_enum::#variants => #columns),*
                }
            }

            fn all() -> &'static [Self] {
                Self::ALL
            }
        }

        impl ::core::convert::AsRef<str> for #column_enum {
            fn as_ref(&self) -> &str {
                ::lumen::Column::as_str(self)
            }
        }

        impl ::core::fmt::Display for #column_enum {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(::lumen::Column::as_str(self))
            }
        }

        impl ::lumen::Entity for #name {
            type Column = #column_enum;

            const SCHEMA: &'static ::lumen::TableSchema = &::lumen::TableSchema {
                label: #label,
                table: #table,
                id_column: #id_column,
                columns: &[#(#columns),*],
                fields: &[#(#field_specs),*],
                edges: #edges,
            };

            fn id(&self) -> i64 {
                ::core::convert::Into::<i64>::into(self.#id_ident)
            }

            fn assign(
                &mut self,
                column: &str,
                row: &::lumen::sea_orm::QueryResult,
            ) -> ::core::result::Result<(), ::lumen::sea_orm::DbErr> {
                match column {
                    #(#columns => {
                        self.#idents = row.try_get("", #columns)?;
                    })*
                    _ => {
                        return ::core::result::Result::Err(::lumen::sea_orm::DbErr::Type(
                            ::std::format!("unknown column {:?} for {}", column, #label),
                        ));
                    }
                }
                ::core::result::Result::Ok(())
            }

            fn assign_value(
                &mut self,
                column: &str,
                value: ::lumen::sea_orm::Value,
            ) -> ::core::result::Result<(), ::lumen::sea_orm::sea_query::ValueTypeErr> {
                match column {
                    #(#columns => {
                        self.#idents =
                            <#types as ::lumen::sea_orm::sea_query::ValueType>::try_from(value)?;
                    })*
                    _ => return ::core::result::Result::Err(::lumen::sea_orm::sea_query::ValueTypeErr),
                }
                ::core::result::Result::Ok(())
            }
        }

        #vis trait #setters: ::lumen::MutationBuilder<#name> {
            #(#setter_fns)*
        }

        impl #setters for ::lumen::Create<#name> {}
        impl #setters for ::lumen::Update<#name> {}
        impl #setters for ::lumen::UpdateOne<#name> {}
    })
}

fn setter_methods(field: &FieldInfo, column_enum: &Ident) -> TokenStream {
    let variant = &field.variant;
    let set = format_ident!("set_{}", field.ident);
    match &field.nullable {
        Some(inner) => {
            let set_nillable = format_ident!("set_nillable_{}", field.ident);
            let clear = format_ident!("clear_{}", field.ident);
            let (param, convert) = setter_param(inner);
            quote! {
                fn #set(self, value: #param) -> Self {
                    ::lumen::MutationBuilder::set(self, #column_enum::#variant, #convert)
                }

                fn #set_nillable(self, value: ::core::option::Option<#inner>) -> Self {
                    match value {
                        ::core::option::Option::Some(value) => {
                            ::lumen::MutationBuilder::set(self, #column_enum::#variant, value)
                        }
                        ::core::option::Option::None => self,
                    }
                }

                fn #clear(self) -> Self {
                    ::lumen::MutationBuilder::clear(self, #column_enum::#variant)
                }
            }
        }
        None => {
            let (param, convert) = setter_param(&field.ty);
            quote! {
                fn #set(self, value: #param) -> Self {
                    ::lumen::MutationBuilder::set(self, #column_enum::#variant, #convert)
                }
            }
        }
    }
}

// String setters accept anything convertible into a String
fn setter_param(ty: &Type) -> (TokenStream, TokenStream) {
    if last_segment_is(ty, "String") {
        (
            quote! { impl ::core::convert::Into<::std::string::String> },
            quote! { ::core::convert::Into::<::std::string::String>::into(value) },
        )
    } else {
        (quote! { #ty }, quote! { value })
    }
}

fn parse_entity_attrs(input: &DeriveInput) -> syn::Result<EntityAttrs> {
    let mut attrs = EntityAttrs {
        table: None,
        label: None,
        edges: None,
    };
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("lumen")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                attrs.table = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("label") {
                attrs.label = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("edges") {
                attrs.edges = Some(meta.value()?.parse::<LitStr>()?.parse::<Path>()?);
            } else {
                return Err(EntityError::UnknownAttribute {
                    attribute: path_name(&meta.path),
                }
                .into_syn(meta.path.span()));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn collect_fields(input: &DeriveInput) -> syn::Result<Vec<FieldInfo>> {
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => return Err(not_a_struct(input)),
        },
        _ => return Err(not_a_struct(input)),
    };

    let mut fields = Vec::new();
    for field in named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let mut column = ident.to_string();
        let mut is_id = false;
        let mut skip = false;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("lumen")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    is_id = true;
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("column") {
                    column = meta.value()?.parse::<LitStr>()?.value();
                } else {
                    return Err(EntityError::UnknownAttribute {
                        attribute: path_name(&meta.path),
                    }
                    .into_syn(meta.path.span()));
                }
                Ok(())
            })?;
        }
        if skip {
            continue;
        }
        fields.push(FieldInfo {
            variant: format_ident!("{}", ident.to_string().to_upper_camel_case()),
            nullable: option_inner(&field.ty),
            ty: field.ty.clone(),
            ident,
            column,
            is_id,
        });
    }
    if !fields.iter().any(|f| f.is_id) {
        if let Some(id) = fields.iter_mut().find(|f| f.ident == "id") {
            id.is_id = true;
        }
    }
    Ok(fields)
}

fn primary_key<'a>(
    entity_name: &str,
    fields: &'a [FieldInfo],
    span: Span,
) -> syn::Result<&'a FieldInfo> {
    let marked: Vec<&FieldInfo> = fields.iter().filter(|f| f.is_id).collect();
    match marked.as_slice() {
        [id] => Ok(id),
        [] => Err(EntityError::NoPrimaryKey {
            entity_name: entity_name.to_string(),
        }
        .into_syn(span)),
        _ => Err(EntityError::MultiplePrimaryKeys {
            entity_name: entity_name.to_string(),
        }
        .into_syn(span)),
    }
}

fn not_a_struct(input: &DeriveInput) -> syn::Error {
    EntityError::NotAStruct {
        entity_name: input.ident.to_string(),
    }
    .into_syn(input.ident.span())
}

fn path_name(path: &Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn last_segment_is(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Path(p) => p.path.segments.last().is_some_and(|s| s.ident == name),
        _ => false,
    }
}

fn is_integer_key(ty: &Type) -> bool {
    last_segment_is(ty, "i64") || last_segment_is(ty, "i32")
}

fn option_inner(ty: &Type) -> Option<Type> {
    let Type::Path(p) = ty else {
        return None;
    };
    let segment = p.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner.clone()),
            _ => None,
        },
        _ => None,
    }
}
