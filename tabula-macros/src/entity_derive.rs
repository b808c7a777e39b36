use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::crate_path::tabula_data_path;
use crate::types::{infer_column_type, is_collection, is_option_type, relationship_target};

pub fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match generate(&input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

const COLUMN_TYPES: &[&str] = &["Integer", "Real", "Text", "Boolean", "Blob", "Timestamp", "Json"];

/// Parsed `#[column(...)]` of a plain field.
#[derive(Default)]
struct ColumnAttr {
    name: Option<String>,
    sql_type: Option<String>,
    primary_key: bool,
    nullable: bool,
    unique: bool,
    skip: bool,
}

/// Parsed `#[relationship(...)]` of an edge field.
#[derive(Default)]
struct RelationshipAttr {
    kind: Option<&'static str>,
    target: Option<syn::Type>,
    local: Vec<String>,
    remote: Vec<String>,
    innerjoin: Option<bool>,
}

enum FieldKind {
    Column(ColumnAttr),
    Relationship(RelationshipAttr),
}

pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Extract `#[entity(table = "...")]` from the struct.
fn extract_table(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut table = None;
    for attr in &input.attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    let lit: syn::LitStr = meta.value()?.parse()?;
                    table = Some(lit.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `table` in #[entity(table = \"...\")]"))
                }
            })?;
        }
    }
    Ok(table)
}

fn parse_field(field: &syn::Field) -> syn::Result<FieldKind> {
    let mut column = ColumnAttr::default();
    let mut relationship: Option<RelationshipAttr> = None;

    for attr in &field.attrs {
        if attr.path().is_ident("column") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    column.primary_key = true;
                } else if meta.path.is_ident("nullable") {
                    column.nullable = true;
                } else if meta.path.is_ident("unique") {
                    column.unique = true;
                } else if meta.path.is_ident("skip") {
                    column.skip = true;
                } else if meta.path.is_ident("name") {
                    let lit: syn::LitStr = meta.value()?.parse()?;
                    column.name = Some(lit.value());
                } else if meta.path.is_ident("sql_type") {
                    let lit: syn::LitStr = meta.value()?.parse()?;
                    if !COLUMN_TYPES.contains(&lit.value().as_str()) {
                        return Err(syn::Error::new_spanned(
                            &lit,
                            format!("unknown column type, expected one of {}", COLUMN_TYPES.join(", ")),
                        ));
                    }
                    column.sql_type = Some(lit.value());
                } else {
                    return Err(meta.error(
                        "expected one of `primary_key`, `nullable`, `unique`, `skip`, `name`, `sql_type`",
                    ));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("relationship") {
            let rel = relationship.get_or_insert_with(RelationshipAttr::default);
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("one_to_many") {
                    rel.kind = Some("OneToMany");
                } else if meta.path.is_ident("many_to_one") {
                    rel.kind = Some("ManyToOne");
                } else if meta.path.is_ident("one_to_one") {
                    rel.kind = Some("OneToOne");
                } else if meta.path.is_ident("target") {
                    rel.target = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("local") {
                    let lit: syn::LitStr = meta.value()?.parse()?;
                    rel.local.push(lit.value());
                } else if meta.path.is_ident("remote") {
                    let lit: syn::LitStr = meta.value()?.parse()?;
                    rel.remote.push(lit.value());
                } else if meta.path.is_ident("innerjoin") {
                    let lit: syn::LitBool = meta.value()?.parse()?;
                    rel.innerjoin = Some(lit.value);
                } else {
                    return Err(meta.error(
                        "expected one of `one_to_many`, `many_to_one`, `one_to_one`, `target`, `local`, `remote`, `innerjoin`",
                    ));
                }
                Ok(())
            })?;
        }
    }

    match relationship {
        Some(rel) => Ok(FieldKind::Relationship(rel)),
        None => Ok(FieldKind::Column(column)),
    }
}

fn generate(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let krate = tabula_data_path();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[derive(Entity)] does not support generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "#[derive(Entity)] only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "#[derive(Entity)] can only be used on structs",
            ))
        }
    };

    let type_name = name.to_string();
    let table = extract_table(input)?.unwrap_or_else(|| snake_case(&type_name));

    let parsed: Vec<(&syn::Field, FieldKind)> = fields
        .iter()
        .map(|f| parse_field(f).map(|kind| (f, kind)))
        .collect::<syn::Result<_>>()?;

    let first_pk = parsed.iter().find_map(|(field, kind)| match kind {
        FieldKind::Column(col) if col.primary_key => Some(
            col.name
                .clone()
                .unwrap_or_else(|| field.ident.as_ref().map(|i| i.to_string()).unwrap_or_default()),
        ),
        _ => None,
    });
    let Some(owner_pk) = first_pk else {
        return Err(syn::Error::new_spanned(
            name,
            "#[derive(Entity)] requires at least one #[column(primary_key)] field",
        ));
    };

    let mut attributes = Vec::new();
    for (field, kind) in &parsed {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = ident.to_string();
        match kind {
            FieldKind::Column(col) if col.skip => {}
            FieldKind::Column(col) => {
                let column_name = col.name.clone().unwrap_or_else(|| field_name.clone());
                let sql_type = match (&col.sql_type, infer_column_type(&field.ty)) {
                    (Some(explicit), _) => explicit.clone(),
                    (None, Some(inferred)) => inferred.to_string(),
                    (None, None) => {
                        return Err(syn::Error::new_spanned(
                            &field.ty,
                            "cannot infer the column type; add #[column(sql_type = \"...\")] \
                             or #[relationship(...)] for an edge",
                        ))
                    }
                };
                let variant = format_ident!("{}", sql_type);
                let mut meta = quote! {
                    #krate::ColumnMeta::new(#column_name, #krate::ColumnType::#variant)
                };
                if col.primary_key {
                    meta = quote!(#meta.primary_key());
                }
                if col.nullable || is_option_type(&field.ty) {
                    meta = quote!(#meta.nullable());
                }
                if col.unique {
                    meta = quote!(#meta.unique());
                }
                attributes.push(quote!(#krate::Attribute::Column(#meta)));
            }
            FieldKind::Relationship(rel) => {
                let collection = is_collection(&field.ty);
                let kind = rel
                    .kind
                    .unwrap_or(if collection { "OneToMany" } else { "ManyToOne" });
                let kind_ident = format_ident!("{}", kind);
                let target = rel
                    .target
                    .clone()
                    .unwrap_or_else(|| relationship_target(&field.ty));

                let (local, remote) = if rel.local.is_empty() && rel.remote.is_empty() {
                    if kind == "OneToMany" {
                        (vec![owner_pk.clone()], vec![format!("{}_id", snake_case(&type_name))])
                    } else {
                        (vec![format!("{field_name}_id")], vec!["id".to_string()])
                    }
                } else {
                    (rel.local.clone(), rel.remote.clone())
                };
                if local.len() != remote.len() {
                    return Err(syn::Error::new_spanned(
                        ident,
                        "#[relationship] needs as many `local` as `remote` columns",
                    ));
                }
                let pairs = local.iter().zip(&remote).map(|(l, r)| quote!((#l, #r)));

                let mut meta = quote! {
                    #krate::RelationshipMeta::new(
                        #field_name,
                        #krate::RelationKind::#kind_ident,
                        <#target as #krate::Entity>::meta,
                        &[#(#pairs),*],
                    )
                };
                if let Some(inner) = rel.innerjoin {
                    meta = quote!(#meta.innerjoin(#inner));
                }
                attributes.push(quote!(#krate::Attribute::Relationship(#meta)));
            }
        }
    }

    let count = attributes.len();

    Ok(quote! {
        impl #krate::Entity for #name {
            fn meta() -> &'static #krate::EntityMeta {
                static ATTRIBUTES: [#krate::Attribute; #count] = [#(#attributes),*];
                static META: #krate::EntityMeta =
                    #krate::EntityMeta::new(#type_name, #table, &ATTRIBUTES);
                &META
            }
        }

        impl #krate::Schema for #name {
            fn descriptor() -> &'static #krate::SchemaDescriptor {
                static DESCRIPTOR: #krate::SchemaDescriptor = #krate::SchemaDescriptor::entity(
                    #type_name,
                    <#name as #krate::Entity>::meta,
                );
                &DESCRIPTOR
            }

            fn from_row(row: #krate::Row) -> ::std::result::Result<Self, #krate::DataError> {
                #krate::from_row_serde(row)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("Parent"), "parent");
        assert_eq!(snake_case("OrderLine"), "order_line");
    }
}
