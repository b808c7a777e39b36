use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::crate_path::tabula_data_path;

pub fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match generate(&input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Extract `#[schema(entity = Type)]` from the struct.
fn extract_binding(input: &DeriveInput) -> syn::Result<Option<syn::Type>> {
    let mut binding = None;
    for attr in &input.attrs {
        if attr.path().is_ident("schema") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("entity") {
                    binding = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `entity` in #[schema(entity = Type)]"))
                }
            })?;
        }
    }
    Ok(binding)
}

/// The attribute path a field stands for, or `None` for `#[schema(skip)]`.
fn field_path(field: &syn::Field) -> syn::Result<Option<String>> {
    let mut path = field.ident.as_ref().map(|i| i.to_string());
    let mut skip = false;
    for attr in &field.attrs {
        if attr.path().is_ident("schema") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else if meta.path.is_ident("name") {
                    let lit: syn::LitStr = meta.value()?.parse()?;
                    path = Some(lit.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `name = \"...\"`"))
                }
            })?;
        }
    }
    Ok(if skip { None } else { path })
}

fn generate(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let krate = tabula_data_path();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[derive(Schema)] does not support generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "#[derive(Schema)] only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "#[derive(Schema)] can only be used on structs",
            ))
        }
    };

    let mut paths = Vec::new();
    for field in fields {
        if let Some(path) = field_path(field)? {
            paths.push(path);
        }
    }

    let type_name = name.to_string();
    let descriptor = match extract_binding(input)? {
        Some(entity) => quote! {
            #krate::SchemaDescriptor::projection(
                #type_name,
                <#entity as #krate::Schema>::descriptor,
                &[#(#paths),*],
            )
        },
        None => quote! {
            #krate::SchemaDescriptor::unbound(#type_name, &[#(#paths),*])
        },
    };

    Ok(quote! {
        impl #krate::Schema for #name {
            fn descriptor() -> &'static #krate::SchemaDescriptor {
                static DESCRIPTOR: #krate::SchemaDescriptor = #descriptor;
                &DESCRIPTOR
            }

            fn from_row(row: #krate::Row) -> ::std::result::Result<Self, #krate::DataError> {
                #krate::from_row_serde(row)
            }
        }
    })
}
