//! Type inspection helpers shared by the derives.

/// Last path segment of a type, e.g. `Vec` for `std::vec::Vec<u8>`.
fn last_segment(ty: &syn::Type) -> Option<&syn::PathSegment> {
    if let syn::Type::Path(syn::TypePath { path, .. }) = ty {
        return path.segments.last();
    }
    None
}

/// First generic argument of a single-parameter wrapper named `wrapper`.
pub fn generic_inner<'a>(ty: &'a syn::Type, wrapper: &str) -> Option<&'a syn::Type> {
    let seg = last_segment(ty)?;
    if seg.ident != wrapper {
        return None;
    }
    if let syn::PathArguments::AngleBracketed(args) = &seg.arguments {
        if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

pub fn is_option_type(ty: &syn::Type) -> bool {
    generic_inner(ty, "Option").is_some()
}

/// Storage type inferred from a Rust field type, as a `ColumnType` variant name.
pub fn infer_column_type(ty: &syn::Type) -> Option<&'static str> {
    let ty = generic_inner(ty, "Option").unwrap_or(ty);
    if let Some(inner) = generic_inner(ty, "Vec") {
        return match last_segment(inner) {
            Some(seg) if seg.ident == "u8" => Some("Blob"),
            _ => None,
        };
    }
    let ident = last_segment(ty)?.ident.to_string();
    match ident.as_str() {
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "isize" | "usize" => {
            Some("Integer")
        }
        "f32" | "f64" => Some("Real"),
        "bool" => Some("Boolean"),
        "String" | "str" | "Uuid" => Some("Text"),
        "DateTime" | "NaiveDateTime" | "NaiveDate" | "OffsetDateTime" | "PrimitiveDateTime" => {
            Some("Timestamp")
        }
        "Value" | "Json" => Some("Json"),
        _ => None,
    }
}

/// The entity type a relationship field points at: `T` in `Vec<T>`,
/// `Option<T>` or `Box<T>`, or the field type itself.
pub fn relationship_target(ty: &syn::Type) -> syn::Type {
    let mut current = ty;
    loop {
        let next = generic_inner(current, "Vec")
            .or_else(|| generic_inner(current, "Option"))
            .or_else(|| generic_inner(current, "Box"));
        match next {
            Some(inner) => current = inner,
            None => return current.clone(),
        }
    }
}

pub fn is_collection(ty: &syn::Type) -> bool {
    let ty = generic_inner(ty, "Option").unwrap_or(ty);
    generic_inner(ty, "Vec").is_some()
}
