//! Path of the data crate as seen from the deriving crate.
//!
//! Users depend either on the `tabula` facade, which re-exports everything
//! under its root, or on `tabula-data` directly.

use proc_macro2::{Span, TokenStream};
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

fn found_path(found: FoundCrate) -> TokenStream {
    match found {
        FoundCrate::Itself => quote!(crate),
        FoundCrate::Name(name) => {
            let ident = syn::Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
    }
}

/// `::tabula` when the facade is a dependency, else `::tabula_data`.
pub fn tabula_data_path() -> TokenStream {
    ["tabula", "tabula-data"]
        .into_iter()
        .find_map(|name| crate_name(name).ok())
        .map(found_path)
        .unwrap_or_else(|| quote!(::tabula_data))
}
