//! Derive macro for error enums.
//!
//! Generates `std::fmt::Display` and `std::error::Error`. When the enum carries a
//! type-level `#[kind(Type)]` attribute, every variant must name one of `Type`'s
//! variants with `#[kind(Variant)]`, and a `kind()` accessor is generated.
//!
//! # Usage
//!
//! ```ignore
//! use provrb_derive::Error;
//!
//! #[derive(Debug, Error)]
//! #[kind(ErrorKind)]
//! pub enum MyError {
//!     #[error("unknown opcode '{0}'")]
//!     #[kind(Syntax)]
//!     UnknownOpcode(String),
//!
//!     #[error("stack overflow (capacity {capacity})")]
//!     #[kind(Runtime)]
//!     StackOverflow { capacity: usize },
//! }
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive only supports enums",
            ));
        }
    };

    let kind_type = ident_attr(&input.attrs, "kind")?;

    let mut display_arms = Vec::with_capacity(data.variants.len());
    let mut kind_arms = Vec::with_capacity(data.variants.len());

    for variant in &data.variants {
        let variant_name = &variant.ident;
        let message = message_attr(&variant.attrs)?.ok_or_else(|| {
            syn::Error::new_spanned(
                variant_name,
                format!("variant `{variant_name}` is missing #[error(\"...\")]"),
            )
        })?;

        let pattern = match &variant.fields {
            Fields::Unit => quote! { Self::#variant_name },
            Fields::Unnamed(fields) => {
                let names = (0..fields.unnamed.len()).map(|i| format_ident!("f{}", i));
                quote! { Self::#variant_name(#(#names),*) }
            }
            Fields::Named(fields) => {
                let names = fields.named.iter().map(|f| &f.ident);
                quote! { Self::#variant_name { #(#names),* } }
            }
        };

        let display = match &variant.fields {
            Fields::Unit => quote! { write!(f, #message) },
            Fields::Unnamed(fields) => {
                let format = positional_to_named(&message.value(), fields.unnamed.len());
                let names: Vec<_> = (0..fields.unnamed.len())
                    .map(|i| format_ident!("f{}", i))
                    .filter(|name| mentions(&format, name))
                    .collect();
                quote! { write!(f, #format, #(#names = #names),*) }
            }
            Fields::Named(fields) => {
                let format = message.value();
                let names: Vec<_> = fields
                    .named
                    .iter()
                    .filter_map(|f| f.ident.as_ref())
                    .filter(|name| mentions(&format, name))
                    .collect();
                quote! { write!(f, #format, #(#names = #names),*) }
            }
        };
        display_arms.push(quote! {
            #[allow(unused_variables)]
            #pattern => #display,
        });

        if let Some(kind_type) = &kind_type {
            let kind = ident_attr(&variant.attrs, "kind")?.ok_or_else(|| {
                syn::Error::new_spanned(
                    variant_name,
                    format!("variant `{variant_name}` is missing #[kind(...)]"),
                )
            })?;
            let wildcard = match &variant.fields {
                Fields::Unit => quote! { Self::#variant_name },
                Fields::Unnamed(_) => quote! { Self::#variant_name(..) },
                Fields::Named(_) => quote! { Self::#variant_name { .. } },
            };
            kind_arms.push(quote! { #wildcard => #kind_type::#kind, });
        }
    }

    let kind_impl = kind_type.map(|kind_type| {
        quote! {
            impl #impl_generics #name #ty_generics #where_clause {
                /// Returns the error class this value belongs to.
                pub fn kind(&self) -> #kind_type {
                    match self {
                        #(#kind_arms)*
                    }
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#display_arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}

        #kind_impl
    })
}

/// Reads `#[error("...")]`.
fn message_attr(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    for attr in attrs {
        if attr.path().is_ident("error") {
            return attr.parse_args::<LitStr>().map(Some).map_err(|_| {
                syn::Error::new_spanned(
                    attr,
                    "expected a string literal, e.g. #[error(\"invalid register '{0}'\")]",
                )
            });
        }
    }
    Ok(None)
}

/// Reads a single-identifier attribute such as `#[kind(Runtime)]`.
fn ident_attr(attrs: &[Attribute], name: &str) -> syn::Result<Option<Ident>> {
    for attr in attrs {
        if attr.path().is_ident(name) {
            return attr.parse_args::<Ident>().map(Some).map_err(|_| {
                syn::Error::new_spanned(attr, format!("expected #[{name}(Identifier)]"))
            });
        }
    }
    Ok(None)
}

/// Whether the format string interpolates `name`; unused named arguments do not compile.
fn mentions(format: &str, name: &Ident) -> bool {
    format.contains(&format!("{{{name}}}")) || format.contains(&format!("{{{name}:"))
}

/// Rewrites `{0}`, `{1:?}` into `{f0}`, `{f1:?}` so tuple fields can be passed by name.
fn positional_to_named(format: &str, field_count: usize) -> String {
    let mut result = format.to_string();
    for i in (0..field_count).rev() {
        result = result
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    result
}
