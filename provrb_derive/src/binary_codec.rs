//! Derive macro for the program image encoding.
//!
//! Generates `Encode` and `Decode` from `crate::types::encoding`. Struct fields are
//! written in declaration order. Enums write a `u8` discriminant (explicit values are
//! honored, otherwise counted up from the previous variant) followed by the fields of
//! the active variant. Decoding an unknown discriminant yields `DecodeError::InvalidValue`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Expr, Fields, Lit, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => {
            let (pattern, writes) = bind_fields(quote! { Self }, &data.fields);
            let construct = read_fields(quote! { Self }, &data.fields);
            (
                quote! {
                    let #pattern = self;
                    #(#writes)*
                },
                quote! { Ok(#construct) },
            )
        }
        Data::Enum(data) => expand_enum(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "BinaryCodec derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

fn expand_enum(data: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let mut encode_arms = Vec::with_capacity(data.variants.len());
    let mut decode_arms = Vec::with_capacity(data.variants.len());
    let mut next: u16 = 0;

    for variant in &data.variants {
        let discriminant = match &variant.discriminant {
            Some((_, expr)) => literal_u8(expr)?,
            None => u8::try_from(next).map_err(|_| {
                syn::Error::new_spanned(variant, "BinaryCodec supports at most 256 variants")
            })?,
        };
        next = u16::from(discriminant) + 1;

        let ident = &variant.ident;
        let (pattern, writes) = bind_fields(quote! { Self::#ident }, &variant.fields);
        let construct = read_fields(quote! { Self::#ident }, &variant.fields);

        encode_arms.push(quote! {
            #pattern => {
                crate::types::encoding::Encode::encode(&#discriminant, out);
                #(#writes)*
            }
        });
        decode_arms.push(quote! { #discriminant => Ok(#construct), });
    }

    Ok((
        quote! {
            match self {
                #(#encode_arms)*
            }
        },
        quote! {
            let discriminant: u8 = crate::types::encoding::Decode::decode(input)?;
            match discriminant {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}

/// Builds a destructuring pattern for `path` plus one `encode` call per bound field.
fn bind_fields(path: TokenStream2, fields: &Fields) -> (TokenStream2, Vec<TokenStream2>) {
    match fields {
        Fields::Unit => (path, Vec::new()),
        Fields::Unnamed(unnamed) => {
            let names: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            let writes = names
                .iter()
                .map(|n| quote! { crate::types::encoding::Encode::encode(#n, out); })
                .collect();
            (quote! { #path(#(#names),*) }, writes)
        }
        Fields::Named(named) => {
            let names: Vec<_> = named.named.iter().map(|f| &f.ident).collect();
            let writes = names
                .iter()
                .map(|n| quote! { crate::types::encoding::Encode::encode(#n, out); })
                .collect();
            (quote! { #path { #(#names),* } }, writes)
        }
    }
}

/// Builds a constructor expression for `path` reading each field in order.
fn read_fields(path: TokenStream2, fields: &Fields) -> TokenStream2 {
    match fields {
        Fields::Unit => path,
        Fields::Unnamed(unnamed) => {
            let reads = unnamed
                .unnamed
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)? });
            quote! { #path(#(#reads),*) }
        }
        Fields::Named(named) => {
            let reads = named.named.iter().map(|f| {
                let name = &f.ident;
                quote! { #name: crate::types::encoding::Decode::decode(input)? }
            });
            quote! { #path { #(#reads),* } }
        }
    }
}

fn literal_u8(expr: &Expr) -> syn::Result<u8> {
    if let Expr::Lit(expr_lit) = expr
        && let Lit::Int(int) = &expr_lit.lit
    {
        return int.base10_parse::<u8>();
    }
    Err(syn::Error::new_spanned(
        expr,
        "BinaryCodec discriminants must be integer literals in 0..=255",
    ))
}
