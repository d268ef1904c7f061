//! Derive macros for the provrb crate.
//!
//! Provides:
//! - `#[derive(BinaryCodec)]` - binary image encoding for program types
//! - `#[derive(Error)]` - `Display`/`Error` impls plus an optional `kind()` classifier

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` from `crate::types::encoding`.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error`, and `kind()` when variants carry `#[kind(...)]`.
#[proc_macro_derive(Error, attributes(error, kind))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
