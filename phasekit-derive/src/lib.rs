//! Derive macros for the model enums in phasekit.
//!
//! The macros implement the boilerplate that dispatches the
//! [Components], [Residual] and [FunctionalContribution] traits
//! to the variants of an enum.
use components::expand_components;
use functional_contribution::expand_functional_contribution;
use proc_macro::TokenStream;
use residual::expand_residual;
use syn::{parse_macro_input, DeriveInput};

mod components;
mod functional_contribution;
mod residual;

type Variants = syn::punctuated::Punctuated<syn::Variant, syn::token::Comma>;

fn enum_variants(input: &DeriveInput) -> syn::Result<&Variants> {
    match &input.data {
        syn::Data::Enum(syn::DataEnum { variants, .. }) => Ok(variants),
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            "this derive macro only works on enums",
        )),
    }
}

#[proc_macro_derive(Components)]
pub fn derive_components(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_components(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Residual)]
pub fn derive_residual(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_residual(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(FunctionalContribution)]
pub fn derive_functional_contribution(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_functional_contribution(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
