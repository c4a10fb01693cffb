use super::{enum_variants, Variants};
use quote::quote;
use syn::DeriveInput;

pub(crate) fn expand_components(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let variants = enum_variants(&input)?;
    Ok(impl_components(&input.ident, variants))
}

fn impl_components(ident: &syn::Ident, variants: &Variants) -> proc_macro2::TokenStream {
    let components = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(model) => model.components()
        }
    });
    let subset = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(model) => Self::#name(model.subset(component_list))
        }
    });

    quote! {
        impl phasekit_core::Components for #ident {
            fn components(&self) -> usize {
                match self {
                    #(#components,)*
                }
            }
            fn subset(&self, component_list: &[usize]) -> Self {
                match self {
                    #(#subset,)*
                }
            }
        }
    }
}
