use super::{enum_variants, Variants};
use quote::quote;
use syn::{DeriveInput, Generics, Ident};

pub(crate) fn expand_functional_contribution(
    input: DeriveInput,
) -> syn::Result<proc_macro2::TokenStream> {
    let variants = enum_variants(&input)?;
    let functional_contribution =
        impl_functional_contribution(&input.ident, &input.generics, variants);
    let from = impl_from(&input.ident, &input.generics, variants)?;
    Ok(quote! {
        #functional_contribution
        #from
    })
}

fn impl_functional_contribution(
    ident: &Ident,
    generics: &Generics,
    variants: &Variants,
) -> proc_macro2::TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let name = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(functional_contribution) => functional_contribution.name()
        }
    });
    let weight_functions = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(functional_contribution) => functional_contribution.weight_functions(temperature)
        }
    });
    let helmholtz_energy_density = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(functional_contribution) => functional_contribution.helmholtz_energy_density(temperature, weighted_densities)
        }
    });

    quote! {
        impl #impl_generics phasekit_dft::FunctionalContribution for #ident #ty_generics #where_clause {
            fn name(&self) -> &'static str {
                match self {
                    #(#name,)*
                }
            }
            fn weight_functions<N: num_dual::DualNum<f64> + Copy>(
                &self,
                temperature: N,
            ) -> phasekit_dft::WeightFunctionInfo<N> {
                match self {
                    #(#weight_functions,)*
                }
            }
            fn helmholtz_energy_density<N: num_dual::DualNum<f64> + Copy>(
                &self,
                temperature: N,
                weighted_densities: ndarray::ArrayView2<N>,
            ) -> phasekit_core::EosResult<ndarray::Array1<N>> {
                match self {
                    #(#helmholtz_energy_density,)*
                }
            }
        }
    }
}

fn impl_from(
    ident: &Ident,
    generics: &Generics,
    variants: &Variants,
) -> syn::Result<proc_macro2::TokenStream> {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let mut from = Vec::with_capacity(variants.len());
    for v in variants.iter() {
        let name = &v.ident;
        let inner = match &v.fields {
            syn::Fields::Unnamed(syn::FieldsUnnamed { unnamed, .. }) if unnamed.len() == 1 => {
                &unnamed[0].ty
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    v,
                    "all variants must be tuple variants with a single field",
                ))
            }
        };
        from.push(quote! {
            impl #impl_generics From<#inner> for #ident #ty_generics #where_clause {
                fn from(variant: #inner) -> Self {
                    Self::#name(variant)
                }
            }
        });
    }
    Ok(quote! {
        #(#from)*
    })
}
