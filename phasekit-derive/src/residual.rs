use super::{enum_variants, Variants};
use quote::quote;
use syn::DeriveInput;

pub(crate) fn expand_residual(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let variants = enum_variants(&input)?;
    Ok(impl_residual(&input.ident, variants))
}

fn impl_residual(ident: &syn::Ident, variants: &Variants) -> proc_macro2::TokenStream {
    let compute_max_density = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(residual) => residual.compute_max_density(moles)
        }
    });
    let residual_helmholtz_energy_contributions = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(residual) => residual.residual_helmholtz_energy_contributions(state)
        }
    });
    let critical_point_guess = variants.iter().map(|v| {
        let name = &v.ident;
        quote! {
            Self::#name(residual) => residual.critical_point_guess(moles)
        }
    });

    quote! {
        impl phasekit_core::Residual for #ident {
            fn compute_max_density(&self, moles: &ndarray::Array1<f64>) -> f64 {
                match self {
                    #(#compute_max_density,)*
                }
            }
            fn residual_helmholtz_energy_contributions<D: num_dual::DualNum<f64> + Copy>(
                &self,
                state: &phasekit_core::StateHD<D>,
            ) -> Vec<(String, D)> {
                match self {
                    #(#residual_helmholtz_energy_contributions,)*
                }
            }
            fn critical_point_guess(&self, moles: &ndarray::Array1<f64>) -> f64 {
                match self {
                    #(#critical_point_guess,)*
                }
            }
        }
    }
}
