use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericParam, Generics, Index, parse_quote,
};

/// Options parsed from `#[mark(...)]`
#[derive(Default)]
struct MarkAttrs {
    skip: bool,
    native: bool,
}

fn parse_attrs(attrs: &[Attribute]) -> syn::Result<MarkAttrs> {
    let mut out = MarkAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("mark") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                out.skip = true;
                Ok(())
            } else if meta.path.is_ident("native") {
                out.native = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `native`"))
            }
        })?;
    }
    Ok(out)
}

/// Require `Mark` on every type parameter
fn add_trait_bounds(mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(type_param) = param {
            type_param.bounds.push(parse_quote!(::ejsvm::gc::Mark));
        }
    }
    generics
}

/// Statements marking each non-skipped field, bound through `bindings`
fn mark_fields(fields: &Fields, bindings: &[TokenStream]) -> syn::Result<Vec<TokenStream>> {
    let mut out = Vec::new();
    for (field, binding) in fields.iter().zip(bindings) {
        if parse_attrs(&field.attrs)?.skip {
            continue;
        }
        out.push(quote! { ::ejsvm::gc::Mark::mark(#binding, marker); });
    }
    Ok(out)
}

/// Pattern destructuring `fields` into `__f0, __f1, ...`
fn field_pattern(fields: &Fields) -> (TokenStream, Vec<TokenStream>) {
    let names: Vec<_> = (0..fields.len()).map(|i| format_ident!("__f{}", i)).collect();
    let bindings = names.iter().map(|name| quote!(#name)).collect();
    let pattern = match fields {
        Fields::Named(named) => {
            let idents = named.named.iter().map(|f| f.ident.as_ref());
            quote!({ #(#idents: #names),* })
        }
        Fields::Unnamed(_) => quote!(( #(#names),* )),
        Fields::Unit => quote!(),
    };
    (pattern, bindings)
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let type_attrs = parse_attrs(&input.attrs)?;
    let generics = add_trait_bounds(input.generics.clone());
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => {
            let bindings: Vec<TokenStream> = match &data.fields {
                Fields::Named(named) => named
                    .named
                    .iter()
                    .map(|f| {
                        let ident = &f.ident;
                        quote!(&self.#ident)
                    })
                    .collect(),
                Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
                    .map(|i| {
                        let index = Index::from(i);
                        quote!(&self.#index)
                    })
                    .collect(),
                Fields::Unit => Vec::new(),
            };
            let stmts = mark_fields(&data.fields, &bindings)?;
            quote! { #(#stmts)* }
        }
        Data::Enum(data) => {
            let mut arms = Vec::new();
            for variant in &data.variants {
                let ident = &variant.ident;
                let (pattern, bindings) = field_pattern(&variant.fields);
                let stmts = mark_fields(&variant.fields, &bindings)?;
                arms.push(quote! {
                    #[allow(unused_variables)]
                    Self::#ident #pattern => { #(#stmts)* }
                });
            }
            if arms.is_empty() {
                quote! {}
            } else {
                quote! {
                    match self {
                        #(#arms)*
                    }
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Mark cannot be derived for unions",
            ));
        }
    };

    let native_impl = if type_attrs.native {
        quote! {
            impl #impl_generics ::ejsvm::ejs_value::NativeVar for #name #ty_generics #where_clause {
                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                    self
                }
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl #impl_generics ::ejsvm::gc::Mark for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn mark(&self, marker: &mut ::ejsvm::gc::Marker) {
                #body
            }
        }

        #native_impl
    })
}
