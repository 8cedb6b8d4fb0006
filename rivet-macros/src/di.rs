//! Macros for dependency injection

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Fields, spanned::Spanned};

/// Creates a derive-macro for `Injectable`
pub(super) fn expand_injectable(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "`Injectable` cannot be derived for generic types, implement it manually"
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.ident.span(), "`Injectable` can only be derived for structs"));
    };

    let name = &input.ident;
    let dispose = has_flag(&input.attrs, "dispose")?;

    let mut params = Vec::new();
    let mut values = Vec::new();
    for (index, field) in data.fields.iter().enumerate() {
        if has_flag(&field.attrs, "default")? {
            values.push(quote! { ::core::default::Default::default() });
            continue;
        }

        let ty = &field.ty;
        let param = param_name(field, index);
        let arg = params.len();
        params.push(quote! { <#ty as ::rivet::Dependency>::param(#param) });
        values.push(quote! { <#ty as ::rivet::Dependency>::from_arg(args.take(#arg))? });
    }

    let value = match &data.fields {
        Fields::Named(fields) => {
            let names = fields.named.iter().map(|f| &f.ident);
            quote! { Self { #(#names: #values),* } }
        }
        Fields::Unnamed(_) => quote! { Self(#(#values),*) },
        Fields::Unit => quote! { Self },
    };

    let args = if params.is_empty() {
        format_ident!("_args")
    } else {
        format_ident!("args")
    };
    let disposable = dispose.then(|| quote! { .disposable::<Self>() });

    Ok(quote! {
        impl ::rivet::Injectable for #name {
            fn type_def() -> ::rivet::TypeDef {
                ::rivet::TypeDef::of::<Self>()
                    .constructor(::rivet::Constructor::new(
                        [#(#params),*],
                        |#args: &mut ::rivet::Args| -> ::core::result::Result<::rivet::Instance, ::rivet::Error> {
                            ::core::result::Result::Ok(::rivet::Instance::new(#value))
                        }
                    ))
                    #disposable
            }
        }
    })
}

fn param_name(field: &Field, index: usize) -> String {
    match &field.ident {
        Some(ident) => ident.to_string().trim_start_matches("r#").to_owned(),
        None => format!("arg{index}"),
    }
}

fn has_flag(attrs: &[syn::Attribute], flag: &str) -> syn::Result<bool> {
    let mut found = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("injectable")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(flag) {
                found = true;
                Ok(())
            } else if meta.path.is_ident("dispose") || meta.path.is_ident("default") {
                Err(meta.error("attribute is not supported here"))
            } else {
                Err(meta.error("unknown `injectable` attribute"))
            }
        })?;
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn it_expands_named_struct() {
        let input: DeriveInput = parse_quote! {
            struct Session {
                cache: Dc<Cache>,
                #[injectable(default)]
                hits: u32,
            }
        };

        let output = expand_injectable(&input).unwrap().to_string();

        assert!(output.contains("impl :: rivet :: Injectable for Session"));
        assert!(output.contains("param (\"cache\")"));
        assert!(output.contains("args . take (0usize)"));
        assert!(output.contains(":: core :: default :: Default :: default ()"));
        assert!(!output.contains("disposable"));
    }

    #[test]
    fn it_expands_tuple_struct_with_dispose() {
        let input: DeriveInput = parse_quote! {
            #[injectable(dispose)]
            struct Handle(Dc<Pool>, u32);
        };

        let output = expand_injectable(&input).unwrap().to_string();

        assert!(output.contains("param (\"arg0\")"));
        assert!(output.contains("param (\"arg1\")"));
        assert!(output.contains("disposable :: < Self >"));
    }

    #[test]
    fn it_expands_unit_struct() {
        let input: DeriveInput = parse_quote! { struct Clock; };

        let output = expand_injectable(&input).unwrap().to_string();

        assert!(output.contains("| _args : & mut :: rivet :: Args |"));
    }

    #[test]
    fn it_rejects_enums_and_generics() {
        let input: DeriveInput = parse_quote! { enum Mode { A, B } };
        assert!(expand_injectable(&input).is_err());

        let input: DeriveInput = parse_quote! { struct Wrapper<T>(T); };
        assert!(expand_injectable(&input).is_err());
    }

    #[test]
    fn it_rejects_unknown_attributes() {
        let input: DeriveInput = parse_quote! {
            #[injectable(singleton)]
            struct Clock;
        };

        assert!(expand_injectable(&input).is_err());
    }
}
