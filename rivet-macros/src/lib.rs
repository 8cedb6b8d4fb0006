//! Proc-Macros implementations for rivet

use proc_macro::TokenStream;
use syn::parse_macro_input;

#[cfg(feature = "di-derive")]
mod di;

/// Derive macro for the `Injectable` trait.
///
/// Every field becomes a constructor parameter named after the field (`arg0`, `arg1`, ...
/// for tuple structs) and must implement `Dependency`. Fields marked with
/// `#[injectable(default)]` are not injected and take their [`Default`] value.
/// `#[injectable(dispose)]` on the struct releases instances through their `Dispose` impl
/// when the owning scope is disposed.
///
/// # Example
/// ```ignore
/// use rivet::{Dc, Injectable};
///
/// #[derive(Injectable)]
/// struct Cache;
///
/// #[derive(Injectable)]
/// #[injectable(dispose)]
/// struct Session {
///     cache: Dc<Cache>,
///     #[injectable(default)]
///     hits: std::sync::atomic::AtomicU32,
/// }
///
/// // `Session` expands to:
/// // impl Injectable for Session {
/// //     fn type_def() -> TypeDef {
/// //         TypeDef::of::<Self>()
/// //             .constructor(Constructor::new(
/// //                 [<Dc<Cache> as Dependency>::param("cache")],
/// //                 |args| Ok(Instance::new(Self {
/// //                     cache: <Dc<Cache> as Dependency>::from_arg(args.take(0))?,
/// //                     hits: Default::default(),
/// //                 }))))
/// //             .disposable::<Self>()
/// //     }
/// // }
/// ```
#[cfg(feature = "di-derive")]
#[proc_macro_derive(Injectable, attributes(injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    di::expand_injectable(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
