//! Derive macros for the Convergent reactive graph
//!
//! This crate provides procedural macros to reduce boilerplate when declaring
//! the signals an application emits.
//!
//! # Available Macros
//!
//! - `#[derive(Signal)]` - Implements `SignalKind` for a fieldless enum
//!
//! # Example
//!
//! ```ignore
//! use convergent_macros::Signal;
//!
//! #[derive(Signal, Clone, Copy, Debug)]
//! enum TodoSignal {
//!     #[intent]
//!     NewTodo,
//!
//!     #[internal]
//!     RenderList,
//! }
//!
//! // Generated:
//! assert_eq!(TodoSignal::NewTodo.name(), "newtodo");
//! assert!(TodoSignal::NewTodo.is_intent());
//! assert!(TodoSignal::RenderList.is_internal());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derive macro for signal enums
///
/// Generates:
/// - `impl convergent_core::signal::SignalKind` where each variant's name is
///   its identifier lowercased (`NewTodo` → `"newtodo"`), unless overridden
///   with `#[signal(name = "...")]`
/// - `is_intent()` / `is_internal()` from the variant markers
/// - `ALL`, every variant in declaration order
/// - `from_name(&str)`, the inverse of `name()`
///
/// # Attributes
///
/// - `#[intent]` - Signal raised by a user interaction
/// - `#[internal]` - Signal raised by the graph itself
/// - `#[signal(name = "...")]` - Explicit wire name
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-enum type
/// - A variant carries fields
/// - A variant has both `#[intent]` and `#[internal]` attributes
/// - Two variants share a wire name
#[proc_macro_derive(Signal, attributes(intent, internal, signal))]
pub fn derive_signal(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(
            &input,
            "#[derive(Signal)] can only be used on enums"
        )
        .to_compile_error()
        .into();
    };

    let mut variants = Vec::new();
    let mut wire_names: Vec<String> = Vec::new();
    let mut intent_variants = Vec::new();
    let mut internal_variants = Vec::new();

    for variant in &data_enum.variants {
        let variant_name = &variant.ident;

        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(
                variant,
                "Signal variants cannot carry fields; payloads travel as values"
            )
            .to_compile_error()
            .into();
        }

        let is_intent = has_attribute(&variant.attrs, "intent");
        let is_internal = has_attribute(&variant.attrs, "internal");
        if is_intent && is_internal {
            return syn::Error::new_spanned(
                variant,
                "Variant cannot be both #[intent] and #[internal]"
            )
            .to_compile_error()
            .into();
        }

        let wire_name = match explicit_name(&variant.attrs) {
            Ok(Some(explicit)) => explicit,
            Ok(None) => variant_name.to_string().to_lowercase(),
            Err(error) => return error.to_compile_error().into(),
        };
        if wire_names.contains(&wire_name) {
            return syn::Error::new_spanned(
                variant,
                format!("Signal name '{wire_name}' is used by more than one variant")
            )
            .to_compile_error()
            .into();
        }

        if is_intent {
            intent_variants.push(variant_name);
        }
        if is_internal {
            internal_variants.push(variant_name);
        }
        variants.push(variant_name);
        wire_names.push(wire_name);
    }

    if variants.is_empty() {
        return syn::Error::new_spanned(&input, "#[derive(Signal)] needs at least one variant")
            .to_compile_error()
            .into();
    }

    let is_intent_body = marker_check(&intent_variants);
    let is_internal_body = marker_check(&internal_variants);

    let name_arms = variants
        .iter()
        .zip(&wire_names)
        .map(|(variant, wire)| quote! { Self::#variant => #wire, });
    let from_name_arms = variants
        .iter()
        .zip(&wire_names)
        .map(|(variant, wire)| quote! { #wire => ::core::option::Option::Some(Self::#variant), });

    let expanded = quote! {
        impl ::convergent_core::signal::SignalKind for #name {
            fn name(&self) -> &'static str {
                match self {
                    #(#name_arms)*
                }
            }
        }

        impl #name {
            /// Every signal, in declaration order
            pub const ALL: &'static [Self] = &[#(Self::#variants),*];

            /// Returns true if this signal is raised by a user interaction
            #[must_use]
            pub const fn is_intent(&self) -> bool {
                #is_intent_body
            }

            /// Returns true if this signal is raised by the graph itself
            #[must_use]
            pub const fn is_internal(&self) -> bool {
                #is_internal_body
            }

            /// Looks a signal up by its wire name
            #[must_use]
            pub fn from_name(name: &str) -> ::core::option::Option<Self> {
                match name {
                    #(#from_name_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Body of an `is_*` predicate over the marked variants
fn marker_check(marked: &[&syn::Ident]) -> proc_macro2::TokenStream {
    if marked.is_empty() {
        quote! { false }
    } else {
        quote! { matches!(self, #(Self::#marked)|*) }
    }
}

/// Reads `#[signal(name = "...")]` if present
fn explicit_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut found = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("signal")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                found = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(found)
}

/// Helper function to check if an attribute list contains a specific attribute
fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
