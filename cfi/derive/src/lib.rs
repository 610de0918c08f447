/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the control flow integrity attribute macros. A wrapped
    function is split into an outer shim and an inner body; the inner body
    bumps the CFI counter and the shim checks that it came back down.

--*/

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, ToTokens};
use syn::{parse_macro_input, parse_quote, FnArg, ItemFn};

/// Wrap a free function.
#[proc_macro_attribute]
pub fn cfi_mod_fn(_args: TokenStream, input: TokenStream) -> TokenStream {
    cfi_fn(CallKind::Free, input)
}

/// Wrap an associated function or method.
#[proc_macro_attribute]
pub fn cfi_impl_fn(_args: TokenStream, input: TokenStream) -> TokenStream {
    cfi_fn(CallKind::Assoc, input)
}

#[derive(Clone, Copy)]
enum CallKind {
    Free,
    Assoc,
}

fn param_names(item: &ItemFn) -> Vec<TokenStream2> {
    item.sig
        .inputs
        .iter()
        .map(|input| match input {
            FnArg::Receiver(r) => r.self_token.to_token_stream(),
            FnArg::Typed(p) => p.pat.to_token_stream(),
        })
        .collect()
}

fn cfi_fn(kind: CallKind, input: TokenStream) -> TokenStream {
    let mut shim: ItemFn = parse_macro_input!(input as ItemFn);

    let mut body = shim.clone();
    body.sig.ident = format_ident!("__cfi_{}", shim.sig.ident);
    body.attrs.retain(|attr| attr.path.is_ident("allow"));
    body.vis = syn::Visibility::Inherited;

    let inner = &body.sig.ident;
    let params = param_names(&body);
    let call = match kind {
        CallKind::Free => quote!(#inner( #(#params,)* )),
        CallKind::Assoc => quote!(Self::#inner( #(#params,)* )),
    };

    shim.block.stmts = parse_quote!(
        let saved_ctr = swapboot_cfi_lib::CfiCounter::read();
        swapboot_cfi_lib::CfiCounter::delay();
        let ret = #call;
        swapboot_cfi_lib::CfiCounter::delay();
        let new_ctr = swapboot_cfi_lib::CfiCounter::decrement();
        swapboot_cfi_lib::CfiCounter::assert_eq(saved_ctr, new_ctr);
        ret
    );
    shim.attrs.push(parse_quote!(#[inline(always)]));

    body.block.stmts.insert(
        0,
        parse_quote!(
            swapboot_cfi_lib::CfiCounter::increment();
        ),
    );

    quote! {
        #shim
        #body
    }
    .into()
}
