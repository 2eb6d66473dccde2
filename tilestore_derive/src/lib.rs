//! Procedural macros shared by the tilestore crates.
//!
//! Only one macro lives here: [`macro@context`], which wraps the body of a function returning
//! `anyhow::Result` and attaches a formatted context message to any error it produces.
//!
//! ```ignore
//! #[context("reading tile {column}/{row}")]
//! fn read_tile(column: u32, row: u32) -> anyhow::Result<Blob> { ... }
//! ```

mod args;

use crate::args::ContextArgs;
use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::{ToTokens, quote};
use syn::parse_macro_input;

#[proc_macro_attribute]
pub fn context(args: TokenStream, input: TokenStream) -> TokenStream {
	let ContextArgs {
		move_token,
		format_args,
	} = parse_macro_input!(args);
	let mut function = parse_macro_input!(input as syn::ItemFn);

	let body = &function.block;
	let output = &function.sig.output;
	let err = Ident::new("err", Span::mixed_site());

	let wrapped = if function.sig.asyncness.is_some() {
		let syn::ReturnType::Type(_, result_type) = output else {
			return syn::Error::new_spanned(function, "function should return Result")
				.to_compile_error()
				.into();
		};
		let result = Ident::new("result", Span::mixed_site());
		quote! {
			let #result: #result_type = async #move_token { #body }.await;
			#result.map_err(|#err| #err.context(format!(#format_args)).into())
		}
	} else {
		// Moving a non-`Copy` value into the closure makes borrowck treat it as `FnOnce`.
		let once = Ident::new("once", Span::mixed_site());
		quote! {
			let #once = ::core::iter::empty::<()>();
			(#move_token || #output {
				::core::mem::drop(#once);
				#body
			})().map_err(|#err| #err.context(format!(#format_args)).into())
		}
	};
	function.block.stmts = vec![syn::Stmt::Expr(syn::Expr::Verbatim(wrapped), None)];

	function.into_token_stream().into()
}
