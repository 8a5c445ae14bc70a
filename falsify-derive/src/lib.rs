use proc_macro::{self, TokenStream};
use syn::parse_macro_input;

mod expr;

use expr::stl_expr_impl;

/// Derive the [`IsStlExpr`](falsify::expr::IsStlExpr) marker along with the `!`, `&`
/// and `|` operators for a formula node.
#[proc_macro_derive(StlExpr)]
pub fn stl_expr(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input);
    stl_expr_impl(input)
}
