use proc_macro::{self, TokenStream};
use proc_macro2::{Ident, Span};
use quote::{quote, ToTokens};
use syn::DeriveInput;

/// Implement [`IsStlExpr`](falsify::expr::IsStlExpr) and the Boolean connectives
/// (`Not`, `BitOr`, and `BitAnd`) for the input identifier.
///
/// Conjunctions and disjunctions are flattened, so `a & b & c` produces a single
/// `And` node with three arguments.
pub fn stl_expr_impl(input: DeriveInput) -> TokenStream {
    let ident = &input.ident;
    let marker_impl = quote! {
        impl ::falsify::expr::IsStlExpr for #ident {}
    };

    let not_impl = impl_not(&input);
    let or_impl = impl_and_or(&input, Connective::Or);
    let and_impl = impl_and_or(&input, Connective::And);

    let output = quote! {
        #marker_impl
        #not_impl
        #or_impl
        #and_impl
    };

    output.into()
}

fn impl_not(input: &DeriveInput) -> impl ToTokens {
    let ident = &input.ident;
    quote! {
        impl ::core::ops::Not for #ident {
            type Output = ::falsify::expr::StlExpr;

            #[inline]
            fn not(self) -> Self::Output {
                (::falsify::expr::Not { arg: Box::new(self.into()) }).into()
            }
        }
    }
}

enum Connective {
    And,
    Or,
}

fn impl_and_or(input: &DeriveInput, op: Connective) -> impl ToTokens {
    let ident = &input.ident;
    let (trait_name, trait_fn, node) = match op {
        Connective::And => ("BitAnd", "bitand", "And"),
        Connective::Or => ("BitOr", "bitor", "Or"),
    };
    let trait_name = Ident::new(trait_name, Span::call_site());
    let trait_fn = Ident::new(trait_fn, Span::call_site());
    let node = Ident::new(node, Span::call_site());
    quote! {
        impl ::core::ops::#trait_name for #ident {
            type Output = ::falsify::expr::StlExpr;

            #[inline]
            fn #trait_fn(self, other: Self) -> Self::Output {
                use ::falsify::expr::StlExpr;
                use ::falsify::expr::#node;
                let lhs: StlExpr = self.into();
                let rhs: StlExpr = other.into();

                let expr = match (lhs, rhs) {
                    (StlExpr::#node(#node { args: mut left }), StlExpr::#node(#node { args: mut right })) => {
                        left.append(&mut right);
                        #node { args: left }
                    }
                    (StlExpr::#node(#node { mut args }), other) => {
                        args.push(other);
                        #node { args }
                    }
                    (other, StlExpr::#node(#node { mut args })) => {
                        args.insert(0, other);
                        #node { args }
                    }
                    (left, right) => {
                        let args = vec![left, right];
                        #node { args }
                    }
                };
                expr.into()
            }
        }
    }
}
