use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{Ident, ItemFn, ReturnType};

/// Proc macro to denote a Transaction
///
/// Every call is timed and counted as one request; an `Err` return counts as a failed request
/// (the `http_req_failed` metric).
///
/// NOTE: This macro only works on `async` functions with a `Result<T, E>` return value.
///
/// # Example
/// ```ignore
/// use floodgate::prelude::*;
///
/// #[transaction]
/// async fn login(client: &Client) -> Result<StatusCode, MyError> {
///     ...
/// }
/// ```
#[proc_macro_attribute]
pub fn transaction(attr: TokenStream, item: TokenStream) -> TokenStream {
    match transaction_internal(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn transaction_internal(_attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let input: ItemFn = syn::parse2(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[transaction] requires an async fn",
        ));
    }

    let ReturnType::Type(_, ret) = &sig.output else {
        return Err(syn::Error::new_spanned(
            &sig,
            "#[transaction] requires a Result return type",
        ));
    };

    let name = &sig.ident;
    let stmts = &block.stmts;

    Ok(quote! {
        #(#attrs)* #vis #sig {
            let __floodgate_res: #ret = ::floodgate::transaction::transaction_hook(
                ::floodgate::core::TransactionLabels {
                    reqs: concat!("floodgate_", stringify!(#name), "_reqs"),
                    failed: concat!("floodgate_", stringify!(#name), "_failed"),
                    duration: concat!("floodgate_", stringify!(#name), "_duration"),
                },
                async move {
                    #(#stmts)*
                },
            )
            .await;
            __floodgate_res
        }
    })
}

/// Proc macro to denote a Scenario
///
/// NOTE: This macro only works on functions which take no arguments and return nothing. The
/// function body is one iteration of a virtual user.
///
/// See the `Scenario` struct for the builder methods this macro provides on functions.
///
/// # Example
/// ```ignore
/// use floodgate::prelude::*;
///
/// #[scenario]
/// async fn my_scenario() {
/// }
/// ```
#[proc_macro_attribute]
pub fn scenario(attr: TokenStream, item: TokenStream) -> TokenStream {
    match scenario_internal(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn scenario_internal(_attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let input: ItemFn = syn::parse2(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if !sig.inputs.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "#[scenario] functions cannot take arguments",
        ));
    }

    let stmts = &block.stmts;

    let new_name = Ident::new(&format!("__floodgate_{}", sig.ident), Span::call_site());
    let mut new_sig = sig.clone();
    new_sig.ident = new_name.clone();

    let mut scen_sig = sig.clone();
    let scen_name = sig.ident.clone();
    scen_sig.asyncness = None;
    scen_sig.output = syn::parse2(quote! {
        -> impl ::floodgate::scenario::ConfigurableScenario<::floodgate::core::RunStatistics>
    })?;

    Ok(quote! {
        #(#attrs)* #vis #scen_sig {
            ::floodgate::scenario::Scenario::new(stringify!(#scen_name), #new_name)
        }

        #(#attrs)* #vis #new_sig {
            #(#stmts)*
        }
    })
}
