use proc_macro::TokenStream;
use quote::quote;
use quote::quote_spanned;
use syn::spanned::Spanned;

/// Runs an `async fn` test inside a tapedeck session.
///
/// `#[session_test("session name")]` or `#[session_test("session name", configure)]`,
/// where `configure` is a `fn(&mut tapedeck::MatchingConfiguration)`.
#[proc_macro_attribute]
pub fn session_test(attrs: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as syn::ItemFn);
    let args = syn::parse_macro_input!(attrs as syn::AttributeArgs);

    let attributes = &input.attrs;
    let visibility = &input.vis;
    let signature = &input.sig;
    let block = &input.block;

    if signature.asyncness.is_none() {
        return quote_spanned! {signature.fn_token.span()=>
            compile_error!("A session test should be an async function!");
        }
        .into();
    }

    if args.is_empty() || args.len() > 2 {
        return quote! {
            compile_error!("A session name and an optional configuration function should be passed to the macro");
        }
        .into();
    }

    let session_name = if let syn::NestedMeta::Lit(syn::Lit::Str(parsed_session_name)) = &args[0] {
        parsed_session_name.value()
    } else {
        return quote_spanned! {args[0].span()=>
            compile_error!("The first argument should be a string literal!");
        }
        .into();
    };

    let configure = match args.get(1) {
        None => quote! {},
        Some(syn::NestedMeta::Meta(syn::Meta::Path(function_path))) => quote! {
            #function_path(&mut __tapedeck_configuration);
        },
        Some(other) => {
            return quote_spanned! {other.span()=>
                compile_error!("The second argument should be a configuration function!");
            }
            .into();
        }
    };

    let output = quote! {
        #[::tokio::test]
        #(#attributes)*
        #visibility #signature {
            #[allow(unused_mut)]
            let mut __tapedeck_configuration = ::tapedeck::MatchingConfiguration::new();
            #configure

            ::tapedeck::__private::run_session(
                #session_name,
                __tapedeck_configuration,
                async move #block,
            )
            .await;
        }
    };

    TokenStream::from(output)
}
