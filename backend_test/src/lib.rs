use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh server over an empty in-memory store, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::model::store::Db`, the storage handle the server is using.
///
/// `#[backend_test(admin)]` logs the client in as the default admin, and
/// `#[backend_test(voter)]` as a freshly registered voter.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as admin/voter if needed.
    let login = match parse_macro_input!(args as Option<Ident>) {
        None => quote! {},
        Some(arg) if arg == "admin" => quote! {
            let config = rocket_client
                .rocket()
                .state::<crate::config::Config>()
                .unwrap();
            let credentials = rocket::serde::json::json!({
                "username": crate::model::db::admin::DEFAULT_ADMIN_USERNAME,
                "password": config.default_admin_password(),
            });
            let response = rocket_client
                .post(uri!("/api", crate::api::admin::login))
                .header(rocket::http::ContentType::JSON)
                .body(credentials.to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), rocket::http::Status::Ok, "admin login failed");
        },
        Some(arg) if arg == "voter" => quote! {
            let request = crate::model::api::voter::OtpRequest::example();
            let code = crate::model::common::code::Code::random();
            crate::model::store::VoterRegistry::issue_code(
                &*db,
                &request.email,
                &request.name,
                code,
                chrono::Utc::now() + chrono::Duration::minutes(5),
            )
            .await
            .unwrap();
            let answer = rocket::serde::json::json!({
                "email": request.email,
                "otp": code.to_string(),
            });
            let response = rocket_client
                .post(uri!("/api", crate::api::user::verify_otp))
                .header(rocket::http::ContentType::JSON)
                .body(answer.to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), rocket::http::Status::Ok, "voter login failed");
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `admin` or `voter`")
                .into_compile_error()
                .into();
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::model::store::Db) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["ballotbox_backend"],
                    None,
                    None,
                );
                let db = crate::model::store::Db::new(crate::model::store::MemoryStore::new());
                let rocket = crate::rocket_for_store(
                    db.clone(),
                    crate::otp::Dispatcher::new(crate::otp::LogSender),
                    crate::test_figment(),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                {
                    #login
                }

                (rocket_client, db)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let (rocket_client, db) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_db = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(type_ident) = type_path.path.get_ident() {
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "Db" {
                        if has_db {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Db`",
                            ));
                        }
                        has_db = true;
                        args.push(quote! { db.clone() });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `db_ident: Db`",
        ));
    }

    Ok(args)
}
