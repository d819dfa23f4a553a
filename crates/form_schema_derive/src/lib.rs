use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormModel derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let model_ident = input.ident;
    let fields_struct_ident = format_ident!("{model_ident}Fields");

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "FormModel derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormModel derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let root = form_schema_path();
    let mut key_methods = Vec::new();
    let mut read_arms = Vec::new();
    let mut write_arms = Vec::new();
    let mut key_list = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_ty = field.ty;
        let field_name = field_ident.to_string();

        key_methods.push(quote! {
            pub const fn #field_ident(&self) -> #root::form::FieldKey {
                #root::form::FieldKey::new(#field_name)
            }
        });

        read_arms.push(quote! {
            #field_name => ::core::option::Option::Some(
                <#field_ty as #root::form::FieldType>::to_field_value(&self.#field_ident),
            ),
        });

        write_arms.push(quote! {
            #field_name => {
                self.#field_ident = #root::form::decode_field::<#field_ty>(key, value)?;
                ::core::result::Result::Ok(())
            }
        });

        key_list.push(quote! {
            #root::form::FieldKey::new(#field_name)
        });
    }

    quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #fields_struct_ident;

        impl #fields_struct_ident {
            #(#key_methods)*
        }

        impl #root::form::FormModel for #model_ident {
            type Fields = #fields_struct_ident;

            fn fields() -> Self::Fields {
                #fields_struct_ident
            }
        }

        impl #root::form::FormValues for #model_ident {
            fn field(
                &self,
                key: &#root::form::FieldKey,
            ) -> ::core::option::Option<#root::form::FieldValue> {
                match key.as_str() {
                    #(#read_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn set_field(
                &mut self,
                key: &#root::form::FieldKey,
                value: #root::form::FieldValue,
            ) -> #root::form::FormResult<()> {
                match key.as_str() {
                    #(#write_arms)*
                    _ => ::core::result::Result::Err(
                        #root::form::FormError::UnknownField(key.clone()),
                    ),
                }
            }

            fn field_keys(&self) -> ::std::vec::Vec<#root::form::FieldKey> {
                ::std::vec![#(#key_list),*]
            }
        }
    }
    .into()
}

fn form_schema_path() -> TokenStream2 {
    match crate_name("form_schema") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) | Err(_) => quote!(::form_schema),
    }
}
