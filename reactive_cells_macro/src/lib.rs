//! `#[derive(Store)]` for `reactive_cells`.

use proc_macro2::{Span, TokenStream};
use proc_macro_error2::{abort, abort_call_site, proc_macro_error};
use quote::{format_ident, quote, ToTokens};
use syn::{
    parse::{Parse, ParseStream},
    parse_quote, Field, Fields, Generics, Ident, Result, Type, Visibility,
};

/// Generates a store for a struct.
///
/// For `struct Foo { .. }` this generates `FooStore`, a cheaply cloneable handle with
/// - `FooStore::new(Foo)`,
/// - one accessor per field, returning `&StoreField<FieldType>` (tuple fields are named
///   `field0`, `field1`, ...),
/// - implementations of `Store` (with `snapshot` and `replace`) for the handle and `IntoStore`
///   for `Foo`.
///
/// A field marked `#[store(nested)]` must itself implement `IntoStore`; its accessor returns
/// the nested store.
#[proc_macro_error]
#[proc_macro_derive(Store, attributes(store))]
pub fn derive_store(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    syn::parse_macro_input!(input as Model)
        .into_token_stream()
        .into()
}

struct Model {
    vis: Visibility,
    struct_name: Ident,
    generics: Generics,
    tuple: bool,
    fields: Vec<ModelField>,
}

struct ModelField {
    vis: Visibility,
    /// The name of the accessor and of the slot in the store.
    name: Ident,
    /// How the field is named in the original struct.
    member: syn::Member,
    ty: Type,
    nested: bool,
}

impl Parse for Model {
    fn parse(input: ParseStream) -> Result<Self> {
        let input = syn::DeriveInput::parse(input)?;

        let syn::Data::Struct(s) = input.data else {
            abort_call_site!("only structs can be used with `Store`");
        };

        let (tuple, fields) = match s.fields {
            Fields::Unit => {
                abort!(s.semi_token, "unit structs are not supported");
            }
            Fields::Named(fields) => {
                (false, fields.named.into_iter().collect::<Vec<_>>())
            }
            Fields::Unnamed(fields) => {
                (true, fields.unnamed.into_iter().collect::<Vec<_>>())
            }
        };

        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(idx, field)| ModelField::new(idx, field))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            vis: input.vis,
            struct_name: input.ident,
            generics: input.generics,
            tuple,
            fields,
        })
    }
}

impl ModelField {
    fn new(idx: usize, field: Field) -> Result<Self> {
        let mut nested = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("store") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("nested") {
                    nested = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `nested`"))
                }
            })?;
        }

        let (name, member) = match field.ident {
            Some(ident) => (ident.clone(), syn::Member::Named(ident)),
            None => (
                Ident::new(&format!("field{idx}"), Span::call_site()),
                syn::Member::Unnamed(idx.into()),
            ),
        };

        Ok(Self {
            vis: field.vis,
            name,
            member,
            ty: field.ty,
            nested,
        })
    }

    /// The type held by the store for this field.
    fn slot_ty(&self, library_path: &TokenStream) -> TokenStream {
        let ty = &self.ty;
        if self.nested {
            quote! { <#ty as #library_path::IntoStore>::Store }
        } else {
            quote! { #library_path::StoreField<#ty> }
        }
    }
}

impl ToTokens for Model {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let library_path = quote! { ::reactive_cells::store };
        let traits_path = quote! { ::reactive_cells::traits };
        let Model {
            vis,
            struct_name,
            generics,
            tuple,
            fields,
        } = self;

        let store_name = format_ident!("{struct_name}Store");
        let fields_name = format_ident!("__{struct_name}StoreFields");

        // every type parameter ends up inside an `Rc`-held field that is compared and cloned
        let mut generics = generics.clone();
        let params = generics
            .type_params()
            .map(|param| param.ident.clone())
            .collect::<Vec<_>>();
        {
            let where_clause = generics.make_where_clause();
            for param in &params {
                where_clause
                    .predicates
                    .push(parse_quote! {
                        #param: ::core::clone::Clone + ::core::cmp::PartialEq + 'static
                    });
            }
        }
        let (impl_generics, ty_generics, where_clause) =
            generics.split_for_impl();

        let names = fields.iter().map(|field| &field.name).collect::<Vec<_>>();
        let members =
            fields.iter().map(|field| &field.member).collect::<Vec<_>>();

        let slot_decls = fields.iter().map(|field| {
            let name = &field.name;
            let slot_ty = field.slot_ty(&library_path);
            quote! { #name: #slot_ty }
        });

        let slot_inits = fields.iter().map(|field| {
            let name = &field.name;
            if field.nested {
                quote! { #name: #library_path::IntoStore::into_store(#name) }
            } else {
                quote! { #name: #library_path::StoreField::new(#name) }
            }
        });

        let accessors = fields.iter().map(|field| {
            let ModelField { vis, name, .. } = field;
            let slot_ty = field.slot_ty(&library_path);
            quote! {
                #[inline(always)]
                #vis fn #name(&self) -> &#slot_ty {
                    &self.inner.#name
                }
            }
        });

        let snapshots = fields.iter().map(|field| {
            let name = &field.name;
            if field.nested {
                quote! { #library_path::Store::snapshot(&self.inner.#name) }
            } else {
                quote! { #traits_path::GetUntracked::get_untracked(&self.inner.#name) }
            }
        });

        let replacements = fields.iter().map(|field| {
            let name = &field.name;
            if field.nested {
                quote! { #library_path::Store::replace(&self.inner.#name, #name); }
            } else {
                quote! { #traits_path::Set::set(&self.inner.#name, #name); }
            }
        });

        let destructure = if *tuple {
            quote! { #struct_name(#(#names),*) }
        } else {
            quote! { #struct_name { #(#members: #names),* } }
        };
        let rebuild = if *tuple {
            quote! { #struct_name(#(#snapshots),*) }
        } else {
            quote! { #struct_name { #(#members: #snapshots),* } }
        };

        let store_name_str = store_name.to_string();
        let store_doc = format!("The store generated for [`{struct_name}`].");

        tokens.extend(quote! {
            #[doc = #store_doc]
            #vis struct #store_name #impl_generics #where_clause {
                inner: ::std::rc::Rc<#fields_name #ty_generics>,
            }

            #[doc(hidden)]
            #vis struct #fields_name #impl_generics #where_clause {
                #(#slot_decls),*
            }

            impl #impl_generics #store_name #ty_generics #where_clause {
                /// Wraps `model` in a store. No field is instrumented until it is read
                /// reactively.
                #[track_caller]
                #vis fn new(model: #struct_name #ty_generics) -> Self {
                    let #destructure = model;
                    Self {
                        inner: ::std::rc::Rc::new(#fields_name {
                            #(#slot_inits),*
                        }),
                    }
                }

                #(#accessors)*
            }

            impl #impl_generics ::core::clone::Clone for #store_name #ty_generics #where_clause {
                fn clone(&self) -> Self {
                    Self {
                        inner: ::std::rc::Rc::clone(&self.inner),
                    }
                }
            }

            impl #impl_generics ::core::cmp::PartialEq for #store_name #ty_generics #where_clause {
                fn eq(&self, other: &Self) -> bool {
                    ::std::rc::Rc::ptr_eq(&self.inner, &other.inner)
                }
            }

            impl #impl_generics ::core::cmp::Eq for #store_name #ty_generics #where_clause {}

            impl #impl_generics ::core::fmt::Debug for #store_name #ty_generics #where_clause {
                fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                    f.debug_struct(#store_name_str)
                        .field("ptr", &::std::rc::Rc::as_ptr(&self.inner))
                        .finish()
                }
            }

            impl #impl_generics #library_path::Store for #store_name #ty_generics #where_clause {
                type Model = #struct_name #ty_generics;

                fn snapshot(&self) -> Self::Model {
                    #rebuild
                }

                fn replace(&self, model: Self::Model) {
                    let #destructure = model;
                    #(#replacements)*
                }
            }

            impl #impl_generics #library_path::IntoStore for #struct_name #ty_generics #where_clause {
                type Store = #store_name #ty_generics;

                #[track_caller]
                fn into_store(self) -> Self::Store {
                    #store_name::new(self)
                }
            }
        });
    }
}
