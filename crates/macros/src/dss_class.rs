//! DssClass derive macro implementation

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{GenericArgument, PathArguments, Type};

use crate::parse::{parse_dss_class, DssClassArgs, DssFieldArgs};

/// Property kinds, mirroring `dssobj_core::schema::PropertyKind`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int32,
    Float64,
    String,
    Object,
    Int32Array,
    Float64Array,
    StringArray,
    ObjectArray,
}

impl Kind {
    fn parse(text: &str) -> Option<Self> {
        let kind = match text.to_ascii_lowercase().as_str() {
            "bool" => Kind::Bool,
            "int32" | "i32" | "enum" => Kind::Int32,
            "float64" | "f64" => Kind::Float64,
            "string" => Kind::String,
            "object" => Kind::Object,
            "int32[]" => Kind::Int32Array,
            "float64[]" => Kind::Float64Array,
            "string[]" => Kind::StringArray,
            "object[]" => Kind::ObjectArray,
            _ => return None,
        };
        Some(kind)
    }

    /// Kind implied by the Rust type of the field
    fn infer(ty: &Type) -> Option<Self> {
        let ident = last_ident(ty)?;
        let kind = match ident.as_str() {
            "bool" => Kind::Bool,
            "i32" => Kind::Int32,
            "f64" => Kind::Float64,
            "String" => Kind::String,
            "ObjectHandle" => Kind::Object,
            "Option" => match generic_arg(ty).and_then(last_ident).as_deref() {
                Some("ObjectHandle") => Kind::Object,
                _ => return None,
            },
            "Vec" => match generic_arg(ty).and_then(last_ident).as_deref() {
                Some("i32") => Kind::Int32Array,
                Some("f64") => Kind::Float64Array,
                Some("String") => Kind::StringArray,
                Some("ObjectHandle") => Kind::ObjectArray,
                _ => return None,
            },
            _ => return None,
        };
        Some(kind)
    }

    fn tokens(self) -> TokenStream {
        let variant = match self {
            Kind::Bool => quote!(Bool),
            Kind::Int32 => quote!(Int32),
            Kind::Float64 => quote!(Float64),
            Kind::String => quote!(String),
            Kind::Object => quote!(Object),
            Kind::Int32Array => quote!(Int32Array),
            Kind::Float64Array => quote!(Float64Array),
            Kind::StringArray => quote!(StringArray),
            Kind::ObjectArray => quote!(ObjectArray),
        };
        quote!(::dssobj_core::schema::PropertyKind::#variant)
    }

    /// Rust type the generated accessors use
    fn value_type(self) -> TokenStream {
        match self {
            Kind::Bool => quote!(bool),
            Kind::Int32 => quote!(i32),
            Kind::Float64 => quote!(f64),
            Kind::String => quote!(::std::string::String),
            Kind::Object => quote!(::dssobj_core::ObjectHandle),
            Kind::Int32Array => quote!(i32),
            Kind::Float64Array => quote!(f64),
            Kind::StringArray => quote!(::std::string::String),
            Kind::ObjectArray => quote!(::dssobj_core::ObjectHandle),
        }
    }
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

/// First generic argument of a path type (`T` in `Foo<T>`)
fn generic_arg(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if let PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// Extract the inner type from `PhantomData<T>` if present, otherwise return the type as-is
fn extract_inner_type(ty: &Type) -> &Type {
    if is_phantom_data(ty) {
        if let Some(inner) = generic_arg(ty) {
            return inner;
        }
    }
    ty
}

/// Check if a type is PhantomData
fn is_phantom_data(ty: &Type) -> bool {
    last_ident(ty).map(|i| i == "PhantomData").unwrap_or(false)
}

/// Generate the DssClass implementation
pub fn derive_dss_class(input: syn::DeriveInput) -> TokenStream {
    match parse_dss_class(&input) {
        Ok(args) => generate_impl(args).unwrap_or_else(|e| e.to_compile_error()),
        Err(e) => e.write_errors(),
    }
}

fn field_kind(field: &DssFieldArgs) -> syn::Result<Kind> {
    let ty = extract_inner_type(&field.ty);
    let kind = match &field.kind {
        Some(text) => Kind::parse(text),
        None => Kind::infer(ty),
    };
    kind.ok_or_else(|| {
        syn::Error::new_spanned(
            &field.ty,
            "cannot map this type to a property kind; add #[dss(kind = \"...\")]",
        )
    })
}

fn generate_impl(args: DssClassArgs) -> syn::Result<TokenStream> {
    let struct_name = &args.ident;
    let class_name = &args.class_name;
    let class_index = args.index;

    let fields = match args.data {
        darling::ast::Data::Struct(fields) => fields.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                &args.ident,
                "DssClass can only be derived for structs",
            ))
        }
    };

    if !fields.iter().any(|f| f.is_handle_field()) {
        return Err(syn::Error::new_spanned(
            &args.ident,
            "DssClass needs a `handle: ObjectHandle` field",
        ));
    }

    let mut defs = Vec::new();
    let mut constants = Vec::new();
    let mut accessors = Vec::new();
    for field in fields.iter().filter(|f| f.is_property()) {
        let kind = field_kind(field)?;
        let index = field.index.unwrap_or_default();
        let clean_name = field.clean_name();
        let prop_name = field.name.clone().unwrap_or_else(|| clean_name.clone());
        let kind_tokens = kind.tokens();

        defs.push(quote! {
            ::dssobj_core::schema::PropertyDef::new(#prop_name, #index, #kind_tokens)
        });

        let const_name = format_ident!("{}", clean_name.to_uppercase());
        let const_doc = format!("Property index of `{}`", prop_name);
        constants.push(quote! {
            #[doc = #const_doc]
            pub const #const_name: i32 = #index;
        });

        accessors.push(generate_accessors(field, kind, &clean_name, &prop_name));
    }

    let field_inits: Vec<_> = fields
        .iter()
        .filter(|f| !f.is_handle_field())
        .filter_map(|f| {
            let ident = f.ident.as_ref()?;
            if is_phantom_data(&f.ty) {
                Some(quote! { #ident: ::std::marker::PhantomData })
            } else {
                Some(quote! { #ident: ::std::default::Default::default() })
            }
        })
        .collect();

    let static_name = format_ident!("__{}_SCHEMA", struct_name.to_string().to_uppercase());

    Ok(quote! {
        #[doc(hidden)]
        static #static_name: ::dssobj_core::schema::ClassSchema =
            ::dssobj_core::schema::ClassSchema::new(#class_index, #class_name, &[#(#defs),*]);

        impl #struct_name {
            #(#constants)*
            #(#accessors)*
        }

        impl ::dssobj_core::schema::DssClass for #struct_name {
            const CLASS_NAME: &'static str = #class_name;
            const CLASS_INDEX: u32 = #class_index;

            fn schema() -> &'static ::dssobj_core::schema::ClassSchema {
                &#static_name
            }

            fn from_handle(handle: ::dssobj_core::ObjectHandle) -> Self {
                Self {
                    handle,
                    #(#field_inits),*
                }
            }

            fn handle(&self) -> &::dssobj_core::ObjectHandle {
                &self.handle
            }
        }
    })
}

fn generate_accessors(field: &DssFieldArgs, kind: Kind, clean_name: &str, prop_name: &str) -> TokenStream {
    let getter_name = format_ident!("{}", clean_name);
    let setter_name = format_ident!("set_{}", clean_name);
    let index_const = format_ident!("{}", clean_name.to_uppercase());
    let value_ty = kind.value_type();

    let getter_doc = format!("Get the value of `{}`", prop_name);
    let setter_doc = format!("Set the value of `{}`", prop_name);

    let (getter, setter) = match kind {
        Kind::Bool | Kind::Int32 | Kind::Float64 | Kind::String => (
            quote! {
                pub fn #getter_name(&self) -> ::dssobj_core::DssResult<#value_ty> {
                    self.handle.get::<#value_ty>(Self::#index_const)
                }
            },
            quote! {
                pub fn #setter_name(
                    &self,
                    value: #value_ty,
                    flags: ::dssobj_core::SetterFlags,
                ) -> ::dssobj_core::DssResult<()> {
                    self.handle.set::<#value_ty>(Self::#index_const, value, flags)
                }
            },
        ),
        Kind::Int32Array | Kind::Float64Array | Kind::StringArray => (
            quote! {
                pub fn #getter_name(&self) -> ::dssobj_core::DssResult<::std::vec::Vec<#value_ty>> {
                    self.handle.get_array::<#value_ty>(Self::#index_const)
                }
            },
            quote! {
                pub fn #setter_name(
                    &self,
                    values: &[#value_ty],
                    flags: ::dssobj_core::SetterFlags,
                ) -> ::dssobj_core::DssResult<()> {
                    self.handle.set_array::<#value_ty>(Self::#index_const, values, flags)
                }
            },
        ),
        Kind::Object => (
            quote! {
                pub fn #getter_name(&self) -> ::dssobj_core::DssResult<::std::option::Option<#value_ty>> {
                    self.handle.get_object_ref(Self::#index_const)
                }
            },
            quote! {
                pub fn #setter_name(
                    &self,
                    value: ::std::option::Option<&#value_ty>,
                    flags: ::dssobj_core::SetterFlags,
                ) -> ::dssobj_core::DssResult<()> {
                    self.handle.set_object_ref(Self::#index_const, value, flags)
                }
            },
        ),
        Kind::ObjectArray => (
            quote! {
                pub fn #getter_name(
                    &self,
                ) -> ::dssobj_core::DssResult<::std::vec::Vec<::std::option::Option<#value_ty>>> {
                    self.handle.get_object_refs(Self::#index_const)
                }
            },
            quote! {
                pub fn #setter_name(
                    &self,
                    values: &[#value_ty],
                    flags: ::dssobj_core::SetterFlags,
                ) -> ::dssobj_core::DssResult<()> {
                    self.handle.set_object_refs(Self::#index_const, values, flags)
                }
            },
        ),
    };

    let setter = if field.readonly {
        quote! {}
    } else {
        quote! {
            #[doc = #setter_doc]
            #setter
        }
    };

    quote! {
        #[doc = #getter_doc]
        #getter
        #setter
    }
}
