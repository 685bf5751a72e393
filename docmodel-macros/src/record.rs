//! Implementation of #[derive(Record)] and #[derive(Scheme)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Field, Fields, GenericArgument, Ident, LitStr, PathArguments, Token, Type,
    meta::ParseNestedMeta, parse_macro_input,
};

const ID_KEY: &str = "_id";

pub fn derive_impl(input: TokenStream, scheme: bool) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input, scheme) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(e) => e.to_compile_error().into(),
    }
}

/// What a field holds, as decided from its attributes and type.
enum Kind<'a> {
    Plain,
    Identifier,
    Nested(&'a Type),
    Reference { target: &'a Type, slot: Slot },
}

/// How expansion reaches a reference field.
enum Slot {
    Direct,
    Optional,
    None,
}

struct FieldSpec<'a> {
    ident: &'a Ident,
    key: String,
    output: String,
    hidden: bool,
    serialized: bool,
    kind: Kind<'a>,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
    flatten: bool,
    id: bool,
    hidden: bool,
    nested: bool,
    reference: bool,
    serialized: bool,
    output: Option<String>,
}

fn expand(input: &DeriveInput, scheme: bool) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record and Scheme cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record and Scheme require a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(input, "Record and Scheme only work on structs"));
        }
    };

    let rename_all = container_rename_all(input)?;
    let mut specs = Vec::new();
    for field in fields {
        if let Some(spec) = field_spec(field, rename_all.as_deref(), scheme)? {
            specs.push(spec);
        }
    }

    let identifier = if scheme { identifier(&specs, input)? } else { None };

    let descriptors = specs.iter().map(descriptor);
    let slots = specs.iter().filter_map(slot_arm);
    let projections = specs.iter().filter(|spec| !spec.hidden).map(projection);

    let record_impl = quote! {
        impl ::docmodel::scheme::Record for #name {
            fn fields() -> &'static [::docmodel::scheme::FieldDescriptor] {
                static FIELDS: &[::docmodel::scheme::FieldDescriptor] = &[
                    #(#descriptors),*
                ];
                FIELDS
            }

            fn reference_mut(
                &mut self,
                field: &str,
            ) -> ::core::option::Option<&mut dyn ::docmodel::reference::ReferenceSlot> {
                match field {
                    #(#slots)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::docmodel::encoder::Project for #name {
            fn project(&self) -> ::docmodel::error::DocumentStoreResult<::docmodel::bson::Bson> {
                #[allow(unused_mut)]
                let mut projected = ::docmodel::bson::Document::new();
                #(#projections)*
                ::core::result::Result::Ok(::docmodel::bson::Bson::Document(projected))
            }
        }
    };

    if !scheme {
        return Ok(record_impl);
    }

    let scheme_name = name.to_string();
    let (id, id_mut) = match identifier {
        Some(ident) => (
            quote! { ::core::option::Option::Some(&self.#ident) },
            quote! { ::core::option::Option::Some(&mut self.#ident) },
        ),
        None => (
            quote! { ::core::option::Option::None },
            quote! { ::core::option::Option::None },
        ),
    };

    Ok(quote! {
        #record_impl

        impl ::docmodel::scheme::Scheme for #name {
            fn scheme_name() -> &'static str {
                #scheme_name
            }

            fn id(&self) -> ::core::option::Option<&::docmodel::bson::oid::ObjectId> {
                #id
            }

            fn id_mut(&mut self) -> ::core::option::Option<&mut ::docmodel::bson::oid::ObjectId> {
                #id_mut
            }
        }
    })
}

fn field_spec<'a>(field: &'a Field, rename_all: Option<&str>, scheme: bool) -> syn::Result<Option<FieldSpec<'a>>> {
    let Some(ident) = field.ident.as_ref() else {
        return Err(syn::Error::new_spanned(field, "expected a named field"));
    };
    let attrs = field_attrs(field)?;

    if attrs.skip {
        return Ok(None);
    }
    if attrs.flatten {
        return Err(syn::Error::new_spanned(field, "#[serde(flatten)] fields are not supported"));
    }

    let declared = ident.to_string();
    let declared = declared
        .strip_prefix("r#")
        .unwrap_or(&declared)
        .to_string();
    let key = match (&attrs.rename, rename_all) {
        (Some(key), _) => key.clone(),
        (None, Some(rule)) => apply_rename_rule(&declared, rule),
        (None, None) => declared.clone(),
    };

    let is_identifier = scheme && (attrs.id || (declared == "id" && !attrs.nested && !attrs.reference));
    let kind = if is_identifier {
        Kind::Identifier
    } else if let Some((target, slot)) = reference_target(&field.ty) {
        Kind::Reference { target, slot }
    } else if attrs.reference {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "#[scheme(reference)] fields must hold a Ref<T>",
        ));
    } else if attrs.nested {
        Kind::Nested(peel(&field.ty))
    } else {
        Kind::Plain
    };

    // The identifier is exposed under its declared name unless told otherwise.
    let output = match (attrs.output, &kind) {
        (Some(output), _) => output,
        (None, Kind::Identifier) => declared,
        (None, _) => key.clone(),
    };

    Ok(Some(FieldSpec {
        ident,
        key,
        output,
        hidden: attrs.hidden,
        serialized: attrs.serialized,
        kind,
    }))
}

fn identifier<'a>(specs: &[FieldSpec<'a>], input: &DeriveInput) -> syn::Result<Option<&'a Ident>> {
    let mut identifiers = specs
        .iter()
        .filter(|spec| matches!(spec.kind, Kind::Identifier));

    let Some(spec) = identifiers.next() else {
        return Ok(None);
    };
    if let Some(extra) = identifiers.next() {
        return Err(syn::Error::new_spanned(
            extra.ident,
            "a scheme can only have one identifier field",
        ));
    }
    if spec.key != ID_KEY {
        return Err(syn::Error::new_spanned(
            spec.ident,
            format!(
                "the identifier of {} must be stored under `{ID_KEY}`; add #[serde(rename = \"{ID_KEY}\")]",
                input.ident
            ),
        ));
    }

    Ok(Some(spec.ident))
}

fn descriptor(spec: &FieldSpec<'_>) -> TokenStream2 {
    let name = spec.ident.to_string();
    let key = &spec.key;
    let output = &spec.output;
    let hidden = spec.hidden;
    let kind = match &spec.kind {
        Kind::Plain => quote! { ::docmodel::scheme::FieldKind::Plain },
        Kind::Identifier => quote! { ::docmodel::scheme::FieldKind::Identifier },
        Kind::Nested(ty) => quote! {
            ::docmodel::scheme::FieldKind::Nested(<#ty as ::docmodel::scheme::Record>::fields)
        },
        Kind::Reference { target, .. } => quote! {
            ::docmodel::scheme::FieldKind::Reference(<#target as ::docmodel::scheme::Record>::fields)
        },
    };

    quote! {
        ::docmodel::scheme::FieldDescriptor {
            name: #name,
            key: #key,
            output: #output,
            hidden: #hidden,
            kind: #kind,
        }
    }
}

/// Copies one visible field into the projection under its output name.
fn projection(spec: &FieldSpec<'_>) -> TokenStream2 {
    let ident = spec.ident;
    let output = &spec.output;
    let value = if spec.serialized {
        quote! { ::docmodel::encoder::project_serialized(&self.#ident)? }
    } else {
        quote! { ::docmodel::encoder::Project::project(&self.#ident)? }
    };

    quote! {
        projected.insert(#output, #value);
    }
}

fn slot_arm(spec: &FieldSpec<'_>) -> Option<TokenStream2> {
    let Kind::Reference { slot, .. } = &spec.kind else {
        return None;
    };
    let ident = spec.ident;
    let name = ident.to_string();

    match slot {
        Slot::Direct => Some(quote! {
            #name => ::core::option::Option::Some(
                &mut self.#ident as &mut dyn ::docmodel::reference::ReferenceSlot
            ),
        }),
        Slot::Optional => Some(quote! {
            #name => self.#ident
                .as_mut()
                .map(|slot| slot as &mut dyn ::docmodel::reference::ReferenceSlot),
        }),
        Slot::None => None,
    }
}

fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if meta.input.peek(Token![=]) {
                        attrs.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else {
                        meta.parse_nested_meta(|inner| {
                            if inner.path.is_ident("serialize") {
                                attrs.rename = Some(inner.value()?.parse::<LitStr>()?.value());
                                Ok(())
                            } else {
                                skip_meta(&inner)
                            }
                        })?;
                    }
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    attrs.skip = true;
                } else if meta.path.is_ident("flatten") {
                    attrs.flatten = true;
                } else {
                    skip_meta(&meta)?;
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("scheme") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    attrs.id = true;
                } else if meta.path.is_ident("hidden") {
                    attrs.hidden = true;
                } else if meta.path.is_ident("nested") {
                    attrs.nested = true;
                } else if meta.path.is_ident("reference") {
                    attrs.reference = true;
                } else if meta.path.is_ident("serialized") {
                    attrs.serialized = true;
                } else if meta.path.is_ident("output") {
                    attrs.output = Some(meta.value()?.parse::<LitStr>()?.value());
                } else {
                    return Err(meta.error("unsupported scheme attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(attrs)
}

fn container_rename_all(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut rename_all = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                if meta.input.peek(Token![=]) {
                    rename_all = Some(meta.value()?.parse::<LitStr>()?.value());
                } else {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("serialize") {
                            rename_all = Some(inner.value()?.parse::<LitStr>()?.value());
                            Ok(())
                        } else {
                            skip_meta(&inner)
                        }
                    })?;
                }
                Ok(())
            } else {
                skip_meta(&meta)
            }
        })?;
    }

    Ok(rename_all)
}

/// Consumes a serde option this macro has no use for.
fn skip_meta(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }

    Ok(())
}

fn apply_rename_rule(field: &str, rule: &str) -> String {
    let words = field
        .split('_')
        .filter(|word| !word.is_empty());
    let capitalize = |word: &str| {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars)
                .collect::<String>(),
            None => String::new(),
        }
    };

    match rule {
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" => field.to_uppercase(),
        "PascalCase" => words.map(capitalize).collect(),
        "camelCase" => words
            .enumerate()
            .map(|(i, word)| if i == 0 { word.to_string() } else { capitalize(word) })
            .collect(),
        "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.replace('_', "-").to_uppercase(),
        _ => field.to_string(),
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn first_type_argument(segment: &syn::PathSegment) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };

    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

fn unwrap_type<'a>(ty: &'a Type, wrappers: &[&str]) -> Option<&'a Type> {
    let segment = last_segment(ty)?;

    if wrappers.iter().any(|wrapper| segment.ident == wrapper) {
        first_type_argument(segment)
    } else {
        None
    }
}

/// Strips `Vec`, `Option` and `Box` wrappers down to the record type.
fn peel(ty: &Type) -> &Type {
    let mut current = ty;
    while let Some(inner) = unwrap_type(current, &["Vec", "Option", "Box"]) {
        current = inner;
    }

    current
}

/// Finds the scheme a reference field points to, and how expansion can reach it.
fn reference_target(ty: &Type) -> Option<(&Type, Slot)> {
    if let Some(target) = unwrap_type(ty, &["Ref"]) {
        return Some((target, Slot::Direct));
    }
    if let Some(target) = unwrap_type(ty, &["Option"]).and_then(|inner| unwrap_type(inner, &["Ref"])) {
        return Some((target, Slot::Optional));
    }

    unwrap_type(peel(ty), &["Ref"]).map(|target| (target, Slot::None))
}
