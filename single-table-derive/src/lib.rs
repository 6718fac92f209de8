use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Path, Token, Type, parse::ParseStream,
    parse_macro_input,
};

#[proc_macro_derive(Model, attributes(model, unique_key, search_key, relation))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

enum Role {
    Plain,
    UniqueKey,
    SearchKey,
    Relation { target: Path, raise_if_missing: bool },
}

struct ModelField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    name: String,
    role: Role,
}

fn unraw(ident: &Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
}

fn check_name(name: &str, span: proc_macro2::Span) -> syn::Result<()> {
    if name.is_empty() || name.contains('#') {
        return Err(syn::Error::new(
            span,
            format!("`{}` is not a valid name: `#` is reserved as key separator", name),
        ));
    }
    Ok(())
}

fn model_name(input: &DeriveInput) -> syn::Result<String> {
    let mut name = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                check_name(&value.value(), value.span())?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported model attribute, expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name.unwrap_or_else(|| input.ident.to_string().to_lowercase()))
}

fn field_role(field: &syn::Field) -> syn::Result<Role> {
    let mut role = None;
    for attr in &field.attrs {
        let next = if attr.path().is_ident("unique_key") {
            attr.meta.require_path_only()?;
            Role::UniqueKey
        } else if attr.path().is_ident("search_key") {
            attr.meta.require_path_only()?;
            Role::SearchKey
        } else if attr.path().is_ident("relation") {
            attr.parse_args_with(|input: ParseStream| {
                let target: Path = input.parse()?;
                let mut raise_if_missing = false;
                if input.peek(Token![,]) {
                    input.parse::<Token![,]>()?;
                    let flag: Ident = input.parse()?;
                    if flag != "raise_if_missing" {
                        return Err(syn::Error::new(
                            flag.span(),
                            "expected `raise_if_missing`",
                        ));
                    }
                    raise_if_missing = true;
                }
                Ok(Role::Relation {
                    target,
                    raise_if_missing,
                })
            })?
        } else {
            continue;
        };
        if role.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "a field takes at most one of `unique_key`, `search_key`, `relation`",
            ));
        }
        role = Some(next);
    }
    Ok(role.unwrap_or(Role::Plain))
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic types",
        ));
    }

    // 解析结构体字段
    let named = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new(
                    struct_name.span(),
                    "Model requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Model can only be derived for structs",
            ));
        }
    };

    let model_name = model_name(input)?;

    let mut fields = Vec::new();
    for field in named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = unraw(ident);
        check_name(&name, ident.span())?;
        fields.push(ModelField {
            ident,
            ty: &field.ty,
            name,
            role: field_role(field)?,
        });
    }

    let unique_keys = fields
        .iter()
        .filter(|f| matches!(f.role, Role::UniqueKey))
        .count();
    if unique_keys != 1 {
        return Err(syn::Error::new(
            struct_name.span(),
            format!(
                "Model `{}` must have exactly one #[unique_key] field, found {}",
                struct_name, unique_keys
            ),
        ));
    }

    let field_specs = fields.iter().map(|f| {
        let name = &f.name;
        let ty = f.ty;
        let spec = match &f.role {
            Role::Plain => quote! { single_table::FieldSpec::plain(#name) },
            Role::UniqueKey => quote! { single_table::FieldSpec::unique_key(#name) },
            Role::SearchKey => quote! { single_table::FieldSpec::search_key(#name) },
            Role::Relation {
                target,
                raise_if_missing,
            } => quote! {
                single_table::FieldSpec::relation(
                    #name,
                    single_table::ModelRef::new(<#target as single_table::Model>::schema),
                )
                .raise_if_missing(#raise_if_missing)
            },
        };
        quote! { #spec.of_kind(<#ty as single_table::ToValue>::KIND) }
    });

    // 唯一键字段可直接转换为关联字段的值
    let Some(unique) = fields.iter().find(|f| matches!(f.role, Role::UniqueKey)) else {
        return Err(syn::Error::new(struct_name.span(), "missing #[unique_key] field"));
    };
    let unique_ident = unique.ident;
    let unique_ty = unique.ty;

    let to_attributes = fields.iter().map(|f| {
        let ident = f.ident;
        let name = &f.name;
        quote! {
            if let ::std::option::Option::Some(value) = single_table::ToValue::to_value(&self.#ident) {
                attributes.insert(#name.to_string(), value.into());
            }
        }
    });

    let from_attributes = fields.iter().map(|f| {
        let ident = f.ident;
        let name = &f.name;
        quote! {
            #ident: single_table::decode_field(#model_name, attributes, #name)?,
        }
    });

    let field_consts = fields.iter().map(|f| {
        let const_name = format_ident!("{}", f.name.to_uppercase());
        let name = &f.name;
        quote! {
            pub const #const_name: single_table::Field<#struct_name> = single_table::Field::new(#name);
        }
    });

    Ok(quote! {
        impl single_table::Model for #struct_name {
            fn schema() -> &'static single_table::ModelSchema {
                static SCHEMA: ::std::sync::LazyLock<single_table::ModelSchema> =
                    ::std::sync::LazyLock::new(|| {
                        match single_table::ModelSchema::new::<#struct_name>(
                            #model_name,
                            ::std::vec![#(#field_specs),*],
                        ) {
                            ::std::result::Result::Ok(schema) => schema,
                            ::std::result::Result::Err(e) => {
                                panic!("invalid model `{}`: {}", stringify!(#struct_name), e)
                            }
                        }
                    });
                &SCHEMA
            }

            fn to_attributes(&self) -> single_table::Attributes {
                let mut attributes = single_table::Attributes::new();
                #(#to_attributes)*
                attributes
            }

            fn from_attributes(
                attributes: &single_table::Attributes,
            ) -> ::std::result::Result<Self, single_table::Error> {
                ::std::result::Result::Ok(Self {
                    #(#from_attributes)*
                })
            }
        }

        impl #struct_name {
            #(#field_consts)*
        }

        impl ::std::convert::From<&#struct_name> for #unique_ty {
            fn from(model: &#struct_name) -> Self {
                ::std::clone::Clone::clone(&model.#unique_ident)
            }
        }

        impl ::std::convert::From<&#struct_name> for ::std::option::Option<#unique_ty> {
            fn from(model: &#struct_name) -> Self {
                ::std::option::Option::Some(::std::clone::Clone::clone(&model.#unique_ident))
            }
        }

        single_table::inventory::submit! {
            single_table::ModelMeta {
                schema: <#struct_name as single_table::Model>::schema,
            }
        }
    })
}
