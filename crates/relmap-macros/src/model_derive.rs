//! Implementation of the Model derive macro.
//!
//! Parses `#[relmap(...)]` attributes into a `ModelDef` and generates the
//! descriptor builder chain plus per-field accessors.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use relmap_core::field_to_column;
use syn::ext::IdentExt;
use syn::{
    Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitStr, PathArguments,
    Result, Type,
};

/// Parsed model definition.
#[derive(Debug)]
pub struct ModelDef {
    pub name: Ident,
    pub table: String,
    pub fields: Vec<ModelFieldDef>,
    pub generics: syn::Generics,
}

/// Parsed attributes of one field.
#[derive(Debug)]
pub struct ModelFieldDef {
    pub ident: Ident,
    /// Field name without a raw-identifier prefix.
    pub name: String,
    pub column: Option<String>,
    pub rename: Option<String>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub ignore: bool,
    pub association: Option<AssociationDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssocKind {
    HasOne,
    HasMany,
    BelongsTo,
}

impl AssocKind {
    fn attr_name(self) -> &'static str {
        match self {
            AssocKind::HasOne => "has_one",
            AssocKind::HasMany => "has_many",
            AssocKind::BelongsTo => "belongs_to",
        }
    }
}

/// An association field, with its type peeled down to the target.
#[derive(Debug)]
pub struct AssociationDef {
    pub kind: AssocKind,
    pub table: Option<String>,
    pub target: Type,
    /// Whether the target is stored as `Box<T>`.
    pub boxed: bool,
}

/// Parse a `DeriveInput` into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();

    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("relmap") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().trim().is_empty() {
                    return Err(Error::new_spanned(value, "table name must not be empty"));
                }
                table = Some(value.value());
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(Error::new_spanned(
                    &meta.path,
                    format!(
                        "unknown relmap struct attribute `{attr_name}`. \
                         Valid attributes are: table"
                    ),
                ))
            }
        })?;
    }

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    let primary_keys: Vec<&ModelFieldDef> = fields.iter().filter(|f| f.primary_key).collect();
    if let [_, second, ..] = primary_keys.as_slice() {
        return Err(Error::new_spanned(
            &second.ident,
            "a model can declare at most one primary key",
        ));
    }

    Ok(ModelDef {
        table: table.unwrap_or_else(|| field_to_column(&name.unraw().to_string())),
        name,
        fields,
        generics,
    })
}

fn parse_fields(fields: &Fields) -> Result<Vec<ModelFieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new_spanned(
            fields,
            "Model requires a struct with named fields",
        )),
        Fields::Unit => Ok(Vec::new()),
    }
}

fn parse_field(field: &Field) -> Result<ModelFieldDef> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut column = None;
    let mut rename = None;
    let mut primary_key = false;
    let mut auto_increment = false;
    let mut ignore = false;
    let mut association: Option<(AssocKind, Option<String>)> = None;

    for attr in &field.attrs {
        if !attr.path().is_ident("relmap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                primary_key = true;
            } else if path.is_ident("auto_increment") {
                auto_increment = true;
            } else if path.is_ident("ignore") {
                ignore = true;
            } else if path.is_ident("column") {
                let value: LitStr = meta.value()?.parse()?;
                column = Some(value.value());
            } else if path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if let Some(kind) = [AssocKind::HasOne, AssocKind::HasMany, AssocKind::BelongsTo]
                .into_iter()
                .find(|k| path.is_ident(k.attr_name()))
            {
                if association.is_some() {
                    return Err(Error::new_spanned(
                        path,
                        "a field can declare only one association",
                    ));
                }
                let table = if meta.input.peek(syn::Token![=]) {
                    let value: LitStr = meta.value()?.parse()?;
                    Some(value.value())
                } else {
                    None
                };
                association = Some((kind, table));
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!(
                        "unknown relmap attribute `{attr_name}`. \
                         Valid attributes are: primary_key, auto_increment, column, rename, \
                         ignore, has_one, has_many, belongs_to"
                    ),
                ));
            }

            Ok(())
        })?;
    }

    if auto_increment && !primary_key {
        return Err(Error::new_spanned(
            &ident,
            "auto_increment is only valid on the primary key",
        ));
    }

    let association = match association {
        Some((kind, table)) => {
            if primary_key || ignore {
                return Err(Error::new_spanned(
                    &ident,
                    "an association field cannot be a primary key or ignored",
                ));
            }
            Some(parse_association(kind, table, &field.ty)?)
        }
        None => None,
    };

    Ok(ModelFieldDef {
        name: ident.unraw().to_string(),
        ident,
        column,
        rename,
        primary_key,
        auto_increment,
        ignore,
        association,
    })
}

fn parse_association(kind: AssocKind, table: Option<String>, ty: &Type) -> Result<AssociationDef> {
    let (wrapper, message) = match kind {
        AssocKind::HasOne | AssocKind::BelongsTo => (
            "Option",
            format!("{} field must be Option<T> or Option<Box<T>>", kind.attr_name()),
        ),
        AssocKind::HasMany => (
            "Vec",
            "has_many field must be Vec<T> or Vec<Box<T>>".to_string(),
        ),
    };

    let inner = extract_wrapper_inner(ty, wrapper).ok_or_else(|| Error::new_spanned(ty, message))?;
    let (target, boxed) = match extract_wrapper_inner(inner, "Box") {
        Some(unboxed) => (unboxed.clone(), true),
        None => (inner.clone(), false),
    };

    Ok(AssociationDef {
        kind,
        table,
        target,
        boxed,
    })
}

/// Extract `T` from `Wrapper<T>` when the last path segment is `wrapper`.
fn extract_wrapper_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == wrapper {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}

/// Generate the `Model` and `ParamSource` implementations.
pub fn generate_model_impl(def: &ModelDef) -> TokenStream {
    let name = &def.name;
    let type_name = name.unraw().to_string();
    let table = &def.table;
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();

    let field_defs = def.fields.iter().map(generate_field_def);

    let scalar_fields: Vec<&ModelFieldDef> = def
        .fields
        .iter()
        .filter(|f| !f.ignore && f.association.is_none())
        .collect();

    let getters = scalar_fields.iter().map(|f| {
        let ident = &f.ident;
        let key = &f.name;
        quote! {
            #key => ::std::option::Option::Some(relmap_core::ToValue::to_value(&self.#ident)),
        }
    });

    let setters = scalar_fields.iter().map(|f| {
        let ident = &f.ident;
        let key = &f.name;
        quote! {
            #key => {
                self.#ident = relmap_core::FromValue::from_value(value)?;
                ::std::result::Result::Ok(())
            }
        }
    });

    let attachers = def.fields.iter().filter_map(|f| {
        let assoc = f.association.as_ref()?;
        let ident = &f.ident;
        let key = &f.name;
        let target = &assoc.target;
        let record = if assoc.boxed {
            quote! { record }
        } else {
            quote! { *record }
        };
        let store = match assoc.kind {
            AssocKind::HasMany => quote! { self.#ident.push(#record); },
            AssocKind::HasOne | AssocKind::BelongsTo => {
                quote! { self.#ident = ::std::option::Option::Some(#record); }
            }
        };
        Some(quote! {
            #key => {
                let record = related.downcast::<#target>()?;
                #store
                ::std::result::Result::Ok(())
            }
        })
    });

    quote! {
        impl #impl_generics relmap_core::Model for #name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table;

            fn describe() -> relmap_core::Result<relmap_core::ModelDescriptor> {
                relmap_core::ModelDescriptor::builder(#type_name)
                    .table(#table)
                    #(.field(#field_defs))*
                    .build()
            }

            fn field_value(&self, field: &str) -> ::std::option::Option<relmap_core::Value> {
                match field {
                    #(#getters)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_field_value(
                &mut self,
                field: &str,
                value: &relmap_core::Value,
            ) -> relmap_core::Result<()> {
                let _ = value;
                match field {
                    #(#setters)*
                    other => ::std::result::Result::Err(
                        relmap_core::Error::MissingField(::std::string::ToString::to_string(other)),
                    ),
                }
            }

            fn attach_related(
                &mut self,
                field: &str,
                related: relmap_core::Related,
            ) -> relmap_core::Result<()> {
                let _ = &related;
                match field {
                    #(#attachers)*
                    other => ::std::result::Result::Err(relmap_core::Error::configuration(
                        #type_name,
                        ::std::format!("'{other}' does not accept associated records"),
                    )),
                }
            }
        }

        impl #impl_generics relmap_core::ParamSource for #name #ty_generics #where_clause {
            fn param(&self, name: &str) -> ::std::option::Option<relmap_core::Value> {
                relmap_core::model_param(self, name)
            }
        }
    }
}

fn generate_field_def(field: &ModelFieldDef) -> TokenStream {
    let name = &field.name;
    let mut chain = quote! { relmap_core::FieldDef::new(#name) };

    if let Some(column) = &field.column {
        chain = quote! { #chain.column(#column) };
    }
    if let Some(alias) = &field.rename {
        chain = quote! { #chain.rename(#alias) };
    }
    if field.primary_key {
        chain = quote! { #chain.primary_key() };
    }
    if field.auto_increment {
        chain = quote! { #chain.auto_increment() };
    }
    if field.ignore {
        chain = quote! { #chain.ignore() };
    }
    if let Some(assoc) = &field.association {
        let target = &assoc.target;
        let (kind, shape) = match assoc.kind {
            AssocKind::HasOne => (quote! { HasOne }, quote! { Single }),
            AssocKind::HasMany => (quote! { HasMany }, quote! { Collection }),
            AssocKind::BelongsTo => (quote! { BelongsTo }, quote! { Single }),
        };
        let table = match &assoc.table {
            Some(table) => quote! { ::std::option::Option::Some(#table) },
            None => quote! { ::std::option::Option::None },
        };
        chain = quote! {
            #chain
                .shape(relmap_core::FieldShape::#shape)
                .association(
                    relmap_core::AssociationKind::#kind,
                    #table,
                    relmap_core::TargetModel::of::<#target>(),
                )
        };
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: TokenStream) -> Result<ModelDef> {
        let input: DeriveInput = syn::parse2(tokens)?;
        parse_model(&input)
    }

    #[test]
    fn test_parse_attributes() {
        let def = parse(quote! {
            #[relmap(table = "heroes")]
            struct Hero {
                #[relmap(primary_key, auto_increment)]
                id: i64,
                #[relmap(column = "hero_name")]
                name: String,
                #[relmap(belongs_to = "teams")]
                team: Option<Box<Team>>,
                #[relmap(ignore)]
                scratch: u8,
            }
        })
        .unwrap();

        assert_eq!(def.table, "heroes");
        assert!(def.fields[0].primary_key && def.fields[0].auto_increment);
        assert_eq!(def.fields[1].column.as_deref(), Some("hero_name"));
        let assoc = def.fields[2].association.as_ref().unwrap();
        assert_eq!(assoc.kind, AssocKind::BelongsTo);
        assert_eq!(assoc.table.as_deref(), Some("teams"));
        assert!(assoc.boxed);
        assert_eq!(assoc.target.to_token_stream().to_string(), "Team");
        assert!(def.fields[3].ignore);
    }

    #[test]
    fn test_default_table_is_snake_case() {
        let def = parse(quote! {
            struct UserProfile {
                id: i64,
            }
        })
        .unwrap();
        assert_eq!(def.table, "user_profile");

        let raw = parse(quote! {
            struct r#HTTPLog {
                id: i64,
            }
        })
        .unwrap();
        assert_eq!(raw.table, field_to_column("HTTPLog"));
        assert_eq!(raw.table, "h_t_t_p_log");
    }

    #[test]
    fn test_has_many_requires_vec() {
        let err = parse(quote! {
            struct Team {
                #[relmap(primary_key)]
                id: i64,
                #[relmap(has_many)]
                heroes: Option<Hero>,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("Vec<T>"));
    }

    #[test]
    fn test_rejects_second_primary_key() {
        let err = parse(quote! {
            struct Pair {
                #[relmap(primary_key)]
                a: i64,
                #[relmap(primary_key)]
                b: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("at most one primary key"));
    }

    #[test]
    fn test_unknown_attribute() {
        let err = parse(quote! {
            struct Thing {
                #[relmap(nullable)]
                a: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("unknown relmap attribute `nullable`"));
    }

    #[test]
    fn test_generated_impl_mentions_every_field() {
        let def = parse(quote! {
            struct Team {
                #[relmap(primary_key)]
                id: i64,
                #[relmap(has_many = "heroes")]
                heroes: Vec<Hero>,
            }
        })
        .unwrap();
        let generated = generate_model_impl(&def).to_string();
        assert!(generated.contains("TargetModel :: of :: < Hero >"));
        assert!(generated.contains("self . heroes . push (* record)"));
        assert!(generated.contains("ParamSource for Team"));
    }
}
