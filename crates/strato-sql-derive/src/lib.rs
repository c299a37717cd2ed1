//! Derive macro binding entity structs to typed table schemas.
//!
//! This crate provides `#[derive(Model)]`, which generates the static table
//! schema, const `Field` accessors, and the runtime `Model` glue for an
//! entity struct.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, Lit,
    Meta, PathArguments, Type,
};

/// Derives the `Model` trait for an entity struct.
///
/// # Attributes
///
/// - `#[model(table = "table_name")]` - SQL table name (optional, defaults
///   to snake_case of the struct name)
///
/// # Field Attributes
///
/// - `#[field(primary_key)]` - marks the column as the primary key; at most
///   one per struct
/// - `#[field(column = "name")]` - SQL column name (defaults to the field
///   name)
/// - `#[field(sql_type = "bigint")]` - overrides the SQL type inferred from
///   the Rust type
/// - `#[field(not_null)]`, `#[field(auto_increment)]`, `#[field(unsigned)]`
/// - `#[field(created_timestamp)]`, `#[field(updated_timestamp)]` - filled
///   with the current time on insert (and update) when unset
/// - `#[field(max_length = 255)]`, `#[field(scale = 2)]`
/// - `#[field(default = "0")]`, `#[field(comment = "...")]`
///
/// # Generated Items
///
/// For a struct `User`, this macro generates:
///
/// - `UserTable` - a marker type implementing `strato_sql_core::Table`
/// - `impl User` - one `pub const fn column() -> Field` accessor per field
/// - `impl strato_orm::Model for User` - value extraction and row decoding
#[proc_macro_derive(Model, attributes(model, field))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_model_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let table_name = get_table_name(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model derive only supports structs",
            ));
        }
    };

    let mut columns: Vec<ColumnInfo> = Vec::new();
    for field in fields {
        let field_name = field.ident.as_ref().unwrap();
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.primary_key {
            if let Some(prev) = columns.iter().find(|c| c.primary_key) {
                return Err(syn::Error::new_spanned(
                    field,
                    format!(
                        "duplicate primary key: `{}` is already the primary key",
                        prev.field_name
                    ),
                ));
            }
        }
        let (inner_type, optional) = unwrap_option(&field.ty);
        let sql_type = match &attrs.sql_type {
            Some(name) => sql_type_from_name(name)
                .ok_or_else(|| syn::Error::new_spanned(field, format!("unknown sql_type `{name}`")))?,
            None => infer_sql_type(&inner_type).ok_or_else(|| {
                syn::Error::new_spanned(
                    field,
                    "cannot infer a SQL type for this field; add #[field(sql_type = \"...\")]",
                )
            })?,
        };

        columns.push(ColumnInfo {
            field_name: field_name.clone(),
            inner_type,
            optional,
            column_name: attrs.column.unwrap_or_else(|| field_name.to_string()),
            sql_type,
            primary_key: attrs.primary_key,
            not_null: attrs.not_null,
            auto_increment: attrs.auto_increment,
            unsigned: attrs.unsigned,
            created_timestamp: attrs.created_timestamp,
            updated_timestamp: attrs.updated_timestamp,
            max_length: attrs.max_length,
            scale: attrs.scale,
            default: attrs.default,
            comment: attrs.comment,
        });
    }

    let table_struct_name = format_ident!("{}Table", struct_name);

    let field_consts: Vec<TokenStream2> = columns
        .iter()
        .map(|c| field_const(c, &table_name))
        .collect();

    let accessors: Vec<TokenStream2> = columns
        .iter()
        .zip(field_consts.iter())
        .map(|(c, field_expr)| {
            let method_name = &c.field_name;
            let column_name = &c.column_name;
            let doc = format!("Column descriptor for `{column_name}`.");
            quote! {
                #[doc = #doc]
                #[inline]
                #[must_use]
                pub const fn #method_name() -> ::strato_sql_core::Field {
                    #field_expr
                }
            }
        })
        .collect();

    let all_column_names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
    let field_exprs: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let method_name = &c.field_name;
            quote! { #struct_name::#method_name() }
        })
        .collect();

    let primary_key_impl = match columns.iter().find(|c| c.primary_key) {
        Some(pk) => {
            let name = &pk.column_name;
            quote! { const PRIMARY_KEY: Option<&'static str> = Some(#name); }
        }
        None => quote! { const PRIMARY_KEY: Option<&'static str> = None; },
    };

    let value_entries: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let field_name = &c.field_name;
            let column_name = &c.column_name;
            if c.optional {
                quote! {
                    (#column_name, self.#field_name.clone()
                        .map(::strato_sql_core::ToSqlValue::to_sql_value))
                }
            } else {
                quote! {
                    (#column_name, Some(::strato_sql_core::ToSqlValue::to_sql_value(
                        self.#field_name.clone())))
                }
            }
        })
        .collect();

    let decode_entries: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let field_name = &c.field_name;
            let column_name = &c.column_name;
            let inner_type = &c.inner_type;
            if c.optional {
                quote! { #field_name: row.try_decode::<#inner_type>(#column_name)? }
            } else {
                quote! { #field_name: row.decode::<#inner_type>(#column_name)? }
            }
        })
        .collect();

    let primary_key_value = match columns.iter().find(|c| c.primary_key) {
        Some(pk) => {
            let field_name = &pk.field_name;
            if pk.optional {
                quote! {
                    self.#field_name.clone().map(::strato_sql_core::ToSqlValue::to_sql_value)
                }
            } else {
                quote! {
                    Some(::strato_sql_core::ToSqlValue::to_sql_value(self.#field_name.clone()))
                }
            }
        }
        None => quote! { None },
    };

    let table_doc = format!("Table metadata for [`{struct_name}`].");

    Ok(quote! {
        #[doc = #table_doc]
        #[derive(Debug, Clone, Copy)]
        pub struct #table_struct_name;

        impl ::strato_sql_core::Table for #table_struct_name {
            const NAME: &'static str = #table_name;
            const COLUMNS: &'static [&'static str] = &[#(#all_column_names),*];
            #primary_key_impl
            const FIELDS: &'static [::strato_sql_core::Field] = &[#(#field_exprs),*];
        }

        impl #struct_name {
            #(#accessors)*
        }

        impl ::strato_orm::Model for #struct_name {
            type Table = #table_struct_name;

            fn field_values(&self) -> Vec<(&'static str, Option<::strato_sql_core::SqlValue>)> {
                vec![#(#value_entries),*]
            }

            fn primary_key_value(&self) -> Option<::strato_sql_core::SqlValue> {
                #primary_key_value
            }

            fn from_row(row: &::strato_orm::Row) -> Result<Self, ::strato_orm::OrmError> {
                Ok(Self {
                    #(#decode_entries),*
                })
            }
        }
    })
}

struct ColumnInfo {
    field_name: Ident,
    inner_type: Type,
    optional: bool,
    column_name: String,
    sql_type: &'static str,
    primary_key: bool,
    not_null: bool,
    auto_increment: bool,
    unsigned: bool,
    created_timestamp: bool,
    updated_timestamp: bool,
    max_length: Option<u32>,
    scale: Option<u32>,
    default: Option<String>,
    comment: Option<String>,
}

fn field_const(c: &ColumnInfo, table_name: &str) -> TokenStream2 {
    let column_name = &c.column_name;
    let sql_type = format_ident!("{}", c.sql_type);
    let primary_key = c.primary_key;
    let not_null = c.not_null;
    let auto_increment = c.auto_increment;
    let unsigned = c.unsigned;
    let created_timestamp = c.created_timestamp;
    let updated_timestamp = c.updated_timestamp;
    let max_length = option_tokens(c.max_length.map(|n| quote! { #n }));
    let scale = option_tokens(c.scale.map(|n| quote! { #n }));
    let default = option_tokens(c.default.as_ref().map(|s| quote! { #s }));
    let comment = option_tokens(c.comment.as_ref().map(|s| quote! { #s }));

    quote! {
        ::strato_sql_core::Field {
            table: #table_name,
            name: #column_name,
            sql_type: ::strato_sql_core::SqlType::#sql_type,
            default: #default,
            primary_key: #primary_key,
            not_null: #not_null,
            auto_increment: #auto_increment,
            max_length: #max_length,
            scale: #scale,
            unsigned: #unsigned,
            created_timestamp: #created_timestamp,
            updated_timestamp: #updated_timestamp,
            comment: #comment,
        }
    }
}

fn option_tokens(value: Option<TokenStream2>) -> TokenStream2 {
    match value {
        Some(inner) => quote! { Some(#inner) },
        None => quote! { None },
    }
}

struct FieldAttrs {
    column: Option<String>,
    sql_type: Option<String>,
    primary_key: bool,
    not_null: bool,
    auto_increment: bool,
    unsigned: bool,
    created_timestamp: bool,
    updated_timestamp: bool,
    max_length: Option<u32>,
    scale: Option<u32>,
    default: Option<String>,
    comment: Option<String>,
}

fn get_table_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("model") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    table_name = Some(parse_str_value(&meta)?);
                    Ok(())
                } else {
                    Err(meta.error("unknown model attribute"))
                }
            })?;
            if let Some(name) = table_name {
                return Ok(name);
            }
        }
    }
    Ok(to_snake_case(&struct_name.to_string()))
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs {
        column: None,
        sql_type: None,
        primary_key: false,
        not_null: false,
        auto_increment: false,
        unsigned: false,
        created_timestamp: false,
        updated_timestamp: false,
        max_length: None,
        scale: None,
        default: None,
        comment: None,
    };

    for attr in attrs {
        if attr.path().is_ident("field") {
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    result.primary_key = true;
                } else if meta.path.is_ident("not_null") {
                    result.not_null = true;
                } else if meta.path.is_ident("auto_increment") {
                    result.auto_increment = true;
                } else if meta.path.is_ident("unsigned") {
                    result.unsigned = true;
                } else if meta.path.is_ident("created_timestamp") {
                    result.created_timestamp = true;
                } else if meta.path.is_ident("updated_timestamp") {
                    result.updated_timestamp = true;
                } else if meta.path.is_ident("column") {
                    result.column = Some(parse_str_value(&meta)?);
                } else if meta.path.is_ident("sql_type") {
                    result.sql_type = Some(parse_str_value(&meta)?);
                } else if meta.path.is_ident("default") {
                    result.default = Some(parse_str_value(&meta)?);
                } else if meta.path.is_ident("comment") {
                    result.comment = Some(parse_str_value(&meta)?);
                } else if meta.path.is_ident("max_length") {
                    result.max_length = Some(parse_int_value(&meta)?);
                } else if meta.path.is_ident("scale") {
                    result.scale = Some(parse_int_value(&meta)?);
                } else {
                    return Err(meta.error("unknown field attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(result)
}

fn parse_str_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<String> {
    let value: Expr = meta.value()?.parse()?;
    if let Expr::Lit(lit) = &value {
        if let Lit::Str(s) = &lit.lit {
            return Ok(s.value());
        }
    }
    Err(syn::Error::new_spanned(value, "expected a string literal"))
}

fn parse_int_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<u32> {
    let value: Expr = meta.value()?.parse()?;
    if let Expr::Lit(lit) = &value {
        if let Lit::Int(n) = &lit.lit {
            return n.base10_parse();
        }
    }
    Err(syn::Error::new_spanned(value, "expected an integer literal"))
}

/// Peels one `Option<...>` layer, reporting whether it was present.
fn unwrap_option(ty: &Type) -> (Type, bool) {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return (inner.clone(), true);
                    }
                }
            }
        }
    }
    (ty.clone(), false)
}

fn infer_sql_type(ty: &Type) -> Option<&'static str> {
    match ty {
        Type::Path(type_path) => {
            let segment = type_path.path.segments.last()?;
            let ident = segment.ident.to_string();
            match ident.as_str() {
                "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => Some("Int"),
                "i64" | "u64" => Some("BigInt"),
                "bool" => Some("Boolean"),
                "f32" | "f64" => Some("Float"),
                "String" => Some("Char"),
                "Decimal" => Some("Decimal"),
                "NaiveDate" => Some("Date"),
                "NaiveDateTime" => Some("DateTime"),
                "Value" => Some("Json"),
                "Vec" => {
                    // Only Vec<u8> maps to a column type.
                    if let PathArguments::AngleBracketed(args) = &segment.arguments {
                        if let Some(GenericArgument::Type(Type::Path(inner))) = args.args.first() {
                            if inner.path.is_ident("u8") {
                                return Some("Blob");
                            }
                        }
                    }
                    None
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn sql_type_from_name(name: &str) -> Option<&'static str> {
    match name {
        "char" | "varchar" => Some("Char"),
        "text" => Some("Text"),
        "boolean" | "bool" => Some("Boolean"),
        "int" | "integer" => Some("Int"),
        "bigint" => Some("BigInt"),
        "float" | "double" => Some("Float"),
        "decimal" | "numeric" => Some("Decimal"),
        "date" => Some("Date"),
        "datetime" => Some("DateTime"),
        "timestamp" => Some("Timestamp"),
        "json" => Some("Json"),
        "blob" | "bytea" => Some("Blob"),
        _ => None,
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
