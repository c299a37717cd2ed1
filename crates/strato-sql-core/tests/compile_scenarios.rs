//! Cross-module compilation scenarios through the public API.

use strato_sql_core::dialect::{numbered_placeholders, translate};
use strato_sql_core::{Field, MySqlDialect, PostgresDialect, SqlType, SqlValue};

const ID: Field = Field::new("users", "id", SqlType::BigInt);
const NAME: Field = Field::new("users", "name", SqlType::Char);
const BALANCE: Field = Field::new("users", "balance", SqlType::Decimal);
const CREATED: Field = Field::new("users", "created_at", SqlType::DateTime);
const PROFILE: Field = Field::new("users", "profile", SqlType::Json);

#[test]
fn predicate_params_stay_out_of_the_text() {
    let hostile = "'; DROP TABLE users; --";
    let (sql, params) = NAME.eq(hostile).compile(&MySqlDialect);
    assert_eq!(sql, "(`users`.name = ?)");
    assert_eq!(params, vec![SqlValue::Text(String::from(hostile))]);
}

#[test]
fn compound_filter_compiles_identically_structurally_on_both_dialects() {
    let build = || {
        ID.gt(10)
            .and(BALANCE.ge(0).or(NAME.is_null()))
            .and(CREATED.lasted_days(7).into())
    };
    let (mysql, mysql_params) = build().compile(&MySqlDialect);
    let (pg, pg_params) = build().compile(&PostgresDialect);
    assert_eq!(
        mysql,
        "(((`users`.id > ?) AND ((`users`.balance >= ?) OR (`users`.name IS NULL))) \
         AND (`users`.created_at >= NOW() - INTERVAL 7 DAY))"
    );
    assert_eq!(
        pg,
        "(((\"users\".id > ?) AND ((\"users\".balance >= ?) OR (\"users\".name IS NULL))) \
         AND (\"users\".created_at >= CURRENT_TIMESTAMP - INTERVAL '7 day'))"
    );
    // Same parameters in the same order regardless of dialect.
    assert_eq!(mysql_params, pg_params);
}

#[test]
fn json_and_aggregate_projection() {
    let expr = PROFILE.json_contains_object("plan", "pro");
    let (sql, params) = expr
        .and(ID.count().ge(1))
        .compile(&MySqlDialect);
    assert_eq!(
        sql,
        "(JSON_CONTAINS(`users`.profile, JSON_OBJECT('plan', ?)) AND (COUNT(`users`.id) >= ?))"
    );
    assert_eq!(
        params,
        vec![SqlValue::Text(String::from("pro")), SqlValue::Int(1)]
    );
}

#[test]
fn raw_sql_translation_then_numbering() {
    let raw = "SELECT * FROM `users` WHERE created_at >= NOW() - INTERVAL 1 DAY AND name = ?";
    let translated = translate(raw);
    assert_eq!(
        translated,
        "SELECT * FROM \"users\" WHERE created_at >= CURRENT_TIMESTAMP - INTERVAL '1 day' AND name = ?"
    );
    let numbered = numbered_placeholders(&translated);
    assert_eq!(
        numbered,
        "SELECT * FROM \"users\" WHERE created_at >= CURRENT_TIMESTAMP - INTERVAL '1 day' AND name = $1"
    );
    // The quoted interval literal must not consume a placeholder number.
    assert!(!numbered.contains("$2"));
}
