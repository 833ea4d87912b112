use rstest::rstest;

use dxflow::dialect::{commands, products, symbols, ColumnSpec, DialectRegistry};
use dxflow::template::SymbolTable;
use dxflow::FieldType;

fn table_symbols() -> SymbolTable {
    let mut table = SymbolTable::new();
    table.set(symbols::TABLE_NAME, "people");
    table.set(symbols::SCHEMA_NAME, "etl");
    table
}

#[test]
fn test_h2_create_table_maps_integer_columns() {
    let registry = DialectRegistry::standard().unwrap();
    let mut symbols = table_symbols();

    let sql = registry
        .render_create_table(products::H2, &[ColumnSpec::new("age", FieldType::S32)], &mut symbols)
        .unwrap();

    assert!(sql.contains("age INTEGER"));
}

#[test]
fn test_unregistered_product_yields_nothing() {
    let registry = DialectRegistry::standard().unwrap();
    let mut symbols = table_symbols();

    assert!(registry
        .render_create_table("Informix", &[ColumnSpec::new("age", FieldType::S32)], &mut symbols)
        .is_none());
    assert!(registry.render_command("Informix", commands::SELECT, None).is_none());
}

#[rstest]
#[case(products::H2)]
#[case(products::MYSQL)]
#[case(products::ORACLE)]
#[case(products::SQLITE)]
#[case(products::POSTGRESQL)]
fn test_upsert_renders_every_placeholder(#[case] product: &str) {
    let registry = DialectRegistry::standard().unwrap();
    let mut statement = table_symbols();
    statement.set(symbols::FIELD_NAMES, "job_name, attribute_key");
    statement.set(symbols::FIELD_VALUES, "'job', 'key'");
    statement.set(symbols::FIELD_MAP, "attribute_value = 'v'");
    statement.set(symbols::KEY_FIELDS, "job_name, attribute_key");
    statement.set(symbols::KEY_CONDITION, "job_name = 'job'");

    let sql = registry
        .require_command(product, commands::UPSERT, &statement)
        .unwrap();

    assert!(!sql.contains("[#$"), "{product}: {sql}");
    assert!(sql.contains("'job', 'key'"), "{product}: {sql}");
}
