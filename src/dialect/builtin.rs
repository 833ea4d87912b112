//! Shipped dialects: H2, MySQL, Oracle, SQLite and PostgreSQL

use super::{commands::*, products, Dialect, DEFAULT_TYPE};
use crate::errors::DialectError;

/// Every shipped dialect
pub fn dialects() -> Result<Vec<Dialect>, DialectError> {
    Ok(vec![h2()?, mysql()?, oracle()?, sqlite()?, postgresql()?])
}

pub fn h2() -> Result<Dialect, DialectError> {
    Dialect::new(
        products::H2,
        [
            ("STR", "VARCHAR(#)"),
            ("BOL", "BOOLEAN"),
            ("S8", "TINYINT"),
            ("U8", "TINYINT"),
            ("S16", "SMALLINT"),
            ("U16", "SMALLINT"),
            ("S32", "INTEGER"),
            ("U32", "INTEGER"),
            ("S64", "BIGINT"),
            ("U64", "BIGINT"),
            ("DBL", "DOUBLE"),
            ("DAT", "TIMESTAMP"),
            ("FLT", "REAL"),
            (DEFAULT_TYPE, "VARCHAR(#)"),
        ],
        [
            (CREATE, "CREATE TABLE [#$tableName#]( [#$fielddefinitions#] )"),
            (GRANT, ""),
            (INSERT, "INSERT INTO [#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] )"),
            (UPDATE, "UPDATE [#$tableName#] SET [#$fieldmap#] WHERE [#$keycondition#]"),
            (DELETE, "DELETE FROM [#$tableName#] WHERE [#$keycondition#]"),
            (TRUNCATE, "TRUNCATE TABLE [#$tableName#]"),
            (ALTER_COLUMN, "ALTER TABLE [#$tableName#] ALTER COLUMN [#$columnName#] [#$columnType#]"),
            (UPSERT, "MERGE INTO [#$tableName#] ( [#$fieldnames#] ) KEY ( [#$keyfields#] ) VALUES ( [#$fieldvalues#] )"),
            (SELECT, "SELECT * FROM [#$tableName#] WHERE [#$keycondition#]"),
            (COUNT, "SELECT COUNT(*) AS row_count FROM [#$tableName#]"),
            (INDEX, "CREATE UNIQUE INDEX [#$indexName#] ON [#$tableName#] ( [#$keyfields#] )"),
        ],
    )
}

pub fn mysql() -> Result<Dialect, DialectError> {
    Dialect::new(
        products::MYSQL,
        [
            ("STR", "VARCHAR(#)"),
            ("BOL", "TINYINT"),
            ("S8", "TINYINT"),
            ("U8", "TINYINT"),
            ("S16", "INTEGER"),
            ("U16", "INTEGER"),
            ("S32", "INTEGER"),
            ("U32", "INTEGER"),
            ("S64", "INTEGER"),
            ("U64", "INTEGER"),
            ("DBL", "DOUBLE"),
            ("FLT", "DOUBLE"),
            ("DAT", "DATETIME"),
            (DEFAULT_TYPE, "VARCHAR(#)"),
        ],
        [
            (CREATE, "CREATE TABLE [#$schemaName#].[#$tableName#] ( [#$fielddefinitions#] )"),
            (GRANT, ""),
            (INSERT, "INSERT INTO [#$schemaName#].[#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] )"),
            (UPDATE, "UPDATE [#$schemaName#].[#$tableName#] SET [#$fieldmap#] WHERE [#$keycondition#]"),
            (DELETE, "DELETE FROM [#$schemaName#].[#$tableName#] WHERE [#$keycondition#]"),
            (TRUNCATE, "TRUNCATE TABLE [#$schemaName#].[#$tableName#]"),
            (ALTER_COLUMN, "ALTER TABLE [#$schemaName#].[#$tableName#] MODIFY [#$columnName#] [#$columnType#]"),
            (UPSERT, "INSERT INTO [#$schemaName#].[#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] ) ON DUPLICATE KEY UPDATE [#$fieldmap#]"),
            (SELECT, "SELECT * FROM [#$schemaName#].[#$tableName#] WHERE [#$keycondition#]"),
            (COUNT, "SELECT COUNT(*) AS row_count FROM [#$schemaName#].[#$tableName#]"),
            (INDEX, "CREATE UNIQUE INDEX [#$indexName#] ON [#$schemaName#].[#$tableName#] ( [#$keyfields#] )"),
        ],
    )
}

pub fn oracle() -> Result<Dialect, DialectError> {
    Dialect::new(
        products::ORACLE,
        [
            ("STR", "VARCHAR2(#)"),
            ("BOL", "NUMBER(1)"),
            ("S8", "NUMBER(8)"),
            ("U8", "NUMBER(8)"),
            ("S16", "NUMBER(10)"),
            ("U16", "NUMBER(10)"),
            ("S32", "NUMBER"),
            ("U32", "NUMBER"),
            ("S64", "NUMBER"),
            ("U64", "NUMBER"),
            ("DBL", "NUMBER"),
            ("DAT", "TIMESTAMP"),
            ("FLT", "NUMBER"),
            (DEFAULT_TYPE, "VARCHAR2(#)"),
        ],
        [
            (CREATE, "CREATE TABLE [#$schemaName#].[#$tableName#] ( [#$fielddefinitions#] )"),
            (GRANT, "GRANT SELECT,REFERENCES ON [#$schemaName#].[#$tableName#] TO PUBLIC"),
            (INSERT, "INSERT INTO [#$schemaName#].[#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] )"),
            (UPDATE, "UPDATE [#$schemaName#].[#$tableName#] SET [#$fieldmap#] WHERE [#$keycondition#]"),
            (DELETE, "DELETE FROM [#$schemaName#].[#$tableName#] WHERE [#$keycondition#]"),
            (TRUNCATE, "TRUNCATE TABLE [#$schemaName#].[#$tableName#]"),
            (ALTER_COLUMN, "ALTER TABLE [#$schemaName#].[#$tableName#] MODIFY [#$columnName#] [#$columnType#]"),
            (UPSERT, "MERGE INTO [#$schemaName#].[#$tableName#] USING dual ON ( [#$keycondition#] ) WHEN MATCHED THEN UPDATE SET [#$fieldmap#] WHEN NOT MATCHED THEN INSERT ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] )"),
            (SELECT, "SELECT * FROM [#$schemaName#].[#$tableName#] WHERE [#$keycondition#]"),
            (COUNT, "SELECT COUNT(*) AS row_count FROM [#$schemaName#].[#$tableName#]"),
            (INDEX, "CREATE UNIQUE INDEX [#$indexName#] ON [#$schemaName#].[#$tableName#] ( [#$keyfields#] )"),
        ],
    )
}

pub fn sqlite() -> Result<Dialect, DialectError> {
    Dialect::new(
        products::SQLITE,
        [
            ("STR", "VARCHAR(#)"),
            ("BOL", "BOOLEAN"),
            ("S8", "INTEGER"),
            ("U8", "INTEGER"),
            ("S16", "INTEGER"),
            ("U16", "INTEGER"),
            ("S32", "INTEGER"),
            ("U32", "INTEGER"),
            ("S64", "INTEGER"),
            ("U64", "INTEGER"),
            ("DBL", "REAL"),
            ("FLT", "REAL"),
            ("DAT", "TIMESTAMP"),
            (DEFAULT_TYPE, "VARCHAR(#)"),
        ],
        [
            (CREATE, "CREATE TABLE [#$tableName#] ( [#$fielddefinitions#] )"),
            (GRANT, ""),
            (INSERT, "INSERT INTO [#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] )"),
            (UPDATE, "UPDATE [#$tableName#] SET [#$fieldmap#] WHERE [#$keycondition#]"),
            (DELETE, "DELETE FROM [#$tableName#] WHERE [#$keycondition#]"),
            (TRUNCATE, "DELETE FROM [#$tableName#]"),
            (ALTER_COLUMN, ""),
            (UPSERT, "INSERT INTO [#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] ) ON CONFLICT ( [#$keyfields#] ) DO UPDATE SET [#$fieldmap#]"),
            (SELECT, "SELECT * FROM [#$tableName#] WHERE [#$keycondition#]"),
            (COUNT, "SELECT COUNT(*) AS row_count FROM [#$tableName#]"),
            (INDEX, "CREATE UNIQUE INDEX [#$indexName#] ON [#$tableName#] ( [#$keyfields#] )"),
        ],
    )
}

pub fn postgresql() -> Result<Dialect, DialectError> {
    Dialect::new(
        products::POSTGRESQL,
        [
            ("STR", "VARCHAR(#)"),
            ("BOL", "BOOLEAN"),
            ("S8", "SMALLINT"),
            ("U8", "SMALLINT"),
            ("S16", "SMALLINT"),
            ("U16", "INTEGER"),
            ("S32", "INTEGER"),
            ("U32", "BIGINT"),
            ("S64", "BIGINT"),
            ("U64", "NUMERIC(20)"),
            ("DBL", "DOUBLE PRECISION"),
            ("FLT", "REAL"),
            ("DAT", "TIMESTAMP"),
            (DEFAULT_TYPE, "VARCHAR(#)"),
        ],
        [
            (CREATE, "CREATE TABLE [#$tableName#] ( [#$fielddefinitions#] )"),
            (GRANT, ""),
            (INSERT, "INSERT INTO [#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] )"),
            (UPDATE, "UPDATE [#$tableName#] SET [#$fieldmap#] WHERE [#$keycondition#]"),
            (DELETE, "DELETE FROM [#$tableName#] WHERE [#$keycondition#]"),
            (TRUNCATE, "TRUNCATE TABLE [#$tableName#]"),
            (ALTER_COLUMN, "ALTER TABLE [#$tableName#] ALTER COLUMN [#$columnName#] TYPE [#$columnType#]"),
            (UPSERT, "INSERT INTO [#$tableName#] ( [#$fieldnames#] ) VALUES ( [#$fieldvalues#] ) ON CONFLICT ( [#$keyfields#] ) DO UPDATE SET [#$fieldmap#]"),
            (SELECT, "SELECT * FROM [#$tableName#] WHERE [#$keycondition#]"),
            (COUNT, "SELECT COUNT(*) AS row_count FROM [#$tableName#]"),
            (INDEX, "CREATE UNIQUE INDEX [#$indexName#] ON [#$tableName#] ( [#$keyfields#] )"),
        ],
    )
}
