//! End-to-end compilation tests
//!
//! Each test compiles a complete DBML document through the public API and
//! checks the resulting database model and diagnostics.

mod common;

use common::{compile_source, messages};
use dbml_parse::{CompileErrorCode, CompilerConfig};
use serde_json::json;

// ============================================================================
// Records
// ============================================================================

#[test]
fn test_duplicate_unique_email_is_single_error() {
    let result = compile_source(
        "Table users {\n  id int [pk]\n  email varchar [unique]\n}\nrecords users(id, email) {\n  1,\"a@x.com\"\n  2,\"a@x.com\"\n}\n",
    );
    assert_eq!(messages(&result.errors), vec!["Duplicate unique value for column 'email'"]);
    assert_eq!(result.errors[0].code, CompileErrorCode::DuplicateUniqueValue);
    let db = result.database.expect("interpretation ran");
    assert_eq!(db.records[0].values.len(), 2);
}

#[test]
fn test_many_nulls_never_collide() {
    let result = compile_source(
        "Table users {\n  id int [pk]\n  email varchar [unique]\n}\nrecords users(id, email) {\n  1, null\n  2, null\n  3, null\n}\n",
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn test_yes_coerces_to_bool() {
    let result = compile_source(
        "Table data {\n  id int\n  active boolean\n}\nrecords data(id, active) {\n  1, \"yes\"\n}\n",
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    let db = result.database.unwrap();
    let cell = serde_json::to_value(&db.records[0].values[0][1]).unwrap();
    assert_eq!(cell, json!({"type": "bool", "value": true}));
}

#[test]
fn test_enum_string_is_warning_enum_access_is_error() {
    let schema = "Enum status {\n  active\n  inactive\n}\nTable t {\n  status status\n}\n";

    let result = compile_source(&format!("{}records t(status) {{\n  'invalid_value'\n}}\n", schema));
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(messages(&result.warnings), vec!["Invalid enum value for column 'status'"]);

    let result = compile_source(&format!("{}records t(status) {{\n  status.invalid_value\n}}\n", schema));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, CompileErrorCode::BindingError);
    assert!(result.database.is_none());
}

#[test]
fn test_decimal_limits() {
    let result = compile_source(
        "Table t {\n  amount decimal(5,2)\n}\nrecords t(amount) {\n  999.99\n  123.4\n  1.234\n  123456\n}\n",
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.warnings.len(), 2, "{:?}", result.warnings);
    assert_eq!(result.warnings[0].start.line, 6);
    assert_eq!(result.warnings[1].start.line, 7);
}

#[test]
fn test_varchar_byte_length() {
    let result = compile_source(
        "Table t {\n  a varchar(20)\n  b varchar(10)\n}\nrecords t(a, b) {\n  '😀😀😀😀😀', '😀😀'\n  'x', '😀😀😀'\n}\n",
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.warnings.len(), 1, "{:?}", result.warnings);
    assert_eq!(result.warnings[0].start.line, 6);
}

#[test]
fn test_rows_with_leading_empty_fields() {
    let result = compile_source(
        "Table t {\n  a int\n  b int\n  c int\n}\nrecords t(a, b, c) {\n  , 2, 3\n  ,,\n  1,,3\n}\n",
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    let db = result.database.unwrap();
    let rows = serde_json::to_value(&db.records[0].values).unwrap();
    let values: Vec<Vec<serde_json::Value>> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row.as_array().unwrap().iter().map(|c| c["value"].clone()).collect())
        .collect();
    assert_eq!(
        values,
        vec![
            vec![json!(null), json!(2), json!(3)],
            vec![json!(null), json!(null), json!(null)],
            vec![json!(1), json!(null), json!(3)],
        ]
    );
}

#[test]
fn test_default_schema_enum_through_records() {
    let result = compile_source(
        "Enum status {\n  active\n  inactive\n}\nTable public.t {\n  s public.status\n}\nrecords public.t(s) {\n  'bogus'\n  public.status.active\n}\n",
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(messages(&result.warnings), vec!["Invalid enum value for column 's'"]);
    let db = result.database.unwrap();
    assert!(db.tables[0].fields[0].column_type.is_enum);
    assert_eq!(db.records[0].values.len(), 2);
}

#[test]
fn test_record_validation_follows_config() {
    let mut config = CompilerConfig::default();
    config.records.validate = false;
    let result = dbml_parse::compile_with(
        "Table t {\n  n int\n}\nrecords t(n) {\n  'abc'\n}\n",
        &config,
    );
    assert!(result.warnings.is_empty());
}

// ============================================================================
// Partials, refs and model shape
// ============================================================================

#[test]
fn test_partial_precedence() {
    let result = compile_source(
        "TablePartial p1 {\n  x int\n}\nTablePartial p2 {\n  x varchar\n}\nTable t {\n  ~p1\n  ~p2\n}\nTable d {\n  x bool\n  ~p2\n  ~p1\n}\n",
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let db = result.database.unwrap();
    let t = db.tables.iter().find(|t| t.name == "t").unwrap();
    assert_eq!(t.fields.len(), 1);
    assert_eq!(t.fields[0].column_type.type_name, "varchar");
    let d = db.tables.iter().find(|t| t.name == "d").unwrap();
    assert_eq!(d.fields.len(), 1);
    assert_eq!(d.fields[0].column_type.type_name, "bool");
}

#[test]
fn test_full_document() {
    let result = compile_source(
        r#"Project blog {
  database_type: 'PostgreSQL'
}

Enum post_status {
  draft
  published [note: 'visible']
}

Table users as U {
  id int [pk, increment]
  email varchar(255) [unique, not null]
}

Table blog.posts {
  id int [pk]
  author_id int [ref: > U.id]
  status post_status [default: 'draft']
  indexes {
    (author_id, status) [name: 'author_status']
  }
}

TableGroup content {
  blog.posts
}

Ref: blog.posts.id - users.id [delete: cascade]
"#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let db = result.database.unwrap();
    assert_eq!(db.tables.len(), 2);
    assert_eq!(db.refs.len(), 2);
    assert_eq!(db.enums[0].values.len(), 2);
    assert_eq!(db.table_groups[0].tables[0].schema_name.as_deref(), Some("blog"));
    assert_eq!(db.aliases[0].name, "U");
    assert_eq!(db.project.as_ref().and_then(|p| p.database_type.as_deref()), Some("PostgreSQL"));

    let posts = db.tables.iter().find(|t| t.name == "posts").unwrap();
    assert!(posts.fields[2].column_type.is_enum);
    assert_eq!(posts.indexes[0].name.as_deref(), Some("author_status"));

    let json = serde_json::to_value(&db).unwrap();
    assert_eq!(json["refs"][0]["onDelete"], json!("cascade"));
    assert_eq!(json["tables"][1]["schemaName"], json!("blog"));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_wire_error_shape() {
    let result = compile_source("Table t {\n  id int [ref: > ghost.id]\n}\n");
    let wire = serde_json::to_value(result.wire_errors()).unwrap();
    assert_eq!(
        wire,
        json!([{
            "code": 4000,
            "diagnostic": "Table 'ghost' does not exist",
            "location": {
                "start": {"line": 2, "column": 18},
                "end": {"line": 2, "column": 23}
            }
        }])
    );
}

#[test]
fn test_parse_errors_stop_the_pipeline() {
    let result = compile_source("Table t {\n  id int [ref: > ghost.id]\n");
    assert!(result.has_errors());
    assert!(result.database.is_none());
    assert!(result
        .errors
        .iter()
        .all(|e| e.code != CompileErrorCode::BindingError));
}

#[test]
fn test_lexer_never_aborts() {
    let result = compile_source("Table t {\n  id int $\n}\n");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, CompileErrorCode::UnknownSymbol);
    assert!(result.database.is_none());
    assert_eq!(result.tokens.len(), 7);
}
