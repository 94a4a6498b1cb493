use super::*;
use crate::parser::parse;

fn validate(source: &str) -> (Vec<CompileError>, SymbolArena, SymbolId) {
    let parsed = parse(source);
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    let mut tree = parsed.value;
    let config = CompilerConfig::default();
    let mut symbols = SymbolArena::new();
    let program = symbols.create(SymbolKind::Schema, Some(tree.root));
    let mut validator = Validator::new(&mut tree, &mut symbols, &config, program);
    validator.validate_program();
    let errors = validator.errors;
    (errors, symbols, program)
}

fn codes(source: &str) -> Vec<CompileErrorCode> {
    validate(source).0.iter().map(|e| e.code).collect()
}

#[test]
fn test_valid_schema_has_no_errors() {
    let source = r#"
Project shop {
  database_type: 'PostgreSQL'
  Note: 'Sample'
}

Table users as U [headercolor: #3498db, note: 'people'] {
  id int [pk, increment]
  email varchar(255) [unique, not null, note: 'login']
  status status [default: status.active]
  tags varchar[]
  created_at timestamp [default: `now()`]
  indexes {
    (id, email) [unique, name: 'idx']
    email [type: hash]
    `lower(email)`
  }
  checks {
    `id > 0` [name: 'positive']
  }
  Note: 'Users table'
}

Enum status {
  active [note: 'on']
  inactive
}

Ref fk: users.id < posts.user_id [delete: cascade, update: set null]

Table posts {
  id int
  user_id int
}

TableGroup core [color: #aabbcc] {
  users
  posts
}

Note sticky [headercolor: #fff] {
  'hello'
}
"#;
    let (errors, _, _) = validate(source);
    assert!(errors.is_empty(), "{:?}", errors);
}

#[test]
fn test_registers_schema_symbols() {
    let (errors, symbols, program) = validate("Table auth.users {\n  id int\n}\n");
    assert!(errors.is_empty());
    let auth = symbols
        .lookup(program, &NodeSymbolIndex::new(SymbolKind::Schema, "auth"))
        .unwrap();
    let users = symbols
        .lookup(auth, &NodeSymbolIndex::new(SymbolKind::Table, "users"))
        .unwrap();
    assert!(symbols
        .lookup(users, &NodeSymbolIndex::new(SymbolKind::Column, "id"))
        .is_some());
}

#[test]
fn test_default_schema_prefix_maps_to_program() {
    let (errors, symbols, program) = validate("Table public.users {\n  id int\n}\n");
    assert!(errors.is_empty());
    assert!(symbols
        .lookup(program, &NodeSymbolIndex::new(SymbolKind::Table, "users"))
        .is_some());
}

#[test]
fn test_duplicates() {
    assert_eq!(
        codes("Table a {\n  id int\n}\nTable a {\n  id int\n}\n"),
        vec![CompileErrorCode::DuplicateTableName]
    );
    assert_eq!(
        codes("Table a {\n  id int\n  id varchar\n}\n"),
        vec![CompileErrorCode::DuplicateColumnName]
    );
    assert_eq!(
        codes("Enum e {\n  x\n  x\n}\n"),
        vec![CompileErrorCode::DuplicateEnumFieldName]
    );
    assert_eq!(
        codes("Table a {\n  id int\n}\nTable b as a {\n  id int\n}\n"),
        vec![CompileErrorCode::DuplicateTableName]
    );
    assert_eq!(
        codes("Project a {\n}\nProject b {\n}\n"),
        vec![CompileErrorCode::DuplicateProject]
    );
}

#[test]
fn test_duplicate_message_names_schema() {
    let (errors, _, _) = validate("Table a {\n  id int\n}\nTable a {\n  id int\n}\n");
    assert_eq!(
        errors[0].diagnostic,
        "Table name 'a' already exists in schema 'public'"
    );
}

#[test]
fn test_context_errors() {
    assert_eq!(
        codes("Table a {\n  id int\n  Table b {\n    id int\n  }\n}\n"),
        vec![CompileErrorCode::InvalidTableContext]
    );
    assert_eq!(
        codes("indexes {\n  id\n}\n"),
        vec![CompileErrorCode::InvalidIndexesContext]
    );
    assert_eq!(
        codes("Table a {\n  id int\n  Ref: a.id > b.id\n}\n"),
        vec![CompileErrorCode::InvalidRefContext]
    );
    assert_eq!(
        codes("Enum e {\n  x\n  Note: 'n'\n}\n"),
        vec![CompileErrorCode::InvalidEnumElement]
    );
    assert_eq!(
        codes("foo: 'bar'\n"),
        vec![CompileErrorCode::InvalidCustomContext]
    );
}

#[test]
fn test_header_messages_pick_article() {
    let message = |source: &str| validate(source).0[0].diagnostic.clone();
    assert_eq!(message("Enum e as x {\n  a\n}\n"), "An Enum shouldn't have an alias");
    assert_eq!(message("Table {\n  id int\n}\n"), "A Table must have a name");
    assert_eq!(
        message("Table a {\n  id int\n  indexes name {\n    id\n  }\n}\n"),
        "An Indexes shouldn't have a name"
    );
}

#[test]
fn test_header_rules() {
    assert_eq!(
        codes("Table {\n  id int\n}\n"),
        vec![CompileErrorCode::NameNotFound]
    );
    assert_eq!(
        codes("Enum e as x {\n  a\n}\n"),
        vec![CompileErrorCode::UnexpectedAlias]
    );
    assert_eq!(
        codes("Table a {\n  id int\n  indexes name {\n    id\n  }\n}\n"),
        vec![CompileErrorCode::UnexpectedName]
    );
    assert_eq!(
        codes("Table a: 'x'\n"),
        vec![CompileErrorCode::UnexpectedSimpleBody]
    );
    assert_eq!(
        codes("Enum e [note: 'x'] {\n  a\n}\n"),
        vec![CompileErrorCode::UnexpectedSettings]
    );
}

#[test]
fn test_setting_checks() {
    assert_eq!(
        codes("Table a {\n  id int [primary, pk]\n}\n"),
        vec![CompileErrorCode::UnknownSetting]
    );
    assert_eq!(
        codes("Table a {\n  id int [pk, primary key]\n}\n"),
        vec![CompileErrorCode::DuplicateSetting]
    );
    assert_eq!(
        codes("Table a {\n  id int [note: 1]\n}\n"),
        vec![CompileErrorCode::InvalidSettings]
    );
    assert_eq!(
        codes("Table a {\n  id int [null, not null]\n}\n"),
        vec![CompileErrorCode::ConflictingSetting]
    );
    assert_eq!(
        codes("Table a [headercolor: 'red'] {\n  id int\n}\n"),
        vec![CompileErrorCode::InvalidSettings]
    );
}

#[test]
fn test_repeatable_column_settings() {
    let source = "Table a {\n  id int [ref: > b.id, ref: > c.id, check: `id > 0`, check: `id < 9`]\n}\n";
    assert!(codes(source).is_empty());
}

#[test]
fn test_default_values() {
    for value in ["'x'", "1", "-2.5", "true", "null", "`now()`", "status.active"] {
        let source = format!("Table a {{\n  c int [default: {}]\n}}\n", value);
        assert!(codes(&source).is_empty(), "default {}", value);
    }
    assert_eq!(
        codes("Table a {\n  c int [default: status]\n}\n"),
        vec![CompileErrorCode::InvalidSettings]
    );
}

#[test]
fn test_column_shapes() {
    assert_eq!(
        codes("Table a {\n  id\n}\n"),
        vec![CompileErrorCode::InvalidColumn]
    );
    assert_eq!(
        codes("Table a {\n  'id' int\n}\n"),
        vec![CompileErrorCode::InvalidColumnName]
    );
    assert!(codes("Table a {\n  \"first name\" varchar(10)[3][2]\n  d decimal(10, 2)\n}\n").is_empty());
}

#[test]
fn test_empty_enum() {
    assert_eq!(codes("Enum e {\n}\n"), vec![CompileErrorCode::EmptyEnum]);
}

#[test]
fn test_ref_shapes() {
    assert_eq!(
        codes("Ref: a.(x, y) > b.(z)\n"),
        vec![CompileErrorCode::UnequalFieldsBinaryRef]
    );
    assert_eq!(
        codes("Ref: a > b.id\n"),
        vec![CompileErrorCode::InvalidRefField]
    );
    assert_eq!(
        codes("Ref: a.id * b.id\n"),
        vec![CompileErrorCode::InvalidRefField]
    );
    assert_eq!(
        codes("Ref {\n  a.id > b.id\n  b.id > c.id\n}\n"),
        vec![CompileErrorCode::InvalidRefField]
    );
    assert_eq!(
        codes("Ref: a.id > b.id [delete: explode]\n"),
        vec![CompileErrorCode::InvalidSettings]
    );
}

#[test]
fn test_note_rules() {
    assert_eq!(
        codes("Note {\n  'x'\n}\n"),
        vec![CompileErrorCode::NameNotFound]
    );
    assert_eq!(
        codes("Note n {\n  'x'\n}\nNote n {\n  'y'\n}\n"),
        vec![CompileErrorCode::DuplicateNoteName]
    );
    assert_eq!(
        codes("Table a {\n  id int\n  Note: 1\n}\n"),
        vec![CompileErrorCode::InvalidNoteContent]
    );
    assert_eq!(
        codes("Table a {\n  id int\n  Note n: 'x'\n}\n"),
        vec![CompileErrorCode::UnexpectedName]
    );
}

#[test]
fn test_records_names() {
    assert_eq!(
        codes("records users {\n  1\n}\n"),
        vec![CompileErrorCode::InvalidName]
    );
    assert_eq!(
        codes("records {\n  1\n}\n"),
        vec![CompileErrorCode::NameNotFound]
    );
    assert!(codes("records users(id, name) {\n  1, 'a'\n  2,\n}\n").is_empty());
    assert!(codes("Table t {\n  id int\n  records (id) {\n    1\n  }\n}\n").is_empty());
    assert_eq!(
        codes("Enum e {\n  a\n}\nTableGroup g {\n  records t(x) {\n    1\n  }\n}\n"),
        vec![CompileErrorCode::InvalidRecordsContext]
    );
}

#[test]
fn test_partials() {
    assert!(codes("TablePartial p {\n  id int\n}\nTable t {\n  ~p\n}\n").is_empty());
    assert_eq!(
        codes("Table t {\n  ~p\n  ~p\n}\n"),
        vec![CompileErrorCode::DuplicatePartialInjection]
    );
    assert_eq!(
        codes("TablePartial p {\n  ~q\n}\n"),
        vec![CompileErrorCode::InvalidColumn]
    );
}

#[test]
fn test_project_fields() {
    assert!(codes("Project p {\n  database_type: 'x'\n  Table t {\n    id int\n  }\n}\n").is_empty());
    assert_eq!(
        codes("Project p {\n  oops\n}\n"),
        vec![CompileErrorCode::InvalidProjectField]
    );
}

#[test]
fn test_table_group_fields() {
    assert_eq!(
        codes("TableGroup g {\n  a\n  a\n}\n"),
        vec![CompileErrorCode::DuplicateTableGroupFieldName]
    );
    assert_eq!(
        codes("TableGroup g {\n  'a'\n}\n"),
        vec![CompileErrorCode::InvalidTableGroupField]
    );
}
