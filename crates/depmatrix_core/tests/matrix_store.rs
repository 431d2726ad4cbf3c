use depmatrix_core::db::open_db_in_memory;
use depmatrix_core::{
    Attribute, CellKey, HistoryAction, HistoryEntry, HistoryRepository, Matrix, MatrixRecord,
    MatrixStore, NewMatrix, RepoError, SqliteHistoryRepository, SqliteMatrixRepository,
    SqliteUserRepository, User, UserRepository, UserRole,
};
use rusqlite::Connection;
use uuid::Uuid;

fn new_record(title: &str, keyword: &str) -> MatrixRecord {
    MatrixRecord::from_request(NewMatrix::new(title, "quarterly review", keyword), Uuid::new_v4())
        .unwrap()
}

fn insert_user(conn: &Connection, username: &str) -> User {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    let user = User::new(username, format!("{username}@example.com"), UserRole::User);
    repo.create_user(&user, "$argon2id$unused").unwrap();
    user
}

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let record = new_record("Supplier risks", "s3cret");
    let id = repo.create_matrix(&record).unwrap();

    let loaded = repo.get_matrix(id).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.data, Matrix::default_seed());
    assert!(loaded.shared_with.is_empty());
}

#[test]
fn get_unknown_matrix_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    assert!(repo.get_matrix(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn create_with_existing_id_returns_conflict() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();

    let err = repo.create_matrix(&record).unwrap_err();
    assert!(matches!(err, RepoError::Conflict { entity: "matrix", .. }));
}

#[test]
fn put_replaces_whole_document() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let mut record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();

    record.title = "Supplier risks 2026".to_string();
    record.keyword = "rotated".to_string();
    record.data.toggle_dependency(1, 3).unwrap();
    record.data.add_attribute("Compliance", "Legal", None).unwrap();
    repo.put_matrix(&record).unwrap();

    let loaded = repo.get_matrix(record.id).unwrap().unwrap();
    assert_eq!(loaded.title, "Supplier risks 2026");
    assert_eq!(loaded.keyword, "rotated");
    assert!(loaded.data.get_dependency(1, 3));
    assert_eq!(loaded.data.rows().len(), 4);
    assert_eq!(loaded.created_at, record.created_at);
}

#[test]
fn logged_put_writes_document_and_entry_together() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();
    let history = SqliteHistoryRepository::try_new(&conn).unwrap();
    let actor = User::new("sari", "sari@example.com", UserRole::User);

    let mut record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();
    let marked = record.data.toggle_dependency(1, 2).unwrap();
    let entry =
        HistoryEntry::cell_change(&actor, record.id, &record.data, CellKey::new(1, 2), marked);

    let history_id = repo.put_matrix_logged(&record, &entry).unwrap();

    let loaded = repo.get_matrix(record.id).unwrap().unwrap();
    assert!(loaded.data.get_dependency(1, 2));
    let stored = history.get_entry(history_id).unwrap().unwrap();
    assert_eq!(stored.entry.action, HistoryAction::Add);
    assert_eq!(stored.entry.matrix_id, Some(record.id));
}

#[test]
fn logged_put_on_unknown_matrix_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();
    let history = SqliteHistoryRepository::try_new(&conn).unwrap();
    let actor = User::new("root", "root@example.com", UserRole::Admin);

    let record = new_record("Never stored", "s3cret");
    let entry = HistoryEntry::admin_edit(&actor, record.id, &record.data, "save");

    let err = repo.put_matrix_logged(&record, &entry).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "matrix", .. }));
    assert!(history
        .list_entries(&Default::default())
        .unwrap()
        .is_empty());
}

#[test]
fn concurrent_puts_resolve_last_writer_wins() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();

    // Two editors load the same version and save independently.
    let mut first = repo.get_matrix(record.id).unwrap().unwrap();
    let mut second = repo.get_matrix(record.id).unwrap().unwrap();
    first.data.toggle_dependency(1, 2).unwrap();
    second.data.toggle_dependency(2, 3).unwrap();

    repo.put_matrix(&first).unwrap();
    repo.put_matrix(&second).unwrap();

    let loaded = repo.get_matrix(record.id).unwrap().unwrap();
    assert!(!loaded.data.get_dependency(1, 2));
    assert!(loaded.data.get_dependency(2, 3));
    assert_eq!(loaded.data, second.data);
}

#[test]
fn put_unknown_matrix_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let record = new_record("Never stored", "s3cret");
    let err = repo.put_matrix(&record).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "matrix", .. }));
}

#[test]
fn put_rejects_inconsistent_matrix() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let mut record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();

    record.data = serde_json::from_value(serde_json::json!({
        "rows": [{ "id": 1, "name": "A", "category": "X" }],
        "columns": [],
        "dependencies": {}
    }))
    .unwrap();

    let err = repo.put_matrix(&record).unwrap_err();
    assert!(matches!(err, RepoError::Matrix(_)));
}

#[test]
fn delete_removes_matrix_and_second_delete_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();

    repo.delete_matrix(record.id).unwrap();
    assert!(repo.get_matrix(record.id).unwrap().is_none());

    let err = repo.delete_matrix(record.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
}

#[test]
fn list_returns_matrices_oldest_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let first = new_record("First", "one");
    let mut second = new_record("Second", "two");
    second.created_at = first.created_at + chrono::Duration::seconds(5);
    repo.create_matrix(&second).unwrap();
    repo.create_matrix(&first).unwrap();

    let titles: Vec<String> = repo
        .list_matrices()
        .unwrap()
        .into_iter()
        .map(|record| record.title)
        .collect();
    assert_eq!(titles, vec!["First", "Second"]);
}

#[test]
fn verify_keyword_is_exact_match() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let record = new_record("Supplier risks", "S3cret");
    repo.create_matrix(&record).unwrap();

    assert!(repo.verify_keyword(record.id, "S3cret").unwrap());
    assert!(!repo.verify_keyword(record.id, "s3cret").unwrap());
    assert!(!repo.verify_keyword(record.id, "S3cret ").unwrap());

    let err = repo.verify_keyword(Uuid::new_v4(), "S3cret").unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
}

#[test]
fn access_grants_are_idempotent_and_populate_shared_with() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();
    let alice = insert_user(&conn, "alice");
    let bob = insert_user(&conn, "bob");

    let record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();

    assert!(!repo.has_access(record.id, alice.id).unwrap());
    repo.grant_access(record.id, alice.id).unwrap();
    repo.grant_access(record.id, alice.id).unwrap();

    assert!(repo.has_access(record.id, alice.id).unwrap());
    assert!(!repo.has_access(record.id, bob.id).unwrap());

    let loaded = repo.get_matrix(record.id).unwrap().unwrap();
    assert_eq!(loaded.shared_with, vec![alice.id]);
}

#[test]
fn shared_with_is_ignored_on_write() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();
    let alice = insert_user(&conn, "alice");

    let mut record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();

    record.shared_with = vec![alice.id];
    repo.put_matrix(&record).unwrap();

    assert!(!repo.has_access(record.id, alice.id).unwrap());
    assert!(repo.get_matrix(record.id).unwrap().unwrap().shared_with.is_empty());
}

#[test]
fn deleting_matrix_drops_its_access_grants() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();
    let alice = insert_user(&conn, "alice");

    let record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();
    repo.grant_access(record.id, alice.id).unwrap();
    repo.delete_matrix(record.id).unwrap();

    let grants: i64 = conn
        .query_row("SELECT COUNT(*) FROM matrix_access;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(grants, 0);
}

#[test]
fn persisted_document_uses_wire_shape() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let mut record = new_record("Supplier risks", "s3cret");
    record.data = Matrix::from_attributes([
        Attribute::new(1, "A", "X"),
        Attribute::new(2, "B", "X"),
    ])
    .unwrap();
    record.data.toggle_dependency(1, 2).unwrap();
    repo.create_matrix(&record).unwrap();

    let raw: String = conn
        .query_row(
            "SELECT data FROM matrices WHERE id = ?1;",
            [record.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["dependencies"], serde_json::json!({ "1_2": true }));
    assert_eq!(json["columns"][1], serde_json::json!({ "id": 2, "name": "2" }));
}

#[test]
fn corrupt_document_surfaces_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMatrixRepository::try_new(&conn).unwrap();

    let record = new_record("Supplier risks", "s3cret");
    repo.create_matrix(&record).unwrap();
    conn.execute(
        "UPDATE matrices SET data = '{\"rows\": 3}' WHERE id = ?1;",
        [record.id.to_string()],
    )
    .unwrap();

    let err = repo.get_matrix(record.id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
