use chrono::{Duration, Utc};
use depmatrix_core::db::open_db_in_memory;
use depmatrix_core::{
    CellKey, HistoryAction, HistoryEntry, HistoryListQuery, HistoryRepository, HistoryService,
    Matrix, ServiceError, SqliteHistoryRepository, User, UserRole,
};
use uuid::Uuid;

fn admin() -> User {
    User::new("root", "root@example.com", UserRole::Admin)
}

fn toggle_entry(actor: &User, matrix_id: Uuid, offset_secs: i64) -> HistoryEntry {
    let mut entry = HistoryEntry::cell_change(
        actor,
        matrix_id,
        &Matrix::default_seed(),
        CellKey::new(1, 2),
        true,
    );
    entry.timestamp = Utc::now() + Duration::seconds(offset_secs);
    entry
}

#[test]
fn append_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHistoryRepository::try_new(&conn).unwrap();
    let actor = admin();

    let entry = HistoryEntry::submission(&actor, Uuid::new_v4(), &Matrix::default_seed());
    let id = repo.append_entry(&entry).unwrap();

    let loaded = repo.get_entry(id).unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.entry, entry);
}

#[test]
fn list_is_newest_first_with_filter_and_paging() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHistoryRepository::try_new(&conn).unwrap();
    let actor = admin();
    let first_matrix = Uuid::new_v4();
    let second_matrix = Uuid::new_v4();

    let oldest = repo.append_entry(&toggle_entry(&actor, first_matrix, -30)).unwrap();
    let other = repo.append_entry(&toggle_entry(&actor, second_matrix, -20)).unwrap();
    let newest = repo.append_entry(&toggle_entry(&actor, first_matrix, -10)).unwrap();

    let ids = |query: HistoryListQuery| -> Vec<i64> {
        repo.list_entries(&query)
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect()
    };

    assert_eq!(ids(HistoryListQuery::default()), vec![newest, other, oldest]);
    assert_eq!(
        ids(HistoryListQuery {
            matrix_id: Some(first_matrix),
            ..HistoryListQuery::default()
        }),
        vec![newest, oldest]
    );
    assert_eq!(
        ids(HistoryListQuery {
            limit: Some(1),
            offset: 1,
            ..HistoryListQuery::default()
        }),
        vec![other]
    );
    assert_eq!(
        ids(HistoryListQuery {
            offset: 2,
            ..HistoryListQuery::default()
        }),
        vec![oldest]
    );
}

#[test]
fn service_is_admin_only() {
    let conn = open_db_in_memory().unwrap();
    let service = HistoryService::new(SqliteHistoryRepository::try_new(&conn).unwrap());
    let user = User::new("alice", "alice@example.com", UserRole::User);

    assert!(matches!(
        service.list(&user, &HistoryListQuery::default()),
        Err(ServiceError::Forbidden { .. })
    ));
    assert!(matches!(
        service.get(&user, 1),
        Err(ServiceError::Forbidden { .. })
    ));
    assert!(matches!(
        service.delete(&user, 1),
        Err(ServiceError::Forbidden { .. })
    ));
}

#[test]
fn service_get_and_delete() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHistoryRepository::try_new(&conn).unwrap();
    let actor = admin();
    let id = repo
        .append_entry(&toggle_entry(&actor, Uuid::new_v4(), 0))
        .unwrap();

    let service = HistoryService::new(repo);
    let record = service.get(&actor, id).unwrap();
    assert_eq!(record.entry.action, HistoryAction::Add);
    assert_eq!(
        record.entry.describe(),
        "Added dependency between Availability and 2"
    );

    service.delete(&actor, id).unwrap();
    assert!(matches!(
        service.get(&actor, id),
        Err(ServiceError::NotFound { entity: "history entry", .. })
    ));
    assert!(matches!(
        service.delete(&actor, id),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn records_serialize_flat_camel_case() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHistoryRepository::try_new(&conn).unwrap();
    let actor = admin();
    let id = repo
        .append_entry(&toggle_entry(&actor, Uuid::new_v4(), 0))
        .unwrap();

    let record = repo.get_entry(id).unwrap().unwrap();
    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["id"], serde_json::json!(id));
    assert_eq!(json["action"], "add");
    assert_eq!(json["userRole"], "admin");
    assert_eq!(json["cellKey"], "1_2");
    assert_eq!(json["rowName"], "Availability");
    assert!(json.get("matrixSnapshot").is_none());
}
