use mortar_datastore::ErrorKind;
use mortar_datastore::exec::{Executor, SqlxExecutor};
use mortar_datastore::migrate::MigrationEngine;
use mortar_snapshot::schema::{FieldDef, FieldType, ModelDef};
use sqlx::Row;
use tempdir::TempDir;

async fn memory_db() -> SqlxExecutor {
    SqlxExecutor::connect("sqlite::memory:", 1).await.unwrap()
}

async fn tables(executor: &SqlxExecutor) -> Vec<String> {
    sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(executor.pool())
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>(0))
        .collect()
}

async fn columns(executor: &SqlxExecutor, table: &str) -> Vec<String> {
    sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(executor.pool())
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

fn blog() -> Vec<ModelDef> {
    vec![
        ModelDef::new("author")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("name", FieldType::plain("TEXT"))),
        ModelDef::new("tag")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("label", FieldType::plain("TEXT"))),
        ModelDef::new("post")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("title", FieldType::plain("VARCHAR(80)")).with_default("untitled"))
            .field(FieldDef::new("author", FieldType::foreign_key("author")))
            .field(FieldDef::new("tags", FieldType::many_to_many("tag"))),
    ]
}

#[tokio::test]
async fn test_create_tables() {
    let app = TempDir::new("mortar").unwrap();
    let engine = MigrationEngine::new(app.path()).unwrap();
    let mut db = memory_db().await;

    let path = engine.migrate(&blog(), &mut db).await.unwrap();
    assert_eq!(path, Some(engine.file_manager().dir().join("1.json")));
    assert_eq!(tables(&db).await, ["author", "post", "post_tag", "tag"]);
    assert_eq!(columns(&db, "post").await, ["id", "title", "author"]);
    assert_eq!(columns(&db, "post_tag").await, ["post_id", "tag_id"]);

    assert_eq!(engine.migrate(&blog(), &mut db).await.unwrap(), None);
    assert_eq!(engine.file_manager().files().unwrap().len(), 1);
    assert_eq!(engine.baseline().unwrap().models.len(), 3);
}

#[tokio::test]
async fn test_rebuild_keeps_rows() {
    let app = TempDir::new("mortar").unwrap();
    let engine = MigrationEngine::new(app.path()).unwrap();
    let mut db = memory_db().await;

    let v1 = vec![
        ModelDef::new("person")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("name", FieldType::plain("TEXT")).nullable())
            .field(FieldDef::new("email", FieldType::plain("TEXT")).nullable()),
    ];
    engine.migrate(&v1, &mut db).await.unwrap();
    sqlx::query("INSERT INTO person (id, name, email) VALUES (1, 'ada', 'ada@example.com')")
        .execute(db.pool())
        .await
        .unwrap();

    let v2 = vec![
        ModelDef::new("person")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("email", FieldType::plain("TEXT")).nullable())
            .field(FieldDef::new("age", FieldType::plain("INTEGER")).with_default(0)),
    ];
    let path = engine.migrate(&v2, &mut db).await.unwrap();
    assert_eq!(path, Some(engine.file_manager().dir().join("2.json")));
    assert_eq!(tables(&db).await, ["person"]);
    assert_eq!(columns(&db, "person").await, ["id", "email", "age"]);

    let row = sqlx::query("SELECT id, email, age FROM person")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>(0), 1);
    assert_eq!(row.get::<String, _>(1), "ada@example.com");
    assert_eq!(row.get::<i64, _>(2), 0);
}

#[tokio::test]
async fn test_rebuild_referenced_tables_keeps_rows() {
    let app = TempDir::new("mortar").unwrap();
    let engine = MigrationEngine::new(app.path()).unwrap();
    let mut db = memory_db().await;

    let v1 = vec![
        ModelDef::new("author")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("name", FieldType::plain("TEXT")))
            .field(FieldDef::new("bio", FieldType::plain("TEXT")).nullable()),
        ModelDef::new("tag")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("label", FieldType::plain("TEXT"))),
        ModelDef::new("post")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("title", FieldType::plain("TEXT")).nullable())
            .field(FieldDef::new("author", FieldType::foreign_key("author")))
            .field(FieldDef::new("tags", FieldType::many_to_many("tag"))),
    ];
    engine.migrate(&v1, &mut db).await.unwrap();
    for insert in [
        "INSERT INTO author (id, name, bio) VALUES (1, 'ada', 'mathematician')",
        "INSERT INTO tag (id, label) VALUES (1, 'math')",
        "INSERT INTO post (id, title, author) VALUES (1, 'notes', 1)",
        "INSERT INTO post_tag (post_id, tag_id) VALUES (1, 1)",
    ] {
        sqlx::query(insert).execute(db.pool()).await.unwrap();
    }

    // `author` is referenced by `post`, and `post` by `post_tag`; both get rebuilt.
    let v2 = vec![
        ModelDef::new("author")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("name", FieldType::plain("TEXT"))),
        ModelDef::new("tag")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("label", FieldType::plain("TEXT"))),
        ModelDef::new("post")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("author", FieldType::foreign_key("author")))
            .field(FieldDef::new("tags", FieldType::many_to_many("tag")))
            .field(FieldDef::new("editors", FieldType::many_to_many("author"))),
    ];
    let path = engine.migrate(&v2, &mut db).await.unwrap();
    assert_eq!(path, Some(engine.file_manager().dir().join("2.json")));
    assert_eq!(tables(&db).await, ["author", "post", "post_author", "post_tag", "tag"]);
    assert_eq!(columns(&db, "author").await, ["id", "name"]);
    assert_eq!(columns(&db, "post").await, ["id", "author"]);

    let author = sqlx::query("SELECT id, name FROM author").fetch_one(db.pool()).await.unwrap();
    assert_eq!(author.get::<i64, _>(0), 1);
    assert_eq!(author.get::<String, _>(1), "ada");
    let post = sqlx::query("SELECT id, author FROM post").fetch_one(db.pool()).await.unwrap();
    assert_eq!(post.get::<i64, _>(0), 1);
    assert_eq!(post.get::<i64, _>(1), 1);
    let link = sqlx::query("SELECT post_id, tag_id FROM post_tag").fetch_one(db.pool()).await.unwrap();
    assert_eq!(link.get::<i64, _>(0), 1);
    assert_eq!(link.get::<i64, _>(1), 1);

    let references = sqlx::query("PRAGMA foreign_key_list(post)")
        .fetch_all(db.pool())
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("table"))
        .collect::<Vec<_>>();
    assert_eq!(references, ["author"]);
    assert!(sqlx::query("PRAGMA foreign_key_check").fetch_all(db.pool()).await.unwrap().is_empty());
    assert_eq!(engine.baseline().unwrap(), mortar_snapshot::state::State::from_provider(&v2));
}

#[tokio::test]
async fn test_failed_migration_is_rolled_back() {
    let app = TempDir::new("mortar").unwrap();
    let engine = MigrationEngine::new(app.path()).unwrap();
    let mut db = memory_db().await;
    sqlx::query("CREATE TABLE person (id INTEGER)")
        .execute(db.pool())
        .await
        .unwrap();

    let models = vec![
        ModelDef::new("audit").field(FieldDef::new("id", FieldType::PrimaryKey)),
        ModelDef::new("person").field(FieldDef::new("id", FieldType::PrimaryKey)),
    ];
    let err = engine.migrate(&models, &mut db).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
    assert_eq!(tables(&db).await, ["person"]);
    assert!(engine.file_manager().files().unwrap().is_empty());
}

#[tokio::test]
async fn test_last_insert_id() {
    let mut db = memory_db().await;
    db.execute_script("CREATE TABLE note (id INTEGER PRIMARY KEY, body TEXT);").await.unwrap();
    db.execute_script("INSERT INTO note (body) VALUES ('a');").await.unwrap();
    db.execute_script("INSERT INTO note (body) VALUES ('b');").await.unwrap();
    assert_eq!(db.last_insert_id(), 2);
    db.commit().await.unwrap();
    assert_eq!(tables(&db).await, ["note"]);
}
