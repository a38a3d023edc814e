use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{Duration, Utc};
use libsql::{Builder, params};
use serde_json::{Map, json};
use types::{
    Embedder, Emotion, FaqEntry, FaqIndex, FeedbackType, NewFeedback, NewTurn, SessionRecord,
    SessionStatus, SessionStore, StoreConfig, StoreError, Urgency,
};

use crate::{
    EmbeddingAdapter, LibsqlStore,
    schema::{
        MIGRATIONS, REQUIRED_INDEXES, REQUIRED_TABLES, applied_migration_versions,
        enable_foreign_keys, ensure_migration_bookkeeping, run_pending_migrations, schema_exists,
    },
};

#[tokio::test]
async fn remote_store_without_auth_token_fails_to_initialize() {
    let config = StoreConfig {
        db_path: ".helpdesk/helpdesk.db".to_owned(),
        remote_url: Some("libsql://helpdesk-org.turso.io".to_owned()),
        auth_token: None,
    };
    let error = match LibsqlStore::from_config(&config).await {
        Ok(_) => panic!("remote mode without auth token should fail"),
        Err(error) => error,
    };
    assert!(matches!(error, StoreError::Initialization { .. }));
}

#[tokio::test]
async fn local_store_initializes_with_missing_parent_directory() {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should move forward")
        .as_nanos();
    let mut root = env::temp_dir();
    root.push(format!(
        "helpdesk-store-local-default-{}-{unique}",
        std::process::id()
    ));
    let db_path = root.join("nested").join("helpdesk.db");
    let config = StoreConfig {
        db_path: db_path.to_string_lossy().to_string(),
        ..StoreConfig::default()
    };

    let store = LibsqlStore::from_config(&config)
        .await
        .expect("local store should initialize");
    store
        .create_session(&SessionRecord::new("session-local", Utc::now()))
        .await
        .expect("create should succeed for local mode");

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn initialization_applies_pending_migrations_and_verifies_schema() {
    let db_path = temp_db_path("migrations");

    let db = Builder::new_local(db_path.clone())
        .build()
        .await
        .expect("seed db should initialize");
    let conn = db.connect().expect("seed db should connect");
    enable_foreign_keys(&conn)
        .await
        .expect("seed db should enable fk support");
    ensure_migration_bookkeeping(&conn)
        .await
        .expect("seed db should create migration bookkeeping");
    conn.execute(MIGRATIONS[0].sql, params![])
        .await
        .expect("seed migration should apply");
    conn.execute(
        "INSERT INTO store_migrations (version) VALUES (?1)",
        params![MIGRATIONS[0].version],
    )
    .await
    .expect("seed migration should be marked");
    drop(conn);
    drop(db);

    let store = LibsqlStore::new_local(db_path.clone())
        .await
        .expect("runtime migration pass should succeed");
    let conn = store
        .connect()
        .expect("store should connect for verification");
    let versions = applied_migration_versions(&conn)
        .await
        .expect("applied versions should be queryable");
    for migration in MIGRATIONS {
        assert!(
            versions.contains(migration.version),
            "missing migration {}",
            migration.version
        );
    }
    for table in REQUIRED_TABLES {
        assert!(
            schema_exists(&conn, "table", table)
                .await
                .expect("schema check should work"),
            "missing table `{table}`"
        );
    }
    for index in REQUIRED_INDEXES {
        assert!(
            schema_exists(&conn, "index", index)
                .await
                .expect("schema check should work"),
            "missing index `{index}`"
        );
    }

    drop(conn);
    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn reopening_store_does_not_reapply_migrations() {
    let db_path = temp_db_path("reopen");
    let store = LibsqlStore::new_local(db_path.clone())
        .await
        .expect("first open");
    store
        .create_session(&SessionRecord::new("persisted", Utc::now()))
        .await
        .expect("create");
    drop(store);

    let reopened = LibsqlStore::new_local(db_path.clone())
        .await
        .expect("second open");
    let conn = reopened.connect().expect("connect");
    assert_eq!(
        run_pending_migrations(&conn)
            .await
            .expect("migration pass should be a no-op"),
        0
    );
    assert!(
        reopened
            .get_session("persisted")
            .await
            .expect("get")
            .is_some()
    );

    drop(conn);
    drop(reopened);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn local_mode_surfaces_unreachable_database_path_errors() {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should move forward")
        .as_nanos();
    let mut blocker = env::temp_dir();
    blocker.push(format!(
        "helpdesk-store-unreachable-{}-{unique}",
        std::process::id()
    ));
    fs::write(&blocker, "blocker file").expect("blocker file should be writable");

    let db_path = blocker.join("helpdesk.db").to_string_lossy().to_string();
    let error = match LibsqlStore::new_local(db_path).await {
        Ok(_) => panic!("path with file parent should fail"),
        Err(error) => error,
    };
    assert!(matches!(error, StoreError::Initialization { .. }));

    let _ = fs::remove_file(blocker);
}

#[tokio::test]
async fn migration_failures_are_surfaced_without_silent_success() {
    let db_path = temp_db_path("migration-failure");
    let db = Builder::new_local(db_path.clone())
        .build()
        .await
        .expect("seed db should initialize");
    let conn = db.connect().expect("seed db should connect");
    ensure_migration_bookkeeping(&conn)
        .await
        .expect("seed db should create migration bookkeeping");
    conn.execute("BEGIN IMMEDIATE TRANSACTION", params![])
        .await
        .expect("test transaction should start");

    let error = run_pending_migrations(&conn)
        .await
        .expect_err("nested migration transaction should fail");
    assert!(matches!(error, StoreError::Migration { .. }));

    conn.execute("ROLLBACK TRANSACTION", params![])
        .await
        .expect("test transaction should roll back");
    drop(conn);
    drop(db);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn session_round_trip_preserves_status_context_and_timestamps() {
    let (store, db_path) = open_temp_store("session-roundtrip").await;
    let now = Utc::now();
    let mut record = SessionRecord::new("ses-1", now);
    record.context.insert("channel".to_owned(), json!("web"));
    store.create_session(&record).await.expect("create");

    let loaded = store
        .get_session("ses-1")
        .await
        .expect("get")
        .expect("session should exist");
    assert_eq!(loaded.status, SessionStatus::Active);
    assert_eq!(loaded.context["channel"], "web");
    assert_eq!(
        loaded.created_at.timestamp_micros(),
        now.timestamp_micros()
    );
    assert!(store.get_session("missing").await.expect("get").is_none());

    let duplicate = store.create_session(&record).await;
    assert!(matches!(duplicate, Err(StoreError::Query { .. })));

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn turn_numbers_increase_and_recent_turns_are_chronological() {
    let (store, db_path) = open_temp_store("turns").await;
    let start = Utc::now();
    store
        .create_session(&SessionRecord::new("ses-turns", start))
        .await
        .expect("create");

    for index in 0..5_u32 {
        let at = start + Duration::seconds(i64::from(index) + 1);
        let turn = store
            .append_turn("ses-turns", &sample_turn(&format!("message {index}")), at)
            .await
            .expect("append")
            .expect("session should accept turns");
        assert_eq!(turn.turn_number, index + 1);
    }

    let recent = store.recent_turns("ses-turns", 3).await.expect("recent");
    let numbers: Vec<u32> = recent.iter().map(|turn| turn.turn_number).collect();
    assert_eq!(numbers, vec![3, 4, 5]);
    assert_eq!(recent[2].user_input, "message 4");
    assert_eq!(recent[0].emotion, Emotion::Neutral);
    assert_eq!(recent[0].slots["category"], "hours");

    let session = store
        .get_session("ses-turns")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(session.last_activity_at, recent[2].created_at);

    assert!(store.turn_exists("ses-turns", 5).await.expect("exists"));
    assert!(!store.turn_exists("ses-turns", 6).await.expect("exists"));

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn append_turn_rejects_missing_and_closed_sessions() {
    let (store, db_path) = open_temp_store("turns-closed").await;
    let now = Utc::now();
    assert!(
        store
            .append_turn("nope", &sample_turn("hi"), now)
            .await
            .expect("append")
            .is_none()
    );

    store
        .create_session(&SessionRecord::new("ses-closed", now))
        .await
        .expect("create");
    let mut context = Map::new();
    context.insert("end_reason".to_owned(), json!("user_ended"));
    assert!(store.close_session("ses-closed", &context).await.expect("close"));
    assert!(!store.close_session("ses-closed", &context).await.expect("close"));
    assert!(
        store
            .append_turn("ses-closed", &sample_turn("hi"), now)
            .await
            .expect("append")
            .is_none()
    );

    let closed = store
        .get_session("ses-closed")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(closed.status, SessionStatus::Closed);
    assert_eq!(closed.context["end_reason"], "user_ended");

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn context_updates_merge_into_existing_keys() {
    let (store, db_path) = open_temp_store("context").await;
    let mut record = SessionRecord::new("ses-ctx", Utc::now());
    record.context.insert("channel".to_owned(), json!("web"));
    store.create_session(&record).await.expect("create");

    let mut patch = Map::new();
    patch.insert("transfer_requested".to_owned(), json!(true));
    assert!(store.update_context("ses-ctx", &patch).await.expect("update"));
    assert!(!store.update_context("missing", &patch).await.expect("update"));

    let loaded = store
        .get_session("ses-ctx")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded.context["channel"], "web");
    assert_eq!(loaded.context["transfer_requested"], true);
    assert_eq!(loaded.status, SessionStatus::Active);

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn idle_sessions_are_expired_by_cutoff() {
    let (store, db_path) = open_temp_store("expiry").await;
    let now = Utc::now();
    store
        .create_session(&SessionRecord::new("stale", now - Duration::minutes(45)))
        .await
        .expect("create stale");
    store
        .create_session(&SessionRecord::new("fresh", now))
        .await
        .expect("create fresh");

    let expired = store
        .expire_idle_sessions(now - Duration::minutes(30))
        .await
        .expect("sweep");
    assert_eq!(expired, 1);
    assert!(!store.touch_session("stale", now).await.expect("touch"));
    assert!(store.touch_session("fresh", now).await.expect("touch"));
    assert!(!store.mark_expired("stale").await.expect("mark"));

    let counts = store.session_counts().await.expect("counts");
    assert_eq!(counts.active, 1);
    assert_eq!(counts.expired, 1);
    assert_eq!(counts.closed, 0);
    assert_eq!(counts.total_sessions(), 2);

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn turn_summary_reports_distinct_intents_and_average_confidence() {
    let (store, db_path) = open_temp_store("summary").await;
    let now = Utc::now();
    store
        .create_session(&SessionRecord::new("ses-sum", now))
        .await
        .expect("create");
    let empty = store.turn_summary("ses-sum").await.expect("summary");
    assert_eq!(empty.total_turns, 0);
    assert_eq!(empty.avg_confidence, 0.0);

    let mut faq_turn = sample_turn("what are your hours");
    faq_turn.intent = "faq".to_owned();
    faq_turn.confidence = 0.8;
    let mut human_turn = sample_turn("something odd");
    human_turn.intent = "human".to_owned();
    human_turn.confidence = 0.0;
    for turn in [&faq_turn, &human_turn, &faq_turn] {
        store
            .append_turn("ses-sum", turn, now)
            .await
            .expect("append")
            .expect("active");
    }

    let summary = store.turn_summary("ses-sum").await.expect("summary");
    assert_eq!(summary.total_turns, 3);
    assert_eq!(summary.intents_used, vec!["faq".to_owned(), "human".to_owned()]);
    assert!((summary.avg_confidence - (1.6 / 3.0)).abs() < 1e-9);
    assert_eq!(
        store.session_counts().await.expect("counts").total_turns,
        3
    );

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn feedback_is_persisted_with_generated_id() {
    let (store, db_path) = open_temp_store("feedback").await;
    let now = Utc::now();
    store
        .create_session(&SessionRecord::new("ses-fb", now))
        .await
        .expect("create");

    let first = store
        .save_feedback(
            &NewFeedback {
                session_id: "ses-fb".to_owned(),
                feedback_type: FeedbackType::Helpful,
                feedback_text: Some("quick answer".to_owned()),
                turn_number: None,
            },
            now,
        )
        .await
        .expect("save");
    let second = store
        .save_feedback(
            &NewFeedback {
                session_id: "ses-fb".to_owned(),
                feedback_type: FeedbackType::Incorrect,
                feedback_text: None,
                turn_number: Some(1),
            },
            now,
        )
        .await
        .expect("save");
    assert!(second.feedback_id > first.feedback_id);
    assert_eq!(second.turn_number, Some(1));

    let orphan = store
        .save_feedback(
            &NewFeedback {
                session_id: "no-such-session".to_owned(),
                feedback_type: FeedbackType::Other,
                feedback_text: None,
                turn_number: None,
            },
            now,
        )
        .await;
    assert!(
        orphan.is_err(),
        "foreign key should reject feedback for unknown sessions"
    );

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn faq_index_returns_nearest_entries_by_cosine_similarity() {
    let (store, db_path) = open_temp_store("faq").await;
    let embedder = EmbeddingAdapter::deterministic();
    let entries = [
        faq("faq-hours", "general", "What are your business hours?", "9am to 5pm."),
        faq("faq-refund", "billing", "How do I request a refund?", "Use the billing page."),
        faq("faq-ship", "orders", "How long does shipping take?", "3 to 5 days."),
    ];
    for entry in &entries {
        let embedding = embedder.embed(&entry.question).expect("embed");
        store
            .upsert(entry, &embedding, embedder.model_id())
            .await
            .expect("upsert");
    }
    assert_eq!(store.count().await.expect("count"), 3);

    let query = embedder.embed("what are your business hours").expect("embed");
    let candidates = store.nearest(&query, 2).await.expect("nearest");
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].entry.faq_uuid, "faq-hours");
    assert!((candidates[0].similarity - 1.0).abs() < 1e-4);
    assert!(candidates[0].similarity >= candidates[1].similarity);

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn faq_upsert_replaces_existing_uuid() {
    let (store, db_path) = open_temp_store("faq-upsert").await;
    let embedder = EmbeddingAdapter::deterministic();
    let original = faq("faq-1", "general", "Where are you located?", "Berlin.");
    let replacement = faq("faq-1", "general", "Where are you located?", "Lisbon.");
    for entry in [&original, &replacement] {
        let embedding = embedder.embed(&entry.question).expect("embed");
        store
            .upsert(entry, &embedding, embedder.model_id())
            .await
            .expect("upsert");
    }
    assert_eq!(store.count().await.expect("count"), 1);

    let query = embedder.embed("where are you located").expect("embed");
    let candidates = store.nearest(&query, 3).await.expect("nearest");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].entry.answer, "Lisbon.");

    let short = store.upsert(&original, &[1.0, 0.0], "test").await;
    assert!(matches!(short, Err(StoreError::Query { .. })));

    drop(store);
    remove_db_files(&db_path);
}

#[tokio::test]
async fn zero_vector_faq_rows_are_rejected_and_skipped_by_search() {
    let (store, db_path) = open_temp_store("faq-zero").await;
    let embedder = EmbeddingAdapter::deterministic();
    let hours = faq("faq-hours", "general", "What are your business hours?", "9am to 5pm.");
    let embedding = embedder.embed(&hours.question).expect("embed");
    store
        .upsert(&hours, &embedding, embedder.model_id())
        .await
        .expect("upsert");

    let punctuation = faq("faq-blank", "general", "???", "Nothing to see.");
    let zero = embedder.embed(&punctuation.question).expect("embed");
    assert!(zero.iter().all(|value| *value == 0.0));
    let rejected = store.upsert(&punctuation, &zero, embedder.model_id()).await;
    assert!(matches!(rejected, Err(StoreError::Query { .. })));
    assert_eq!(store.count().await.expect("count"), 1);

    let conn = store.open_connection().await.expect("connection");
    conn.execute(
        "INSERT INTO faq_entries (faq_uuid, category, question, answer, embedding, embedding_model)
         VALUES ('faq-legacy', 'general', '???', 'Nothing to see.', vector32(?1), 'legacy')",
        params![serde_json::to_string(&zero).expect("json")],
    )
    .await
    .expect("raw insert");

    let query = embedder.embed("what are your business hours").expect("embed");
    let candidates = store.nearest(&query, 3).await.expect("nearest");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].entry.faq_uuid, "faq-hours");

    drop(conn);
    drop(store);
    remove_db_files(&db_path);
}

async fn open_temp_store(label: &str) -> (LibsqlStore, String) {
    let db_path = temp_db_path(label);
    let store = LibsqlStore::new_local(db_path.clone())
        .await
        .expect("temp store should initialize");
    (store, db_path)
}

fn sample_turn(user_input: &str) -> NewTurn {
    let mut slots = Map::new();
    slots.insert("category".to_owned(), json!("hours"));
    NewTurn {
        user_input: user_input.to_owned(),
        intent: "faq".to_owned(),
        confidence: 0.75,
        bot_response: "We are open 9am to 5pm.".to_owned(),
        slots,
        emotion: Emotion::Neutral,
        urgency: Urgency::Low,
        processing_time_ms: 12,
    }
}

fn faq(faq_uuid: &str, category: &str, question: &str, answer: &str) -> FaqEntry {
    FaqEntry {
        faq_uuid: faq_uuid.to_owned(),
        category: category.to_owned(),
        question: question.to_owned(),
        answer: answer.to_owned(),
    }
}

fn temp_db_path(label: &str) -> String {
    let mut path = env::temp_dir();
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should move forward")
        .as_nanos();
    path.push(format!(
        "helpdesk-store-{label}-{}-{unique}.db",
        std::process::id()
    ));
    path.to_string_lossy().to_string()
}

fn remove_db_files(db_path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = fs::remove_file(format!("{db_path}{suffix}"));
    }
}
