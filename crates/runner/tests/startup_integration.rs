use std::{
    env, fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use runner::{AppContext, CONFIG_FILE_NAME, CliOverrides, ConfigSearchPaths, load_config_with_paths};
use types::{ChatRequest, EmbeddingBackend, ResponseSource};

#[tokio::test]
async fn workspace_config_drives_a_working_chat_service() {
    let root = temp_dir("integration-chat");
    let paths = test_paths(&root);
    let db_path = root.join("data/helpdesk.db");
    write_config(
        &paths.workspace_dir,
        &format!(
            r#"
config_version = "1.0.0"
[store]
db_path = "{}"
[embedding]
backend = "deterministic"
[session]
max_turns = 4
"#,
            db_path.display()
        ),
    );

    let config = load_config_with_paths(&paths, None, CliOverrides::default())
        .expect("config should load");
    assert_eq!(config.embedding.backend, EmbeddingBackend::Deterministic);

    let context = AppContext::build(config).await.expect("context should build");
    assert!(db_path.is_file(), "store should create its parent directory");

    let first = context
        .chat()
        .handle(ChatRequest {
            user_text: "hello".to_owned(),
            session_id: None,
        })
        .await
        .expect("greeting should be handled");
    assert_eq!(first.intent, ResponseSource::Casual);

    let second = context
        .chat()
        .handle(ChatRequest {
            user_text: "my invoice shows a duplicate charge".to_owned(),
            session_id: Some(first.session_id.clone()),
        })
        .await
        .expect("question should be handled");
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.turn_count, 2);
    assert_eq!(second.intent, ResponseSource::Human);
    assert!(second.need_human);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn reopening_the_store_keeps_sessions() {
    let root = temp_dir("integration-reopen");
    let paths = test_paths(&root);
    let db_path = root.join("helpdesk.db");
    write_config(
        &paths.workspace_dir,
        &format!(
            "[store]\ndb_path = \"{}\"\n[embedding]\nbackend = \"deterministic\"\n",
            db_path.display()
        ),
    );

    let session_id = {
        let config = load_config_with_paths(&paths, None, CliOverrides::default())
            .expect("config should load");
        let context = AppContext::build(config).await.expect("context should build");
        context
            .chat()
            .handle(ChatRequest {
                user_text: "hi".to_owned(),
                session_id: None,
            })
            .await
            .expect("chat")
            .session_id
    };

    let config =
        load_config_with_paths(&paths, None, CliOverrides::default()).expect("config should load");
    let context = AppContext::build(config).await.expect("context should rebuild");
    let view = context
        .sessions()
        .get(&session_id)
        .await
        .expect("get")
        .expect("session survives a restart");
    assert_eq!(view.turns.len(), 1);

    let _ = fs::remove_dir_all(root);
}

fn test_paths(root: &Path) -> ConfigSearchPaths {
    ConfigSearchPaths {
        system_dir: root.join("system"),
        user_dir: None,
        workspace_dir: root.join("workspace"),
        explicit_file: None,
    }
}

fn write_config(dir: &Path, content: &str) {
    fs::create_dir_all(dir).expect("config dir should be creatable");
    fs::write(dir.join(CONFIG_FILE_NAME), content.trim_start())
        .expect("config file should be writable");
}

fn temp_dir(label: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic")
        .as_nanos();
    path.push(format!(
        "helpdesk-runner-{label}-{}-{unique}",
        std::process::id()
    ));
    fs::create_dir_all(&path).expect("temp dir should be creatable");
    path
}
