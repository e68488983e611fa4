use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use std::time::Duration;

use datatex::api::{create_router, Changed, CompileResponse, Health};
use datatex::models::{ChapterSummary, DocumentFile, FileEntry};
use datatex::{Compiler, CompilerConfig, Database};
use datatex_core::RetentionPolicy;

const FAKE_ENGINE: &str = r#"
out=""
for arg in "$@"; do
  case "$arg" in
    -output-directory=*) out="${arg#-output-directory=}" ;;
  esac
done
if grep -q broken "$out/document.tex"; then
  echo "! LaTeX Error: something is broken"
  exit 1
fi
echo "Output written on document.pdf"
printf '%%PDF-1.4' > "$out/document.pdf"
"#;

struct Harness {
    server: TestServer,
    _dir: tempfile::TempDir,
}

fn setup() -> Harness {
    setup_with_db(Database::open_memory().expect("Failed to create test database"))
}

fn setup_with_db(db: Database) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("engine.sh");
    std::fs::write(&script, FAKE_ENGINE).unwrap();

    let compiler = Compiler::new(CompilerConfig {
        engine: "sh".into(),
        engine_args: vec![script.to_string_lossy().into_owned()],
        timeout: Duration::from_secs(10),
        max_concurrent: 1,
        work_root: dir.path().join("work"),
        retention: RetentionPolicy::KeepNone,
    });

    Harness {
        server: TestServer::new(create_router(db, compiler)).unwrap(),
        _dir: dir,
    }
}

async fn create(server: &TestServer, title: &str, chapter: &str) -> FileEntry {
    let response = server
        .post("/api/files")
        .json(&json!({
            "title": title,
            "content": "\\section{Intro}",
            "type": "tex",
            "chapter": chapter,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<FileEntry>()
}

#[tokio::test]
async fn test_health_reports_store_ready() {
    let h = setup();
    let health = h.server.get("/health").await.json::<Health>();
    assert_eq!(health.status, "ok");
    assert!(health.store_ready);
}

#[tokio::test]
async fn test_create_then_list_files() {
    let h = setup();
    let created = create(&h.server, "b.tex", "Calculus").await;
    assert_eq!(created.chapter.as_deref(), Some("Calculus"));

    let files = h.server.get("/api/files").await.json::<Vec<FileEntry>>();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, created.id);
    assert_eq!(files[0].file_type, "tex");
}

#[tokio::test]
async fn test_create_without_chapter_uses_uncategorized() {
    let h = setup();
    let response = h
        .server
        .post("/api/files")
        .json(&json!({ "title": "loose.tex", "content": "" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(
        response.json::<FileEntry>().chapter.as_deref(),
        Some("Uncategorized")
    );
}

#[tokio::test]
async fn test_update_and_delete_report_changes() {
    let h = setup();
    let created = create(&h.server, "a.tex", "Algebra").await;

    let updated = h
        .server
        .put(&format!("/api/files/{}", created.id))
        .json(&json!({ "content": "new body" }))
        .await
        .json::<Changed>();
    assert!(updated.changed);

    let file = h
        .server
        .get(&format!("/api/files/{}", created.id))
        .await
        .json::<DocumentFile>();
    assert_eq!(file.content.as_deref(), Some("new body"));

    let missing = h
        .server
        .put("/api/files/does-not-exist")
        .json(&json!({ "content": "x" }))
        .await
        .json::<Changed>();
    assert!(!missing.changed);

    let deleted = h
        .server
        .delete(&format!("/api/files/{}", created.id))
        .await
        .json::<Changed>();
    assert!(deleted.changed);

    let again = h
        .server
        .delete(&format!("/api/files/{}", created.id))
        .await
        .json::<Changed>();
    assert!(!again.changed);
}

#[tokio::test]
async fn test_get_unknown_file_is_404() {
    let h = setup();
    let response = h.server.get("/api/files/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_chapters_are_shared_by_name() {
    let h = setup();
    create(&h.server, "one.tex", "Probability").await;
    create(&h.server, "two.tex", "Probability").await;

    let chapters = h.server.get("/api/chapters").await.json::<Vec<ChapterSummary>>();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].file_count, 2);
}

#[tokio::test]
async fn test_concurrent_creates_all_land() {
    let h = setup();
    let (a, b, c, d) = tokio::join!(
        create(&h.server, "a.tex", "Algebra"),
        create(&h.server, "b.tex", "Algebra"),
        create(&h.server, "c.tex", "Geometry"),
        create(&h.server, "d.tex", "Geometry"),
    );
    assert_eq!(
        [&a.id, &b.id, &c.id, &d.id]
            .iter()
            .collect::<std::collections::HashSet<_>>()
            .len(),
        4
    );

    let files = h.server.get("/api/files").await.json::<Vec<FileEntry>>();
    assert_eq!(files.len(), 4);
    let chapters = h.server.get("/api/chapters").await.json::<Vec<ChapterSummary>>();
    assert!(chapters.iter().all(|c| c.file_count == 2));
}

#[tokio::test]
async fn test_unready_store_returns_503() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let h = setup_with_db(Database::initialize(blocker.join("db.sqlite")));

    let response = h.server.get("/api/files").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let health = h.server.get("/health").await.json::<Health>();
    assert!(!health.store_ready);
}

#[tokio::test]
async fn test_compile_success_returns_base64_pdf() {
    let h = setup();
    let response = h
        .server
        .post("/api/compile")
        .json(&json!({ "content": "\\documentclass{article}\\begin{document}x\\end{document}" }))
        .await
        .json::<CompileResponse>();

    assert!(response.success);
    assert_eq!(response.data.as_deref(), Some("JVBERi0xLjQ="));
    assert!(response.logs.contains("Output written"));
}

#[tokio::test]
async fn test_compile_failure_returns_logs_only() {
    let h = setup();
    let response = h
        .server
        .post("/api/compile")
        .json(&json!({ "content": "broken" }))
        .await;
    response.assert_status_ok();

    let body = response.json::<CompileResponse>();
    assert!(!body.success);
    assert!(body.data.is_none());
    assert!(body.logs.contains("something is broken"));
}
