//! End-to-end builds against shell stand-ins for the Python tools.

#![cfg(unix)]

use meetgraph_core::index::SubprocessIndexer;
use meetgraph_core::search::{SubprocessSearcher, DEFAULT_COMMUNITY_LEVEL, DEFAULT_RESPONSE_TYPE};
use meetgraph_core::tool::ToolCommand;
use meetgraph_core::transcribe::SubprocessTranscriber;
use meetgraph_core::{
    run_search, BuildError, BuildOutcome, BuildRequest, InferenceConfig, IntakeError,
    LockContention, Orchestrator, ProjectRegistry, SearchOutcome, SearchRequest, SourceSet,
    TaskEvent, TaskRunner,
};
use meetgraph_types::SearchMethod;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn shell(script: &str, name: &str) -> ToolCommand {
    ToolCommand::new("sh", vec!["-c".into(), script.into(), name.into()])
}

/// Indexer stand-in that records the files it was given.
fn recording_indexer() -> SubprocessIndexer {
    SubprocessIndexer::new(
        shell("ls \"$2/input_new\" > \"$2/indexed.txt\"", "indexer"),
        vec![],
    )
}

fn transcriber() -> SubprocessTranscriber {
    SubprocessTranscriber::new(shell("printf 'Alice: hello' > \"$6\"", "transcriber"), vec![])
}

fn orchestrator(data_root: &Path, indexer: SubprocessIndexer) -> Orchestrator {
    Orchestrator::new(
        ProjectRegistry::new(data_root),
        Arc::new(transcriber()),
        Arc::new(indexer),
    )
}

fn text_request(name: &str, file: &Path) -> BuildRequest {
    BuildRequest {
        project: Some(name.to_string()),
        sources: SourceSet {
            text_files: vec![file.to_path_buf()],
            ..Default::default()
        },
        inference: InferenceConfig::default(),
    }
}

#[tokio::test]
async fn text_file_build_stages_and_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&dir.path().join("data"), recording_indexer());
    let root = orchestrator.registry().create("demo-1").unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, "minutes").unwrap();

    let outcome = orchestrator.run(text_request("demo-1", &a)).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Completed(_)));

    assert_eq!(fs::read_to_string(root.join("indexed.txt")).unwrap(), "a.txt\n");
    assert!(!root.join(".lock").exists());
    assert!(a.exists());
    let settings = fs::read_to_string(root.join("settings.yaml")).unwrap();
    assert!(settings.contains("input_new"));
}

#[tokio::test]
async fn dialogue_build_indexes_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&dir.path().join("data"), recording_indexer());
    let root = orchestrator.registry().create("weekly").unwrap();
    let meeting = dir.path().join("meeting.wav");
    let alice = dir.path().join("alice.wav");
    fs::write(&meeting, b"RIFF").unwrap();
    fs::write(&alice, b"RIFF").unwrap();

    let request = BuildRequest {
        project: Some("weekly".into()),
        sources: SourceSet {
            dialogue: Some(meeting),
            speakers: vec![("Alice".into(), alice)],
            text_files: vec![],
        },
        inference: InferenceConfig::default(),
    };
    orchestrator.run(request).await.unwrap();

    assert_eq!(
        fs::read_to_string(root.join("temp_transcripts").join("meeting_transcript.txt")).unwrap(),
        "Alice: hello"
    );
    assert_eq!(
        fs::read_to_string(root.join("indexed.txt")).unwrap(),
        "meeting_transcript.txt\n"
    );
}

#[tokio::test]
async fn second_build_archives_first_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&dir.path().join("data"), recording_indexer());
    let root = orchestrator.registry().create("demo-1").unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, "first").unwrap();
    fs::write(&b, "second").unwrap();

    orchestrator.run(text_request("demo-1", &a)).await.unwrap();
    orchestrator.run(text_request("demo-1", &b)).await.unwrap();

    assert_eq!(fs::read_to_string(root.join("indexed.txt")).unwrap(), "b.txt\n");
    let archived: Vec<String> = fs::read_dir(root.join("input_archive"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(archived.len(), 1);
    assert!(archived[0].ends_with("_a.txt"));
}

#[tokio::test]
async fn missing_speaker_sample_stages_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&dir.path().join("data"), recording_indexer());
    let root = orchestrator.registry().create("demo-1").unwrap();
    let meeting = dir.path().join("meeting.wav");
    fs::write(&meeting, b"RIFF").unwrap();

    let request = BuildRequest {
        project: Some("demo-1".into()),
        sources: SourceSet {
            dialogue: Some(meeting),
            speakers: vec![("Alice".into(), "missing.wav".into())],
            text_files: vec![],
        },
        inference: InferenceConfig::default(),
    };
    let err = orchestrator.run(request).await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Intake(IntakeError::MissingSourceFiles(ref missing))
            if missing == &vec![std::path::PathBuf::from("missing.wav")]
    ));
    assert_eq!(fs::read_dir(root.join("input_new")).unwrap().count(), 0);
    assert_eq!(fs::read_dir(root.join("input_archive")).unwrap().count(), 0);
    assert!(!root.join("indexed.txt").exists());
}

#[tokio::test]
async fn leftover_transcript_is_not_reused() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(
        ProjectRegistry::new(dir.path().join("data")),
        Arc::new(SubprocessTranscriber::new(shell("exit 0", "transcriber"), vec![])),
        Arc::new(recording_indexer()),
    );
    let root = orchestrator.registry().create("weekly").unwrap();
    fs::create_dir_all(root.join("temp_transcripts")).unwrap();
    fs::write(
        root.join("temp_transcripts").join("meeting_transcript.txt"),
        "LAST WEEK",
    )
    .unwrap();
    let meeting = dir.path().join("meeting.wav");
    let alice = dir.path().join("alice.wav");
    fs::write(&meeting, b"RIFF").unwrap();
    fs::write(&alice, b"RIFF").unwrap();

    let request = BuildRequest {
        project: Some("weekly".into()),
        sources: SourceSet {
            dialogue: Some(meeting),
            speakers: vec![("Alice".into(), alice)],
            text_files: vec![],
        },
        inference: InferenceConfig::default(),
    };
    let err = orchestrator.run(request).await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Intake(IntakeError::Transcription { .. })
    ));
    assert_eq!(fs::read_dir(root.join("input_new")).unwrap().count(), 0);
    assert!(!root.join("indexed.txt").exists());
    assert!(!root.join(".lock").exists());
}

#[tokio::test]
async fn failing_indexer_reports_code_and_unlocks() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(
        &dir.path().join("data"),
        SubprocessIndexer::new(shell("exit 5", "indexer"), vec![]),
    );
    let root = orchestrator.registry().create("demo-1").unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, "x").unwrap();

    let err = orchestrator.run(text_request("demo-1", &a)).await.unwrap_err();
    assert!(matches!(err, BuildError::IndexingFailure { code: Some(5) }));
    assert!(!root.join(".lock").exists());
}

#[tokio::test]
async fn existing_marker_rejects_build_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&dir.path().join("data"), recording_indexer());
    let root = orchestrator.registry().create("demo-1").unwrap();
    fs::write(root.join(".lock"), b"").unwrap();
    let settings_before = fs::read(root.join("settings.yaml")).unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, "x").unwrap();

    let outcome = orchestrator.run(text_request("demo-1", &a)).await.unwrap();
    assert_eq!(outcome, BuildOutcome::Rejected(LockContention::MarkerPresent));

    let searcher = SubprocessSearcher::new(shell("echo should-not-run", "query"), vec![]);
    let search = SearchRequest {
        project_root: root.clone(),
        query: "anything".into(),
        method: SearchMethod::Local,
        community_level: DEFAULT_COMMUNITY_LEVEL,
        response_type: DEFAULT_RESPONSE_TYPE.into(),
        answer_language: None,
        inference: InferenceConfig::default(),
    };
    let outcome = run_search(&searcher, &search).await.unwrap();
    assert_eq!(outcome, SearchOutcome::Rejected(LockContention::MarkerPresent));

    assert!(root.join(".lock").exists());
    assert_eq!(fs::read(root.join("settings.yaml")).unwrap(), settings_before);
    assert_eq!(fs::read_dir(root.join("input_new")).unwrap().count(), 0);
}

/// Indexer stand-in that writes each build into a new `output/runN/artifacts`.
fn run_writing_indexer() -> SubprocessIndexer {
    SubprocessIndexer::new(
        shell(
            "n=$(ls \"$2/output\" | wc -l | tr -d ' '); \
             mkdir -p \"$2/output/run$n/artifacts\"; \
             ls \"$2/input_new\" > \"$2/output/run$n/artifacts/indexed.txt\"",
            "indexer",
        ),
        vec![],
    )
}

/// Query stand-in that answers with the file list of the run it is pointed at.
fn run_reading_searcher() -> SubprocessSearcher {
    SubprocessSearcher::new(
        shell(
            "while [ $# -gt 0 ]; do \
               if [ \"$1\" = --data ]; then cat \"$2/indexed.txt\"; fi; shift; \
             done",
            "query",
        ),
        vec![],
    )
}

#[tokio::test]
async fn search_reaches_every_build() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&dir.path().join("data"), run_writing_indexer());
    let root = orchestrator.registry().create("demo-1").unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, "first").unwrap();
    fs::write(&b, "second").unwrap();

    orchestrator.run(text_request("demo-1", &a)).await.unwrap();
    orchestrator.run(text_request("demo-1", &b)).await.unwrap();

    let search = SearchRequest {
        project_root: root.clone(),
        query: "what happened?".into(),
        method: SearchMethod::Local,
        community_level: DEFAULT_COMMUNITY_LEVEL,
        response_type: DEFAULT_RESPONSE_TYPE.into(),
        answer_language: None,
        inference: InferenceConfig::default(),
    };
    match run_search(&run_reading_searcher(), &search).await.unwrap() {
        SearchOutcome::Answered(answer) => {
            assert!(answer.contains("## run0"));
            assert!(answer.contains("a.txt"));
            assert!(answer.contains("## run1"));
            assert!(answer.contains("b.txt"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn runner_reports_build_result_once() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Arc::new(orchestrator(&dir.path().join("data"), recording_indexer()));
    orchestrator.registry().create("demo-1").unwrap();
    let a = dir.path().join("a.txt");
    fs::write(&a, "x").unwrap();

    let runner = TaskRunner::new();
    let worker = Arc::clone(&orchestrator);
    let request = text_request("demo-1", &a);
    let handle = runner
        .try_spawn(move || async move { worker.run(request).await })
        .unwrap();

    let event = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(handle.wait());
    match event {
        TaskEvent::Succeeded(BuildOutcome::Completed(report)) => {
            assert_eq!(report.staged.len(), 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
