//! CLI command implementations.

use crate::colors;
use crate::exit_codes::ExitCode;
use crate::{BuildArgs, InferenceArgs, MeetingArgs, SearchArgs};
use meetgraph_core::config::{self, AppConfig, CloudModelPreset};
use meetgraph_core::intake::latest_meeting_audio;
use meetgraph_core::orchestrator::ProgressCallback;
use meetgraph_core::runner::RunnerError;
use meetgraph_core::{
    orchestrator_from_config, registry_from_config, resolve_inference, run_search,
    searcher_from_config, BuildError, BuildOutcome, BuildReport, BuildRequest, InferenceConfig,
    Orchestrator, ProjectLayout, ProjectRegistry, RegistryError, SearchError, SearchOutcome,
    SearchRequest, SourceSet, TaskEvent, TaskHandle, TaskRunner,
};
use meetgraph_types::logging::{self, LogError};
use meetgraph_types::validation::{pair_speakers, validate_project_name};
use meetgraph_types::{AnswerLanguage, BuildStage, SearchMethod};
use serde::Serialize;
use std::convert::Infallible;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// How often wait loops look at the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

type BuildResult = Result<BuildOutcome, BuildError>;

/// Per-invocation state shared by every command.
pub struct Context {
    pub json: bool,
    pub quiet: bool,
    config: AppConfig,
    config_path: Option<PathBuf>,
    root: Option<PathBuf>,
}

impl Context {
    pub fn load(
        json: bool,
        quiet: bool,
        config_path: Option<PathBuf>,
        root: Option<PathBuf>,
    ) -> Self {
        let config = match &config_path {
            Some(path) => config::load_config_from(path),
            None => config::load_config(),
        };
        Self {
            json,
            quiet,
            config,
            config_path,
            root,
        }
    }

    fn registry(&self) -> ProjectRegistry {
        registry_from_config(&self.config, self.root.clone())
    }

    fn inference(&self, args: &InferenceArgs) -> InferenceConfig {
        resolve_inference(
            &self.config.inference,
            &self.config.custom_models,
            args.overrides(),
        )
    }

    /// Orchestrator that echoes stage transitions to stderr unless output is quiet or JSON.
    fn orchestrator(&self) -> Orchestrator {
        let orchestrator = orchestrator_from_config(&self.config, self.registry());
        if self.quiet || self.json {
            return orchestrator;
        }
        let on_progress: ProgressCallback = Arc::new(|stage: BuildStage| {
            if stage != BuildStage::Idle {
                eprintln!("{} {}", colors::dim("stage:"), colors::stage(stage.as_str()));
            }
        });
        orchestrator.with_progress(on_progress)
    }

    fn report_error(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", colors::error(msg));
        }
    }

    fn report_warning(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", colors::warning(msg));
        }
    }

    /// Print a message on stdout unless quiet or in JSON mode.
    fn say(&self, msg: &str) {
        if !self.quiet && !self.json {
            println!("{msg}");
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!(
                "{}",
                colors::error(&format!("Failed to serialize output: {e}"))
            );
            ExitCode::GeneralError
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Create a named project.
pub fn init(ctx: &Context, name: &str) -> ExitCode {
    match ctx.registry().create(name) {
        Ok(root) => {
            if ctx.json {
                return print_json(&serde_json::json!({ "name": name, "path": root }));
            }
            ctx.say(&format!(
                "{} {}",
                colors::success("Created project"),
                colors::bold(name)
            ));
            ctx.say(&format!("  {}", colors::path(&display(&root))));
            ExitCode::Success
        }
        Err(e) => {
            ctx.report_error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}

/// Build a project from a dialogue recording and/or text files.
pub async fn build(ctx: &Context, args: BuildArgs) -> ExitCode {
    let speakers = match pair_speakers(&args.speaker_names, &args.speaker_paths) {
        Ok(Some((pairs, derived))) => {
            if derived {
                ctx.report_warning(
                    "No --speaker-names given; using voice sample file names as speaker names",
                );
            }
            pairs
                .into_iter()
                .map(|(name, path)| (name, PathBuf::from(path)))
                .collect()
        }
        Ok(None) => Vec::new(),
        Err(e) => {
            ctx.report_error(&e.to_string());
            return ExitCode::InvalidArguments;
        }
    };

    let request = BuildRequest {
        project: args.name.clone(),
        sources: SourceSet {
            dialogue: args.dialogue.clone(),
            speakers,
            text_files: args.text_files.clone(),
        },
        inference: ctx.inference(&args.inference),
    };
    run_build(ctx, Arc::new(ctx.orchestrator()), request).await
}

/// Run one build on a worker thread and wait for its single event.
async fn run_build(
    ctx: &Context,
    orchestrator: Arc<Orchestrator>,
    request: BuildRequest,
) -> ExitCode {
    let runner = TaskRunner::new();
    let shutdown = shutdown_flag();
    let handle = match runner
        .try_spawn(move || async move { Ok::<_, Infallible>(orchestrator.run(request).await) })
    {
        Ok(handle) => handle,
        Err(e) => {
            ctx.report_error(&e.to_string());
            return ExitCode::GeneralError;
        }
    };

    let (event, interrupted) = wait_for_event(ctx, handle, &shutdown).await;
    report_build(ctx, event, interrupted)
}

fn report_build(ctx: &Context, event: TaskEvent<BuildResult>, interrupted: bool) -> ExitCode {
    match event {
        TaskEvent::Succeeded(Ok(BuildOutcome::Completed(report))) => {
            if ctx.json {
                return print_json(&BuildSummary {
                    status: "completed",
                    report: &report,
                });
            }
            ctx.say(&colors::success("Build complete"));
            ctx.say(&format!(
                "  {} {}",
                colors::dim("project:"),
                colors::path(&display(&report.project_root))
            ));
            if let Some(transcript) = &report.transcript {
                ctx.say(&format!(
                    "  {} {}",
                    colors::dim("transcript:"),
                    colors::path(&display(transcript))
                ));
            }
            ctx.say(&format!(
                "  {} {}",
                colors::dim("indexed files:"),
                colors::number(&report.staged.len().to_string())
            ));
            ExitCode::Success
        }
        TaskEvent::Succeeded(Ok(BuildOutcome::Rejected(contention))) => {
            if ctx.json {
                print_json(&serde_json::json!({ "status": "rejected", "reason": contention }));
            }
            ctx.report_error(&format!("Build in progress: {contention}"));
            ExitCode::BuildInProgress
        }
        TaskEvent::Succeeded(Err(e)) => {
            if interrupted {
                ctx.report_warning(&format!("Build interrupted: {e}"));
                return ExitCode::UserCancelled;
            }
            ctx.report_error(&e.to_string());
            ExitCode::from(&e)
        }
        TaskEvent::Failed { message, .. } => {
            ctx.report_error(&format!("Build worker failed: {message}"));
            ExitCode::GeneralError
        }
    }
}

#[derive(Serialize)]
struct BuildSummary<'a> {
    status: &'static str,
    #[serde(flatten)]
    report: &'a BuildReport,
}

/// Set on SIGINT/SIGTERM (Ctrl+C on Windows).
///
/// Children share the terminal's process group, so an interactive Ctrl+C
/// also stops the running tool and the build unwinds through its guard.
fn shutdown_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let (mut sigint, mut sigterm) =
                match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                    (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }

            setter.store(true, Ordering::SeqCst);
        });
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
                return;
            }
            setter.store(true, Ordering::SeqCst);
        });
    }

    flag
}

/// Wait for a task's event, announcing an interrupt once.
///
/// Returns the event and whether an interrupt arrived before it.
async fn wait_for_event<T>(
    ctx: &Context,
    handle: TaskHandle<T>,
    shutdown: &AtomicBool,
) -> (TaskEvent<T>, bool) {
    let mut pending = std::pin::pin!(handle.wait());
    let mut announced = false;
    loop {
        tokio::select! {
            event = &mut pending => return (event, shutdown.load(Ordering::SeqCst)),
            _ = tokio::time::sleep(SHUTDOWN_POLL) => {
                if !announced && shutdown.load(Ordering::SeqCst) {
                    announced = true;
                    if !ctx.quiet {
                        eprintln!(
                            "\n{}",
                            colors::info("Interrupted. Waiting for the running step to stop...")
                        );
                    }
                }
            }
        }
    }
}

#[derive(Serialize)]
struct SearchAnswer<'a> {
    project: &'a Path,
    method: SearchMethod,
    answer: &'a str,
}

/// Query a built project.
pub async fn search(ctx: &Context, args: SearchArgs) -> ExitCode {
    let layout = match ctx.registry().layout(args.name.as_deref()) {
        Ok(layout) => layout,
        Err(e) => {
            ctx.report_error(&e.to_string());
            return ExitCode::from(&e);
        }
    };

    let method = SearchMethod::parse(&args.method).unwrap_or_default();
    let request = SearchRequest {
        project_root: layout.root().to_path_buf(),
        query: args.query.clone(),
        method,
        community_level: args.level,
        response_type: args.response_type.clone(),
        answer_language: args.answer_language.as_deref().and_then(AnswerLanguage::parse),
        inference: ctx.inference(&args.inference),
    };
    let searcher = searcher_from_config(&ctx.config);

    let runner = TaskRunner::new();
    let shutdown = shutdown_flag();
    let handle = match runner.try_spawn(move || async move {
        Ok::<_, Infallible>(run_search(&searcher, &request).await)
    }) {
        Ok(handle) => handle,
        Err(e) => {
            ctx.report_error(&e.to_string());
            return ExitCode::GeneralError;
        }
    };

    let (event, interrupted) = wait_for_event(ctx, handle, &shutdown).await;
    report_search(ctx, layout.root(), method, event, interrupted)
}

fn report_search(
    ctx: &Context,
    project: &Path,
    method: SearchMethod,
    event: TaskEvent<Result<SearchOutcome, SearchError>>,
    interrupted: bool,
) -> ExitCode {
    match event {
        TaskEvent::Succeeded(Ok(SearchOutcome::Answered(answer))) => {
            if ctx.json {
                return print_json(&SearchAnswer {
                    project,
                    method,
                    answer: &answer,
                });
            }
            // The answer is the command's output, so it prints even when quiet.
            println!("{answer}");
            ExitCode::Success
        }
        TaskEvent::Succeeded(Ok(SearchOutcome::Rejected(contention))) => {
            ctx.report_error(&format!(
                "Build in progress: {contention}; try again when it finishes"
            ));
            ExitCode::BuildInProgress
        }
        TaskEvent::Succeeded(Err(e)) => {
            if interrupted {
                ctx.report_warning("Search interrupted");
                return ExitCode::UserCancelled;
            }
            ctx.report_error(&e.to_string());
            ExitCode::from(&e)
        }
        TaskEvent::Failed { message, .. } => {
            ctx.report_error(&format!("Search worker failed: {message}"));
            ExitCode::GeneralError
        }
    }
}

/// List named projects.
pub fn list(ctx: &Context) -> ExitCode {
    let projects = match ctx.registry().summaries() {
        Ok(projects) => projects,
        Err(e) => {
            ctx.report_error(&e.to_string());
            return ExitCode::from(&e);
        }
    };

    if ctx.json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        if !ctx.quiet {
            println!("{}", colors::dim("No projects found."));
        }
        return ExitCode::Success;
    }

    let name_width = projects
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "{}  {}  {}",
        colors::pad_left("NAME", name_width, colors::header),
        colors::pad_left("STATUS", 8, colors::header),
        colors::header("PATH")
    );
    println!(
        "{}  {}  {}",
        "-".repeat(name_width),
        "-".repeat(8),
        "-".repeat(4)
    );

    for project in &projects {
        let status = if project.build_in_progress {
            "building"
        } else {
            "idle"
        };
        println!(
            "{}  {}  {}",
            colors::pad_left(&project.name, name_width, colors::bold),
            colors::pad_left(status, 8, colors::stage),
            colors::dim(&project.path)
        );
    }
    ExitCode::Success
}

/// Delete a named project after confirmation.
pub fn delete(ctx: &Context, name: &str, yes: bool) -> ExitCode {
    if let Err(e) = validate_project_name(name) {
        ctx.report_error(&e.to_string());
        return ExitCode::InvalidArguments;
    }

    if !yes {
        if !io::stdin().is_terminal() {
            ctx.report_error("Refusing to delete without confirmation; pass --yes");
            return ExitCode::InvalidArguments;
        }
        match confirm(&format!(
            "Delete project '{name}' and all of its files? [y/N] "
        )) {
            Ok(true) => {}
            Ok(false) => {
                ctx.say(&colors::dim("Cancelled."));
                return ExitCode::UserCancelled;
            }
            Err(e) => {
                ctx.report_error(&format!("Failed to read confirmation: {e}"));
                return ExitCode::GeneralError;
            }
        }
    }

    match ctx.registry().delete(name) {
        Ok(()) => {
            if ctx.json {
                return print_json(&serde_json::json!({ "name": name, "deleted": true }));
            }
            ctx.say(&colors::success(&format!("Deleted project '{name}'")));
            ExitCode::Success
        }
        Err(e) => {
            ctx.report_error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Copy an existing project directory into the history root.
pub fn import(ctx: &Context, path: &Path, force: bool) -> ExitCode {
    let registry = ctx.registry();
    match registry.import(path, force) {
        Ok(name) => {
            let root = registry.resolve(Some(&name));
            if ctx.json {
                return print_json(&serde_json::json!({ "name": name, "path": root }));
            }
            ctx.say(&format!(
                "{} {}",
                colors::success("Imported project"),
                colors::bold(&name)
            ));
            ctx.say(&format!("  {}", colors::path(&display(&root))));
            ExitCode::Success
        }
        Err(e) => {
            if matches!(e, RegistryError::AlreadyExists(_)) {
                ctx.report_error(&format!("{e}; pass --force to replace it"));
            } else {
                ctx.report_error(&e.to_string());
            }
            ExitCode::from(&e)
        }
    }
}

/// Remove a leftover lock marker.
pub fn unlock(ctx: &Context, name: Option<&str>) -> ExitCode {
    match ctx.registry().clear_stale_lock(name) {
        Ok(removed) => {
            if ctx.json {
                return print_json(&serde_json::json!({ "name": name, "removed": removed }));
            }
            if removed {
                ctx.say(&colors::success("Removed lock marker"));
            } else {
                ctx.say(&colors::dim("No lock marker present."));
            }
            ExitCode::Success
        }
        Err(e) => {
            ctx.report_error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}

/// Build from the newest meeting recording, once or on an interval.
pub async fn meeting(ctx: &Context, args: MeetingArgs) -> ExitCode {
    let layout = match ctx.registry().layout(Some(&args.name)) {
        Ok(layout) => layout,
        Err(e) => {
            ctx.report_error(&e.to_string());
            return ExitCode::from(&e);
        }
    };
    if !layout.exists() {
        let e = RegistryError::NotFound(args.name.clone());
        ctx.report_error(&e.to_string());
        return ExitCode::from(&e);
    }

    let inference = ctx.inference(&args.inference);
    let request_for = |dialogue: PathBuf| BuildRequest {
        project: Some(args.name.clone()),
        sources: SourceSet {
            dialogue: Some(dialogue),
            speakers: vec![(args.speaker_name.clone(), args.speaker_path.clone())],
            text_files: Vec::new(),
        },
        inference: inference.clone(),
    };
    let orchestrator = Arc::new(ctx.orchestrator());

    let Some(minutes) = args.interval else {
        return match newest_recording(&layout) {
            Ok(Some(dialogue)) => run_build(ctx, orchestrator, request_for(dialogue)).await,
            Ok(None) => {
                ctx.report_error(&format!(
                    "No .wav recordings in {}",
                    display(&layout.meeting_data())
                ));
                ExitCode::ProjectError
            }
            Err(msg) => {
                ctx.report_error(&msg);
                ExitCode::ProjectError
            }
        };
    };

    let runner = TaskRunner::new();
    let shutdown = shutdown_flag();
    let mut ticker = tokio::time::interval(Duration::from_secs(minutes * 60));
    let mut last_built: Option<(PathBuf, Option<SystemTime>)> = None;
    let quiet = ctx.quiet || ctx.json;

    ctx.say(&colors::info(&format!(
        "Watching {} every {} minute(s). Press Ctrl+C to stop.",
        display(&layout.meeting_data()),
        minutes
    )));

    while !shutdown.load(Ordering::SeqCst) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::time::sleep(SHUTDOWN_POLL) => continue,
        }

        if runner.is_busy() {
            info!("Previous meeting build still running; skipping this run");
            continue;
        }

        let dialogue = match newest_recording(&layout) {
            Ok(Some(dialogue)) => dialogue,
            Ok(None) => {
                debug!("No recordings in {:?} yet", layout.meeting_data());
                continue;
            }
            Err(msg) => {
                warn!("{}", msg);
                continue;
            }
        };

        let modified = std::fs::metadata(&dialogue)
            .and_then(|m| m.modified())
            .ok();
        let key = (dialogue.clone(), modified);
        if last_built.as_ref() == Some(&key) {
            debug!("Newest recording {:?} unchanged since last build", dialogue);
            continue;
        }

        let worker = Arc::clone(&orchestrator);
        let request = request_for(dialogue);
        let spawned = runner.try_spawn_with_callback(
            move || async move { Ok::<_, Infallible>(worker.run(request).await) },
            Box::new(move |event| report_meeting_event(event, quiet)),
        );
        match spawned {
            Ok(()) => last_built = Some(key),
            Err(RunnerError::Busy) => debug!("Runner became busy; skipping this run"),
            Err(e) => {
                ctx.report_error(&e.to_string());
                return ExitCode::GeneralError;
            }
        }
    }

    if runner.is_busy() {
        if !ctx.quiet {
            eprintln!(
                "\n{}",
                colors::info("Stopping. Waiting for the running build to finish...")
            );
        }
        while runner.is_busy() {
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
    }
    ExitCode::Success
}

fn newest_recording(layout: &ProjectLayout) -> Result<Option<PathBuf>, String> {
    latest_meeting_audio(layout).map_err(|e| {
        format!(
            "Failed to scan {}: {}",
            display(&layout.meeting_data()),
            e
        )
    })
}

/// Runs on the worker thread once per scheduled build.
fn report_meeting_event(event: TaskEvent<BuildResult>, quiet: bool) {
    match event {
        TaskEvent::Succeeded(Ok(BuildOutcome::Completed(report))) => {
            info!(
                "Meeting build finished for {:?} ({} files)",
                report.project_root,
                report.staged.len()
            );
            if !quiet {
                println!(
                    "{} {}",
                    colors::success("Meeting build complete:"),
                    colors::number(&format!("{} file(s) indexed", report.staged.len()))
                );
            }
        }
        TaskEvent::Succeeded(Ok(BuildOutcome::Rejected(contention))) => {
            warn!("Meeting build skipped: {}", contention);
            if !quiet {
                eprintln!("{}", colors::warning(&format!("Build skipped: {contention}")));
            }
        }
        TaskEvent::Succeeded(Err(e)) => {
            if !quiet {
                eprintln!("{}", colors::error(&e.to_string()));
            }
        }
        TaskEvent::Failed { message, .. } => {
            if !quiet {
                eprintln!(
                    "{}",
                    colors::error(&format!("Build worker failed: {message}"))
                );
            }
        }
    }
}

fn log_error_code(e: &LogError) -> ExitCode {
    match e {
        LogError::InvalidName(_) => ExitCode::InvalidArguments,
        LogError::NotFound(_) | LogError::Io { .. } => ExitCode::GeneralError,
    }
}

/// List log files, newest first.
pub fn logs_list(ctx: &Context) -> ExitCode {
    let dir = logging::log_dir();
    let files = match logging::list_log_files(&dir) {
        Ok(files) => files,
        Err(e) => {
            ctx.report_error(&e.to_string());
            return log_error_code(&e);
        }
    };

    if ctx.json {
        return print_json(&serde_json::json!({ "directory": dir, "files": files }));
    }
    if files.is_empty() {
        ctx.say(&colors::dim(&format!(
            "No log files in {}",
            display(&dir)
        )));
        return ExitCode::Success;
    }
    ctx.say(&colors::dim(&display(&dir)));
    for file in &files {
        println!("{file}");
    }
    ExitCode::Success
}

/// Print one log file, optionally only its last lines.
pub fn logs_show(ctx: &Context, file: &str, tail: Option<usize>) -> ExitCode {
    let content = match logging::read_log_file(&logging::log_dir(), file) {
        Ok(content) => content,
        Err(e) => {
            ctx.report_error(&e.to_string());
            return log_error_code(&e);
        }
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = tail.map_or(0, |n| lines.len().saturating_sub(n));
    let shown = &lines[start..];

    if ctx.json {
        return print_json(&serde_json::json!({ "file": file, "lines": shown }));
    }
    for line in shown {
        println!("{line}");
    }
    ExitCode::Success
}

#[derive(Serialize)]
struct CloudModelListing<'a> {
    name: &'a str,
    api_base: Option<&'a str>,
    has_api_key: bool,
}

/// List the configured default and saved models. Keys are never printed.
pub fn models_list(ctx: &Context) -> ExitCode {
    let defaults = &ctx.config.inference;
    let custom = &ctx.config.custom_models;
    let cloud: Vec<CloudModelListing<'_>> = custom
        .cloud
        .iter()
        .map(|p| CloudModelListing {
            name: &p.name,
            api_base: p.api_base.as_deref(),
            has_api_key: p.api_key.is_some(),
        })
        .collect();

    if ctx.json {
        return print_json(&serde_json::json!({
            "mode": defaults.mode,
            "local_model": defaults.local_model,
            "cloud_model": defaults.cloud_model,
            "embedding_model": defaults.embedding_model,
            "custom_local": custom.local,
            "custom_cloud": cloud,
        }));
    }

    println!("{}", colors::header("Defaults"));
    println!("  {:<16}{}", "mode", defaults.mode);
    println!("  {:<16}{}", "local model", defaults.local_model);
    println!("  {:<16}{}", "cloud model", defaults.cloud_model);
    println!("  {:<16}{}", "embedding", defaults.embedding_model);

    println!();
    println!("{}", colors::header("Saved local models"));
    if custom.local.is_empty() {
        println!("  {}", colors::dim("none"));
    }
    for name in &custom.local {
        println!("  {name}");
    }

    println!();
    println!("{}", colors::header("Saved cloud models"));
    if cloud.is_empty() {
        println!("  {}", colors::dim("none"));
        return ExitCode::Success;
    }
    let name_width = cloud.iter().map(|c| c.name.len()).max().unwrap_or(4).max(4);
    println!(
        "  {}  {}  {}",
        colors::pad_left("NAME", name_width, colors::header),
        colors::pad_left("KEY", 3, colors::header),
        colors::header("API BASE")
    );
    for model in &cloud {
        println!(
            "  {:<name_width$}  {}  {}",
            model.name,
            if model.has_api_key {
                colors::yes()
            } else {
                colors::no()
            },
            colors::dim(model.api_base.unwrap_or("(default)"))
        );
    }
    ExitCode::Success
}

/// Save a model name to the application config.
pub fn models_add(
    ctx: &Context,
    mode: &str,
    name: &str,
    api_base: Option<String>,
    api_key: Option<String>,
) -> ExitCode {
    let name = name.trim();
    if name.is_empty() {
        ctx.report_error("Model name must not be empty");
        return ExitCode::InvalidArguments;
    }

    let mut updated = ctx.config.clone();
    let added = if mode == "cloud" {
        updated.custom_models.upsert_cloud(CloudModelPreset {
            name: name.to_string(),
            api_base,
            api_key,
        })
    } else {
        if api_base.is_some() || api_key.is_some() {
            ctx.report_warning("--api-base and --api-key apply to cloud models only; ignoring");
        }
        if !updated.custom_models.add_local(name) {
            ctx.say(&colors::dim(&format!("Local model '{name}' is already saved.")));
            return ExitCode::Success;
        }
        true
    };

    let saved = match &ctx.config_path {
        Some(path) => config::save_config_to(&updated, path).map(|()| path.clone()),
        None => config::save_config(&updated),
    };
    match saved {
        Ok(path) => {
            if ctx.json {
                return print_json(&serde_json::json!({
                    "mode": mode,
                    "name": name,
                    "added": added,
                    "config": path,
                }));
            }
            let verb = if added { "Saved" } else { "Updated" };
            ctx.say(&colors::success(&format!("{verb} {mode} model '{name}'")));
            ctx.say(&format!("  {}", colors::path(&display(&path))));
            ExitCode::Success
        }
        Err(e) => {
            ctx.report_error(&e.to_string());
            ExitCode::ConfigurationError
        }
    }
}

/// Print version information.
pub fn version(json: bool) {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!("{}", serde_json::json!({ "version": version }));
    } else {
        println!("{} {}", colors::bold("meetgraph"), version);
    }
}
