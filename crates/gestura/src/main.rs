//! `gestura` - CLI for gesture practice and customization
//!
//! This binary replays hand-tracker frames for practice and sample capture,
//! and drives the gesture request and customization approval workflows.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use gestura::aggregator::{AggregateOutcome, SampleAggregator};
use gestura::api::ApiResponse;
use gestura::approval::{ApprovalPipeline, ProcessRunner};
use gestura::capture::{CaptureEvent, CaptureSession};
use gestura::cli::{
    BatchCommand, CaptureCommand, Cli, Command, ConfigCommand, PracticeCommand, RequestsCommand,
};
use gestura::landmark::TrackerFrame;
use gestura::lifecycle::{Actor, Lifecycle};
use gestura::matcher::{Matcher, PracticeEvent, PracticeSession};
use gestura::storage::Storage;
use gestura::template::{display_name, normalize_label, TemplateLibrary};
use gestura::trigger::TriggerSettings;
use gestura::upload::CsvUploader;
use gestura::{init_logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let library = load_templates(cli.templates.as_deref())?;

    // Execute the command
    match cli.command {
        Command::Practice(cmd) => handle_practice(&config, &library, cmd).await,
        Command::Capture(cmd) => handle_capture(&config, library, cmd).await,
        Command::Templates(cmd) => handle_templates(&library, cmd.json),
        Command::Requests(cmd) => {
            let services = Services::open(&config, library)?;
            handle_requests(&services.lifecycle, cmd)
        }
        Command::Batch(cmd) => {
            let services = Services::open(&config, library)?;
            handle_batch(&services.approval, cmd).await
        }
        Command::Samples(cmd) => {
            let services = Services::open(&config, library)?;
            emit(&ApiResponse::from_result(
                services.approval.samples(&cmd.admin),
                "Samples retrieved",
                "Failed to retrieve samples",
            ))
        }
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

/// Storage-backed services shared by the workflow commands.
#[derive(Debug)]
struct Services {
    lifecycle: Lifecycle,
    approval: ApprovalPipeline,
}

impl Services {
    fn open(config: &Config, library: TemplateLibrary) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let storage = Storage::open(config.database_path())
            .context("failed to open database")?
            .into_shared();
        let pipeline_dir = config.pipeline_dir();
        let lifecycle = Lifecycle::new(storage.clone(), library, pipeline_dir.clone());
        let approval = ApprovalPipeline::new(
            storage,
            lifecycle.clone(),
            Arc::new(ProcessRunner),
            pipeline_dir,
            config.pipeline.clone(),
        );
        Ok(Self {
            lifecycle,
            approval,
        })
    }
}

fn load_templates(path: Option<&Path>) -> anyhow::Result<TemplateLibrary> {
    let Some(path) = path else {
        return Ok(TemplateLibrary::builtin());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read templates from {}", path.display()))?;
    let library = TemplateLibrary::from_json(&json)
        .with_context(|| format!("invalid template file {}", path.display()))?;
    debug!("Loaded {} templates from {}", library.len(), path.display());
    Ok(library)
}

/// Print an envelope as JSON; failures exit non-zero.
fn emit<T: Serialize>(response: &ApiResponse<T>) -> anyhow::Result<ExitCode> {
    println!("{}", response.to_json()?);
    if response.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn frame_reader(
    input: Option<&Path>,
) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

/// One JSON-lines record. Blank lines are skipped; malformed ones are logged.
fn parse_frame(line_no: usize, line: &str) -> Option<TrackerFrame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("Skipping frame on line {}: {}", line_no, e);
            None
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn handle_practice(
    config: &Config,
    library: &TemplateLibrary,
    cmd: PracticeCommand,
) -> anyhow::Result<ExitCode> {
    let template = library.require(&cmd.gesture)?.clone();
    let settings = TriggerSettings::from_config(&config.capture, &config.classifier);
    let mut session = PracticeSession::new(template, Matcher::from_config(config), settings);

    if !cmd.frames.json {
        println!(
            "Practicing {}: {}",
            session.template().display_name(),
            session.template().description
        );
    }

    let mut lines = frame_reader(cmd.frames.input.as_deref()).await?.lines();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await.context("failed to read frames")? {
        line_no += 1;
        let Some(frame) = parse_frame(line_no, &line) else {
            continue;
        };
        let Some(event) = session.handle(&frame) else {
            continue;
        };

        if cmd.frames.json {
            print_json(&event)?;
            continue;
        }
        match event {
            PracticeEvent::Started => println!("Recording..."),
            PracticeEvent::HandsLost => println!("Hands lost, attempt discarded"),
            PracticeEvent::Attempt(outcome) if outcome.is_success() => {
                println!("  ok    {}", outcome.message());
            }
            PracticeEvent::Attempt(outcome) => println!("  miss  {}", outcome.message()),
        }
    }

    let stats = session.stats();
    if cmd.frames.json {
        print_json(&serde_json::json!({
            "event": "summary",
            "gesture": session.template().pose_label,
            "correct": stats.correct,
            "wrong": stats.wrong,
            "accuracy_percent": stats.accuracy_percent(),
        }))?;
    } else {
        println!();
        println!(
            "Correct: {}  Wrong: {}  Accuracy: {}%",
            stats.correct,
            stats.wrong,
            stats.accuracy_percent()
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_capture(
    config: &Config,
    library: TemplateLibrary,
    cmd: CaptureCommand,
) -> anyhow::Result<ExitCode> {
    let label = library
        .get(&cmd.gesture)
        .map_or_else(|| normalize_label(&cmd.gesture), |t| t.pose_label.clone());
    if label.is_empty() || cmd.admin.trim().is_empty() {
        anyhow::bail!("gesture and admin id are required");
    }
    let gesture_name = display_name(&label);

    let services = Services::open(config, library)?;
    let summary = services.lifecycle.statuses(&cmd.admin)?;
    if !summary.can_customize {
        anyhow::bail!(
            "admin {} has gestures pending approval; customization is disabled",
            cmd.admin
        );
    }

    let uploader = Arc::new(CsvUploader::new(config.pipeline_dir())?);
    let aggregator = Arc::new(
        SampleAggregator::new(
            cmd.admin.as_str(),
            gesture_name.as_str(),
            config.capture.sample_quota,
            uploader,
        )
        .with_sink(Arc::new(services.lifecycle.clone())),
    );
    let settings = TriggerSettings::from_config(&config.capture, &config.classifier);
    let mut session = CaptureSession::new(label, settings, Arc::clone(&aggregator));

    if !cmd.frames.json {
        println!(
            "Recording {} samples of {} for admin {}",
            aggregator.quota(),
            gesture_name,
            cmd.admin
        );
    }

    let mut lines = frame_reader(cmd.frames.input.as_deref()).await?.lines();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await.context("failed to read frames")? {
        line_no += 1;
        let Some(frame) = parse_frame(line_no, &line) else {
            continue;
        };
        if let Some(event) = session.handle(&frame).await {
            if cmd.frames.json {
                print_json(&event)?;
            } else {
                print_capture_event(&event);
            }
        }
        if session.is_closed() {
            break;
        }
    }

    // Frames ran out after a failed upload: one last attempt.
    if !aggregator.is_complete() && aggregator.collected() >= aggregator.quota() {
        let outcome = aggregator.retry_upload().await;
        if cmd.frames.json {
            print_json(&outcome)?;
        } else {
            print_outcome(&outcome);
        }
    }

    if aggregator.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "Collected {}/{} samples; nothing was uploaded",
            aggregator.collected(),
            aggregator.quota()
        );
        Ok(ExitCode::FAILURE)
    }
}

fn print_capture_event(event: &CaptureEvent) {
    match event {
        CaptureEvent::Started => println!("Recording..."),
        CaptureEvent::HandsLost => println!("Hands lost, sample discarded"),
        CaptureEvent::TooShort { frames, required } => {
            println!("Too short ({frames} of {required} frames), try again");
        }
        CaptureEvent::Sample { sample, outcome } => {
            println!(
                "  sample {}  dx={:+.3} dy={:+.3}",
                sample.instance_id, sample.delta_x, sample.delta_y
            );
            print_outcome(outcome);
        }
    }
}

fn print_outcome(outcome: &AggregateOutcome) {
    match outcome {
        AggregateOutcome::Collected { count, quota } => println!("  collected {count}/{quota}"),
        AggregateOutcome::Uploaded(receipt) => {
            println!("Uploaded {} rows", receipt.rows);
            println!("  raw:    {}", receipt.raw_file.display());
            println!("  master: {}", receipt.master_file.display());
        }
        AggregateOutcome::UploadFailed { message } => println!("  upload failed: {message}"),
        AggregateOutcome::UploadInFlight => println!("  upload already running"),
        AggregateOutcome::Closed => println!("  session closed"),
    }
}

fn handle_templates(library: &TemplateLibrary, json: bool) -> anyhow::Result<ExitCode> {
    if json {
        let templates: Vec<_> = library.iter().collect();
        println!("{}", serde_json::to_string_pretty(&templates)?);
    } else {
        println!("{:<12} {:<8} {:<10} Description", "Gesture", "Motion", "Fingers");
        for template in library.iter() {
            let motion = template
                .expected_direction()
                .map_or_else(|| "static".to_string(), |d| d.to_string());
            println!(
                "{:<12} {:<8} {:<10} {}",
                template.pose_label,
                motion,
                template.fingers.to_string(),
                template.description
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_requests(lifecycle: &Lifecycle, cmd: RequestsCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        RequestsCommand::List { actor } => emit(&ApiResponse::from_result(
            lifecycle.entries(&actor.admin_id),
            "Gesture requests retrieved",
            "Failed to retrieve gesture requests",
        )),
        RequestsCommand::Status { actor } => emit(&ApiResponse::from_result(
            lifecycle.statuses(&actor.admin_id),
            "Gesture request statuses retrieved",
            "Failed to retrieve gesture request statuses",
        )),
        RequestsCommand::Customize {
            actor,
            gesture,
            name,
        } => {
            let name = name.unwrap_or_else(|| display_name(&normalize_label(&gesture)));
            emit(&ApiResponse::from_result(
                lifecycle.create_or_update(&actor.admin_id, &gesture, &name),
                "Gesture request created/updated",
                "Failed to create/update gesture request",
            ))
        }
        RequestsCommand::Submit { actor } => emit(&ApiResponse::from_result(
            lifecycle.submit_for_approval(&actor.admin_id),
            "Gesture requests submitted for approval",
            "Failed to submit gesture requests",
        )),
        RequestsCommand::DeleteCustomed { actor } => emit(&ApiResponse::from_result(
            lifecycle.delete_all_customed(&actor.admin_id),
            "Customed gestures deleted",
            "Failed to delete customed gestures",
        )),
        RequestsCommand::Approve { actor, admin } => emit(&ApiResponse::from_result(
            lifecycle.approve_requests(&Actor::from(&actor), &admin),
            "Gesture requests approved",
            "Failed to approve gesture requests",
        )),
        RequestsCommand::Reject { actor, admin } => emit(&ApiResponse::from_result(
            lifecycle.reject_requests(&Actor::from(&actor), &admin),
            "Gesture requests rejected",
            "Failed to reject gesture requests",
        )),
        RequestsCommand::Reset { actor, admin } => emit(&ApiResponse::from_result(
            lifecycle.reset_all_to_active(&Actor::from(&actor), admin.as_deref()),
            "All gestures reset to ready",
            "Failed to reset gestures",
        )),
    }
}

async fn handle_batch(approval: &ApprovalPipeline, cmd: BatchCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        BatchCommand::Submit { actor, gestures } => emit(&ApiResponse::from_result(
            approval.submit(&Actor::from(&actor), Some(gestures)),
            "Customization submitted for approval",
            "Failed to submit customization",
        )),
        BatchCommand::List { actor, status } => emit(&ApiResponse::from_result(
            approval.list(&Actor::from(&actor), status.map(Into::into)),
            "Customization requests retrieved",
            "Failed to retrieve customization requests",
        )),
        BatchCommand::Status { actor } => emit(&ApiResponse::from_result(
            approval.status(&actor.admin_id),
            "Customization status retrieved",
            "Failed to retrieve customization status",
        )),
        BatchCommand::Approve { actor, id } => emit(&ApiResponse::from_result(
            approval.approve(&Actor::from(&actor), id).await,
            "Customization request approved and processed",
            "Failed to process customization request",
        )),
        BatchCommand::Reject { actor, id, reason } => emit(&ApiResponse::from_result(
            approval.reject(&Actor::from(&actor), id, reason.as_deref()),
            "Customization request rejected",
            "Failed to reject customization request",
        )),
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Capture]");
                println!("  Trigger hand:       {}", config.capture.trigger_hand);
                println!("  Mirrored:           {}", config.capture.mirrored);
                println!("  Min frames:         {}", config.capture.min_frames);
                println!("  Sample quota:       {}", config.capture.sample_quota);
                println!();
                println!("[Matcher]");
                println!("  Static hold (ms):   {}", config.matcher.static_hold_ms);
                println!(
                    "  Min agreement:      {}%",
                    config.matcher.min_agreement_percent
                );
                println!("  Max drift:          {}", config.matcher.max_drift);
                println!("  Min travel:         {}", config.matcher.min_travel);
                println!();
                println!("[Pipeline]");
                println!("  Directory:          {}", config.pipeline_dir().display());
                println!("  Python:             {}", config.pipeline.python_bin);
                println!("  Script:             {}", config.pipeline.script);
                println!(
                    "  Artifact:           {}",
                    config.pipeline.artifact.display()
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.validate()) {
                Ok(()) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
