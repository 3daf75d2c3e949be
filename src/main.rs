mod cli;
mod error;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use exn::ResultExt;
use strand_cache::Database;
use strand_config::{Config, ProjectConfig};
use strand_source::{MemorySource, SourceHandle};
use strand_storage::backend::LocalBackend;
use strand_workflow::{Commit, CommitRequest, Context, ImportOptions};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CommitCommand};
use crate::error::{ErrorKind, Result};

const LOG_ENV: &str = "STRAND_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::builder()
        .with_default_directive(cli.level().into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(parent) = config.database.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Startup("database directory"))?;
    }
    let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Startup("database"))?;
    let root = std::path::absolute(&config.artifacts).or_raise(|| ErrorKind::Startup("artifact storage"))?;
    let artifacts = LocalBackend::new("artifacts", root).or_raise(|| ErrorKind::Startup("artifact storage"))?;

    let mut builder =
        Context::builder(db.repository(), Arc::new(artifacts)).concurrency(config.workers.concurrency);
    for (name, project) in &config.projects {
        builder = builder.project(name.clone(), project.clone(), open_source(name, project)?);
    }
    let ctx = builder.build().await.or_raise(|| ErrorKind::Workflow)?;

    let result = match cli.command {
        Command::Commit(command) => commit(&ctx, command).await,
    };
    // Background imports and recalculations finish before the process exits.
    ctx.settle().await;
    db.close().await;
    result
}

#[cfg(feature = "git")]
fn open_source(name: &str, project: &ProjectConfig) -> Result<SourceHandle> {
    match &project.repository {
        Some(path) => {
            let source = strand_source::GitSource::open(path).or_raise(|| ErrorKind::Source(name.to_string()))?;
            Ok(Arc::new(source))
        }
        None => {
            tracing::warn!(project = name, "No repository configured; revisions will not resolve");
            Ok(Arc::new(MemorySource::new()))
        }
    }
}

#[cfg(not(feature = "git"))]
fn open_source(name: &str, project: &ProjectConfig) -> Result<SourceHandle> {
    if project.repository.is_some() {
        tracing::warn!(project = name, "Built without git support; ignoring repository");
    }
    Ok(Arc::new(MemorySource::new()))
}

async fn commit(ctx: &Context, command: CommitCommand) -> Result<()> {
    match command {
        CommitCommand::Create(args) => {
            let request = CommitRequest {
                project: args.target.project,
                revision: args.target.revision,
                message: args.message,
                committed_at: args.committed_at,
                priority: args.priority,
                due_date: args.due,
                description: args.description,
                skip_import: args.skip_import,
            };
            let commit = strand_workflow::create_commit(ctx, request).await.or_raise(|| ErrorKind::Workflow)?;
            println!("Created commit {} ({})", commit.revision, commit.id);
        }
        CommitCommand::Import(args) => {
            let commit = find(ctx, &args.target).await?;
            let options = ImportOptions {
                locale: args.locale,
                inline: args.inline,
                force: args.force,
            };
            let summary =
                strand_workflow::import_strings(ctx, commit.id, options).await.or_raise(|| ErrorKind::Workflow)?;
            println!(
                "Walked {} blobs: {} scheduled, {} inline, {} reused, {} failed",
                summary.blobs, summary.scheduled, summary.inline, summary.reused, summary.failed
            );
        }
        CommitCommand::Status(target) => {
            let commit = find(ctx, &target).await?;
            print_status(&commit);
        }
        CommitCommand::ClearWorkers(target) => {
            let commit = find(ctx, &target).await?;
            let change = strand_workflow::clear_workers(ctx, commit.id).await.or_raise(|| ErrorKind::Workflow)?;
            println!("Cleared workers of {} (was loading: {})", commit.revision, change.drained);
        }
        CommitCommand::Recalculate { target, force } => {
            let commit = find(ctx, &target).await?;
            let recalculation =
                strand_workflow::recalculate(ctx, commit.id, force).await.or_raise(|| ErrorKind::Workflow)?;
            print_status(&recalculation.commit);
        }
        CommitCommand::Localized { target, locale } => {
            let commit = find(ctx, &target).await?;
            let localized =
                strand_workflow::is_localized(ctx, commit.id, &locale).await.or_raise(|| ErrorKind::Workflow)?;
            if !localized {
                exn::bail!(ErrorKind::NotLocalized(locale));
            }
            println!("{} is localized into {locale}", commit.revision);
        }
    }
    Ok(())
}

async fn find(ctx: &Context, target: &cli::Target) -> Result<Commit> {
    strand_workflow::find_commit(ctx, &target.project, &target.revision).await.or_raise(|| ErrorKind::Workflow)
}

fn print_status(commit: &Commit) {
    let stats = &commit.stats;
    println!("{} {}", commit.revision, commit.message);
    println!("  loading: {}  ready: {}", commit.loading, commit.ready);
    println!(
        "  translations: {} total, {} done, {} new, {} pending",
        stats.translations_total, stats.translations_done, stats.translations_new, stats.translations_pending
    );
    println!("  words: {} new, {} pending", stats.words_new, stats.words_pending);
}
