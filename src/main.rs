use std::{future::IntoFuture, process, sync::Arc};

use finwage_site::{
    application::{
        error::AppError,
        migrations::{MigrationSet, Migrator},
        repos::{CollectionRules, RecordStore},
        seed::{SeedFile, Seeder},
    },
    cache::{CacheConfig, RevalidationTrigger, TagRegistry},
    config::{self, MigrationsCommand, RevalidateCommand},
    infra::{
        error::InfraError,
        http::{self, RouterState},
        pocketbase::PocketBaseClient,
        revalidate_client::RevalidateClient,
        telemetry,
    },
};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrations(args) => run_migrations(settings, args.command).await,
        config::Command::Seed(args) => run_seed(settings, args).await,
        config::Command::Revalidate(args) => run_revalidate(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let backend = Arc::new(PocketBaseClient::new(&settings.backend)?);
    let cache = CacheConfig::from(&settings.cache);
    let state = RouterState::assemble(
        backend,
        &cache,
        settings.backend.per_page.get(),
        settings.revalidation.clone(),
    );
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        addr = %settings.server.addr,
        backend = %settings.backend.url,
        cache_enabled = cache.is_enabled(),
        "Serving finwage-site"
    );

    let shutdown = Arc::new(Notify::new());
    let signalled = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received; draining connections");
            signalled.notify_waiters();
        },
    );
    let grace = settings.server.graceful_shutdown;
    let deadline = async {
        shutdown.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => result.map_err(InfraError::from)?,
        () = deadline => warn!(
            grace_secs = grace.as_secs(),
            "Graceful shutdown timed out; dropping open connections"
        ),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn run_migrations(
    settings: config::Settings,
    command: MigrationsCommand,
) -> Result<(), AppError> {
    let backend = Arc::new(PocketBaseClient::new(&settings.backend)?);
    let records: Arc<dyn RecordStore> = backend.clone();
    let rules: Arc<dyn CollectionRules> = backend;
    let migrator = Migrator::new(
        records,
        rules,
        settings.migrations.ledger_collection.clone(),
        MigrationSet::embedded()?,
    );

    match command {
        MigrationsCommand::Status => {
            for status in migrator.status().await? {
                let state = if status.applied { "applied" } else { "pending" };
                println!("{:>12}  {:<8}  {}", status.version, state, status.name);
            }
        }
        MigrationsCommand::Up(args) => {
            let applied = migrator.up(args.to).await?;
            println!("applied {} migration(s)", applied.len());
        }
        MigrationsCommand::Down(args) => {
            if args.steps == 0 {
                return Err(AppError::validation("--steps must be at least 1"));
            }
            let reverted = migrator.down(args.steps).await?;
            println!("reverted {} migration(s)", reverted.len());
        }
    }
    Ok(())
}

/// Seeds through the backend, then revalidates the running server over HTTP.
async fn run_seed(settings: config::Settings, args: config::SeedArgs) -> Result<(), AppError> {
    let file = SeedFile::read(&args.file).await?;
    let backend = Arc::new(PocketBaseClient::new(&settings.backend)?);

    let cache = CacheConfig::from(&settings.cache);
    let server = Arc::new(RevalidateClient::new(
        &settings.self_url(),
        settings.revalidation.api_key.clone(),
        settings.revalidation.cron_secret.clone(),
    )?);
    let trigger = Arc::new(RevalidationTrigger::new(server, &cache));
    let registry = Arc::new(TagRegistry::new(cache.durations));

    let report = Seeder::new(backend, registry, trigger).seed(&file).await?;
    for (collection, created) in &report.created {
        println!("{collection}: {created}");
    }
    println!("seeded {} record(s)", report.total());
    if !report.revalidation.is_clean() {
        warn!(
            failed = ?report.revalidation.failed,
            "Server cache was not fully revalidated; run `revalidate all` once it is reachable"
        );
    }
    Ok(())
}

async fn run_revalidate(
    settings: config::Settings,
    args: config::RevalidateArgs,
) -> Result<(), AppError> {
    let server_url = args.server_url.unwrap_or_else(|| settings.self_url());
    let client = RevalidateClient::new(
        &server_url,
        settings.revalidation.api_key.clone(),
        settings.revalidation.cron_secret.clone(),
    )?;

    match args.command {
        RevalidateCommand::Tag { tags } => print_json(&client.tags(&tags).await?),
        RevalidateCommand::Path { paths } => print_json(&client.paths(&paths).await?),
        RevalidateCommand::All => print_json(&client.all().await?),
        RevalidateCommand::Frequency { frequency } => {
            print_json(&client.frequency(frequency).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render response: {err}")))?;
    println!("{rendered}");
    Ok(())
}
