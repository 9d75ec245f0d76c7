//! Gallery Thumbnailer - on-demand thumbnails with a durable cache.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gallery_thumbnailer::{
    config::{CheckConfig, Cli, Command, ServeConfig, StorageBackend, StorageConfig, SweepConfig},
    create_router, create_s3_client, ArtifactLifecycleManager, AppState, CacheStore,
    CollectionRef, LocalFsStore, OriginalProvider, RouterConfig, S3Store, StoreCatalog,
    ThumbnailGenerator, ThumbnailService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
        Command::Sweep(config) => run_sweep(config).await,
    }
}

/// Open the configured store and hand it to `$run`.
///
/// The store type differs per backend, so each arm monomorphizes `$run`.
macro_rules! with_store {
    ($storage:expr, |$store:ident| $run:expr) => {
        match $storage.storage {
            StorageBackend::Local => {
                let root = $storage.media_root.clone().unwrap_or_default();
                let $store = LocalFsStore::new(root);
                $run
            }
            StorageBackend::S3 => {
                let client =
                    create_s3_client($storage.s3_endpoint.as_deref(), &$storage.s3_region).await;
                let bucket = $storage.s3_bucket.clone().unwrap_or_default();
                let $store = S3Store::new(client, bucket, $storage.s3_prefix.clone());
                $run
            }
        }
    };
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    with_store!(config.storage, |store| serve(store, &config).await)
}

async fn serve<S: CacheStore + 'static>(store: S, config: &ServeConfig) -> ExitCode {
    let layout = config.storage.layout();

    info!("Gallery Thumbnailer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Storage: {}", store.identifier());
    info!(
        "  Layout: {}/<collection>/{}/",
        layout.galleries_dir(),
        layout.thumbnails_dir()
    );
    info!("  JPEG quality: {}", config.jpeg_quality);
    match config.generation_timeout() {
        Some(timeout) => info!("  Generation timeout: {}s", timeout.as_secs()),
        None => info!("  Generation timeout: none"),
    }
    info!("  Cache: {} original records", config.cache_originals);

    // Fail early on an unreachable store
    if let Err(e) = store.check_access().await {
        error!("Failed to access storage {}: {}", store.identifier(), e);
        return ExitCode::FAILURE;
    }

    let store = Arc::new(store);
    let service = ThumbnailService::with_shared_store(Arc::clone(&store))
        .with_layout(layout.clone())
        .with_generator(ThumbnailGenerator::with_quality(config.jpeg_quality))
        .with_timeout(config.generation_timeout());
    let catalog = StoreCatalog::with_capacity(Arc::clone(&store), layout.clone(), config.cache_originals);
    let lifecycle = ArtifactLifecycleManager::new(store, layout);

    let state = AppState::new(Arc::new(service), Arc::new(catalog), Arc::new(lifecycle));
    let router = create_router(state, build_router_config(config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl -O http://{}/images/400x0/<collection>/<image>", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "gallery_thumbnailer=debug,tower_http=debug"
    } else {
        "gallery_thumbnailer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Gallery Thumbnailer Configuration Check");
    println!("═══════════════════════════════════════");
    println!();

    if let Err(e) = config.storage.validate() {
        println!("✗ Storage: {}", e);
        return ExitCode::FAILURE;
    }

    with_store!(config.storage, |store| check(store, &config).await)
}

async fn check<S: CacheStore + 'static>(store: S, config: &CheckConfig) -> ExitCode {
    let layout = config.storage.layout();
    println!("✓ Storage: {}", store.identifier());
    println!(
        "✓ Layout: {}/<collection>/{}/",
        layout.galleries_dir(),
        layout.thumbnails_dir()
    );
    println!();

    print!("Listing {} ... ", layout.galleries_prefix());
    let keys = match store.list(&layout.galleries_prefix()).await {
        Ok(keys) => {
            println!("✓ success");
            keys
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            match config.storage.storage {
                StorageBackend::Local => {
                    println!("  - The media root exists and is readable");
                }
                StorageBackend::S3 => {
                    println!("  - Your AWS credentials are configured correctly");
                    println!("  - The bucket exists and is accessible");
                    if config.storage.s3_endpoint.is_some() {
                        println!("  - The S3 endpoint is correct and reachable");
                    }
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let thumbnails = keys
        .iter()
        .filter(|key| layout.original_of(key).is_some())
        .count();
    println!("  Originals: {}", keys.len() - thumbnails);
    println!("  Thumbnails: {}", thumbnails);

    if let Some(parts) = config.test_image_parts() {
        let (collection, filename) = match parts {
            Ok(parts) => parts,
            Err(e) => {
                println!("✗ {}", e);
                return ExitCode::FAILURE;
            }
        };

        println!();
        print!("Testing image '{}/{}' ... ", collection, filename);

        let catalog = StoreCatalog::new(Arc::new(store), layout);
        let result = match CollectionRef::new(collection) {
            Ok(collection) => catalog.get_original(&collection, filename).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(original) => {
                println!("✓ found");
                println!("  Path: {}", original.path());
                println!("  Size: {}x{}", original.width(), original.height());
            }
            Err(e) => {
                println!("✗ failed");
                println!();
                println!("  {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("═══════════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}

// =============================================================================
// Sweep Command
// =============================================================================

async fn run_sweep(config: SweepConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.storage.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    with_store!(config.storage, |store| sweep(store, &config.storage, config.dry_run).await)
}

async fn sweep<S: CacheStore + 'static>(store: S, storage: &StorageConfig, dry_run: bool) -> ExitCode {
    let manager = ArtifactLifecycleManager::new(Arc::new(store), storage.layout());

    match manager.sweep(dry_run).await {
        Ok(report) => {
            for key in &report.orphaned {
                println!("{}", key);
            }
            info!(
                "Scanned {} thumbnails, {} orphaned, {} removed",
                report.scanned,
                report.orphaned.len(),
                report.removed
            );
            if report.failures > 0 {
                error!("{} orphaned thumbnails could not be removed", report.failures);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sweep failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
