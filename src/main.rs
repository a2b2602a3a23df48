//! Kitchen Sandbox CLI
//!
//! Builds a sandbox for one instance and prints its location.

use std::path::PathBuf;

use kitchen_sandbox::{CancelFlag, SandboxBuilder, SandboxConfig, Validate};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let keep = args.iter().skip(1).any(|a| a == "--keep");
    let config_path = args.iter().skip(1).find(|a| !a.starts_with("--"));

    let Some(config_path) = config_path else {
        eprintln!("Usage: {} <config.yml|config.toml> [--keep]", args[0]);
        eprintln!("\nAssembles a Chef sandbox for the configured instance.");
        eprintln!("\nOptions:");
        eprintln!("  --keep  Leave the sandbox on disk and print its path");
        std::process::exit(1);
    };

    let config = match SandboxConfig::load(PathBuf::from(config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let validation = config.validate();
    for warning in &validation.warnings {
        tracing::warn!(%warning, "config warning");
    }
    if let Err(e) = validation.into_result() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    let cancel = CancelFlag::new();
    let builder = SandboxBuilder::from_config(&config).with_cancel_flag(cancel.clone());

    tracing::info!(instance = %config.instance, "building sandbox");
    let mut task = tokio::task::spawn_blocking(move || builder.create());

    let finished = tokio::select! {
        res = &mut task => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };
    let joined = match finished {
        Some(res) => res,
        None => {
            // The blocking build stops at its next step and removes the partial sandbox.
            tracing::warn!("interrupt received, cancelling sandbox build");
            cancel.cancel();
            task.await
        }
    };

    let mut sandbox = match joined {
        Ok(Ok(sandbox)) => sandbox,
        Ok(Err(e)) => {
            eprintln!("Sandbox build failed: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Sandbox build task failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("Sandbox: {}", sandbox.path().display());
    println!("Cookbooks: {} ({})", sandbox.cookbooks_path().display(), sandbox.strategy());
    if let Some(cmd) = config.install_command() {
        println!("\nInstall command:\n{}", cmd);
    }

    if keep {
        let path = sandbox.keep();
        tracing::info!(path = ?path, "keeping sandbox");
    } else if let Err(e) = sandbox.destroy() {
        eprintln!("Failed to remove sandbox: {}", e);
        std::process::exit(1);
    }
}
