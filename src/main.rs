//! grpc-transcoder command line.
//!
//! ```text
//! grpc-transcoder serve --config gateway.toml
//! grpc-transcoder check --config gateway.toml
//! grpc-transcoder route --config gateway.toml GET '/v1/messages/123?revision=2'
//! ```
//!
//! `serve` answers every matched request with the assembled request message,
//! which makes it a rule debugger until a real invoker is plugged in through
//! the library.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;

use grpc_transcoder::config::loader::load_transcoder;
use grpc_transcoder::lifecycle::startup;
use grpc_transcoder::EchoInvoker;

#[derive(Parser)]
#[command(name = "grpc-transcoder")]
#[command(about = "HTTP/JSON to RPC transcoding gateway", long_about = None)]
struct Cli {
    /// Gateway configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Serve,
    /// Load the configuration and compile every rule
    Check,
    /// Show how one request would be transcoded
    Route {
        /// HTTP method
        method: String,
        /// Request target, optionally with a query string
        target: String,
        /// Request body
        #[arg(short, long, default_value = "")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => startup::serve(&cli.config, EchoInvoker)
            .await
            .map_err(|e| e.to_string()),
        Commands::Check => check(&cli.config),
        Commands::Route {
            method,
            target,
            body,
        } => route(&cli.config, &method, &target, &body),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn check(path: &Path) -> Result<(), String> {
    let (_, transcoder) = load_transcoder(path).map_err(|e| e.to_string())?;
    for rule in transcoder.registry().rules() {
        for binding in rule.bindings() {
            println!("{:<8} {:<48} {}", binding.verb, binding.template.to_string(), rule.selector());
        }
    }
    println!(
        "OK: {} rules, {} messages",
        transcoder.registry().len(),
        transcoder.pool().message_count()
    );
    Ok(())
}

fn route(config: &Path, method: &str, target: &str, body: &str) -> Result<(), String> {
    let (_, transcoder) = load_transcoder(config).map_err(|e| e.to_string())?;
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    let route = transcoder.route(method, path).map_err(|e| e.to_string())?;
    let request = transcoder
        .assemble(&route, query, body.as_bytes())
        .map_err(|e| e.to_string())?;
    let variables: serde_json::Map<String, serde_json::Value> = route
        .variables
        .iter()
        .map(|capture| (capture.field_path.to_string(), json!(capture.value)))
        .collect();

    let report = json!({
        "selector": request.selector,
        "binding": route.binding_index,
        "input_type": request.input_type,
        "variables": variables,
        "message": request.message,
    });
    let text = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
