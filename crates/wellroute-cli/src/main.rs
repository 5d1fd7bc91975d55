use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wellroute_core::agents::register_standard_agents;
use wellroute_core::collections::InMemoryCollectionStore;
use wellroute_core::{Classifier, Router, ScopeGuard};
use wellroute_tools::{HttpBackendClient, InvocationProxy};
use wellroute_types::config::WellrouteConfig;
use wellroute_types::config_loader::ConfigLoader;
use wellroute_types::errors::RouterError;
use wellroute_types::model::{AgentOverride, ConversationTurn, SessionContext, TurnRole};
use wellroute_types::traits::CollectionStore;

#[derive(Parser, Debug)]
#[command(name = "wellroute", version, about = "Conversational request router for well-data agents")]
struct Cli {
    /// Config directory (router.yaml, optional rules.yaml and collections/). Built-in defaults if unset.
    #[arg(long, env = "WELLROUTE_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a message without dispatching it
    Classify {
        message: String,
    },
    /// Route a message end to end and print the response envelope
    Route {
        message: String,
        /// Explicit agent: an intent name (e.g. "calculate_porosity") or "auto"
        #[arg(long)]
        agent: Option<String>,
        /// Session id used to look up the active collection
        #[arg(long)]
        session: Option<String>,
        /// Prior turn, oldest first. Prefix with "assistant:" for assistant turns.
        #[arg(long = "history")]
        history: Vec<String>,
    },
    /// Run the existence/permission check against every configured backend
    CheckBackends,
}

fn exit_error(err: &RouterError) -> ! {
    let mut body = json!({
        "error": err.kind(),
        "message": err.to_string(),
    });
    if let Some(step) = err.remediation() {
        body["remediation"] = json!(step);
    }
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
    );
    std::process::exit(1);
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wellroute=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let result = match load_config(cli.config_dir.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Classify { message } => classify(&config, &message),
            Commands::Route {
                message,
                agent,
                session,
                history,
            } => route(&config, &message, agent, session.as_deref(), &history).await,
            Commands::CheckBackends => check_backends(&config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        exit_error(&e);
    }
}

fn load_config(dir: Option<&Path>) -> Result<WellrouteConfig, RouterError> {
    match dir {
        Some(dir) => ConfigLoader::load(dir),
        None => {
            tracing::debug!("no config directory given, using built-in defaults");
            Ok(WellrouteConfig::default())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), RouterError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_router(config: &WellrouteConfig) -> Result<(Router, Arc<InvocationProxy>), RouterError> {
    let client = Arc::new(HttpBackendClient::new(&config.router)?);
    let proxy = Arc::new(InvocationProxy::new(client));
    let mut router = Router::new(
        Classifier::from_config(config)?,
        ScopeGuard::from_config(&config.router.scope),
    );
    register_standard_agents(&mut router, proxy.clone())?;
    Ok((router, proxy))
}

fn classify(config: &WellrouteConfig, message: &str) -> Result<(), RouterError> {
    let classifier = Classifier::from_config(config)?;
    print_json(&classifier.classify(message, None))
}

async fn route(
    config: &WellrouteConfig,
    message: &str,
    agent: Option<String>,
    session: Option<&str>,
    history: &[String],
) -> Result<(), RouterError> {
    let (router, _proxy) = build_router(config)?;

    let explicit_agent_override = agent
        .map(AgentOverride::try_from)
        .transpose()
        .map_err(|e| RouterError::Config(format!("--agent: {e}")))?;

    let active_collection = match session {
        Some(session) => {
            let store = InMemoryCollectionStore::from_seeds(&config.collections);
            store.get_active_collection(session).await?
        }
        None => None,
    };

    let context = SessionContext {
        explicit_agent_override,
        active_collection,
    };
    let turns: Vec<ConversationTurn> = history.iter().map(String::as_str).map(parse_turn).collect();

    let response = router.route(message, &turns, Some(&context)).await;
    print_json(&response)
}

async fn check_backends(config: &WellrouteConfig) -> Result<(), RouterError> {
    let (_router, proxy) = build_router(config)?;

    let mut report = Vec::new();
    let mut failures = 0;
    for backend in config.router.backends.keys() {
        match proxy.validate(backend).await {
            Ok(state) => report.push(json!({
                "backend": backend,
                "ok": true,
                "functionArn": state.function_arn,
            })),
            Err(err) => {
                failures += 1;
                report.push(json!({
                    "backend": backend,
                    "ok": false,
                    "error": err.kind(),
                    "message": err.to_string(),
                    "remediation": err.remediation(),
                }));
            }
        }
    }

    print_json(&report)?;
    if failures > 0 {
        return Err(RouterError::Internal(format!(
            "{failures} of {} backends failed validation",
            report.len()
        )));
    }
    Ok(())
}

/// `"assistant: ..."` is an assistant turn, `"user: ..."` or anything else a user turn.
fn parse_turn(raw: &str) -> ConversationTurn {
    let trimmed = raw.trim();
    for (prefix, role) in [("assistant:", TurnRole::Assistant), ("user:", TurnRole::User)] {
        let matches = trimmed
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            return ConversationTurn {
                role,
                content: trimmed[prefix.len()..].trim().to_string(),
            };
        }
    }
    ConversationTurn::user(trimmed)
}
