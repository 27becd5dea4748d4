/*!
 * Cyber range operator CLI
 *
 * Drives the same orchestrator as the HTTP server, for instructors and
 * operators working from a shell: catalog maintenance, launching and ending
 * sessions on behalf of a user, and backend health checks.
 */

use clap::{Parser, Subcommand};
use cyberrange::{
    cli_style::{
        self, describe_cleanup, describe_start, print_error, print_info, print_success,
        print_warning, Theme,
    },
    config::RangeConfig,
    error::{RangeError, Result, EXIT_BACKEND, EXIT_SUCCESS},
    logging, DefineScenario, Difficulty, Gns3Client, Orchestrator, Requester, Store,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cyberrange")]
#[command(version, about = "Provision per-user network labs on a GNS3 server", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults to ./cyberrange.toml when present
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the scenario catalog
    Scenarios,

    /// Add a scenario to the catalog
    DefineScenario {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// beginner, intermediate or advanced
        #[arg(long, default_value = "beginner")]
        difficulty: Difficulty,

        /// Existing backend project to use as template; created when omitted
        #[arg(long, value_name = "PROJECT_ID")]
        template: Option<String>,

        /// Recorded as the scenario's creator
        #[arg(long, default_value = "operator")]
        instructor: String,
    },

    /// List active sessions
    Sessions {
        /// Only sessions of this user id
        #[arg(long)]
        user: Option<String>,
    },

    /// Launch a scenario for a user
    Launch {
        #[arg(long)]
        user: String,

        /// Name used in the backend project; defaults to the user id
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        scenario: i64,
    },

    /// End a user's session and remove its backend project
    End {
        #[arg(long)]
        user: String,

        #[arg(long)]
        session: i64,
    },

    /// Show a session with its live node listing
    View {
        #[arg(long)]
        user: String,

        #[arg(long)]
        session: i64,
    },

    /// Check that the backend answers
    BackendCheck,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            let hint = match e.kind() {
                cyberrange::ErrorKind::BackendUnavailable => {
                    Some("Check backend.url and that the GNS3 server is running")
                }
                cyberrange::ErrorKind::Conflict => {
                    Some("End the existing session first, or open it with `view`")
                }
                _ => None,
            };
            print_error(&e.to_string(), hint);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = RangeConfig::load(cli.config.as_deref())?;
    logging::init_logging(&config.logging)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| RangeError::Config(format!("Failed to start async runtime: {}", e)))?;
    runtime.block_on(dispatch(cli, config))
}

async fn dispatch(cli: Cli, config: RangeConfig) -> Result<i32> {
    let store = Store::open(&config.database).await?;
    let backend = Arc::new(Gns3Client::new(&config.backend)?);
    let orchestrator = Orchestrator::new(&store, backend);
    let json = cli.json;

    match cli.command {
        Commands::Scenarios => {
            let scenarios = orchestrator.list_scenarios().await?;
            if json {
                print_json(&scenarios)?;
            } else if scenarios.is_empty() {
                print_info("No scenarios defined");
            } else {
                println!("{}", cli_style::scenario_table(&scenarios));
            }
        }

        Commands::DefineScenario {
            name,
            description,
            difficulty,
            template,
            instructor,
        } => {
            let scenario = orchestrator
                .define_scenario(
                    &instructor,
                    DefineScenario {
                        name,
                        description,
                        difficulty,
                        template_project_id: template,
                    },
                )
                .await?;
            if json {
                print_json(&scenario)?;
            } else {
                print_success(&format!(
                    "Scenario {} '{}' defined (template {})",
                    scenario.id, scenario.name, scenario.template_project_id
                ));
            }
        }

        Commands::Sessions { user } => {
            let sessions = match user {
                Some(user) => orchestrator.dashboard(&user).await?,
                None => orchestrator.active_sessions().await?,
            };
            if json {
                print_json(&sessions)?;
            } else if sessions.is_empty() {
                print_info("No active sessions");
            } else {
                println!("{}", cli_style::session_table(&sessions));
            }
        }

        Commands::Launch {
            user,
            username,
            scenario,
        } => {
            let username = username.unwrap_or_else(|| user.clone());
            let report = orchestrator
                .launch(&Requester::new(user, username), scenario)
                .await?;
            if json {
                print_json(&report)?;
            } else {
                let line = format!(
                    "Session {} of '{}' on project {}: {}",
                    report.session.id,
                    report.scenario.name,
                    report.session.project_id,
                    describe_start(&report.start)
                );
                if report.is_degraded() {
                    print_warning(&line);
                } else {
                    print_success(&line);
                }
            }
        }

        Commands::End { user, session } => {
            let report = orchestrator.end_session(&user, session).await?;
            if json {
                print_json(&report)?;
            } else if report.already_ended {
                print_info(&format!("Session {} had already ended", session));
            } else {
                print_success(&format!(
                    "Session {} ended: {}",
                    session,
                    describe_cleanup(&report.cleanup)
                ));
            }
            if let Some(err) = report.partial_failure() {
                return Err(err);
            }
        }

        Commands::View { user, session } => {
            let view = orchestrator.session_view(&user, session).await?;
            if json {
                print_json(&view)?;
            } else {
                println!(
                    "{} {} ({})",
                    Theme::primary(&view.scenario_name),
                    Theme::muted(format!("session {}", view.session.id)),
                    view.difficulty
                );
                if !view.scenario_description.is_empty() {
                    println!("{}", view.scenario_description);
                }
                if let Some(url) = &view.web_ui_url {
                    print_info(&format!("Web UI: {}", url));
                }
                println!("{}", cli_style::session_view_table(&view));
            }
        }

        Commands::BackendCheck => match orchestrator.backend_status().await {
            Ok(count) => {
                print_success(&format!(
                    "Backend {} reachable, {} projects",
                    config.backend.url, count
                ));
            }
            Err(err) => {
                print_error(&err.to_string(), Some("Check backend.url in the configuration"));
                return Ok(EXIT_BACKEND);
            }
        },
    }

    Ok(EXIT_SUCCESS)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| RangeError::InvalidInput(format!("Cannot serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}
