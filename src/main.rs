use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use dotenv::dotenv;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use foundry_agent::api::AgentsApi;
use foundry_agent::client::ProjectClient;
use foundry_agent::config::{ProjectConfig, RealEnvironment};
use foundry_agent::configure::{
    configure_agent, load_function_tools, send_email_tool, AgentSettings, SEND_EMAIL_TOOL,
};
use foundry_agent::credential::DefaultCredential;
use foundry_agent::models::agent::Agent;
use foundry_agent::prompt_template::{
    load_prompt, load_prompt_file, InstructionContext, LEAD_REQUEST_MESSAGE,
    SALES_EMAIL_INSTRUCTIONS,
};
use foundry_agent::session::{prepare, Session};
use foundry_agent::sink::ConsoleSink;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agent to work with (can also be set via AGENT_ID environment variable)
    #[arg(long, global = true)]
    agent_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the agent's configuration, then run one streamed session
    Run {
        #[command(flatten)]
        agent: AgentArgs,

        /// Message to send (defaults to the sample lead request)
        #[arg(short, long, conflicts_with = "message_file")]
        message: Option<String>,

        /// Read the message to send from a file
        #[arg(long)]
        message_file: Option<PathBuf>,

        /// Keep the agent's current configuration
        #[arg(long)]
        skip_configure: bool,
    },

    /// Replace the agent's model, instructions and tools
    Configure {
        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Print the agent's current configuration
    Show,
}

#[derive(Args)]
struct AgentArgs {
    /// Model to use (can also be set via AGENT_MODEL environment variable)
    #[arg(short, long)]
    model: Option<String>,

    /// Instruction template file (defaults to the built-in sales email instructions)
    #[arg(long)]
    instructions: Option<PathBuf>,

    /// JSON file with additional queue-bound function tools
    #[arg(long)]
    tools: Option<PathBuf>,

    /// Storage queue service for the email tool (can also be set via QUEUE_SERVICE_URI)
    #[arg(long)]
    queue_service_uri: Option<String>,

    /// Event whose announcements the research should focus on
    #[arg(long)]
    conference: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (config, client) = prepare(&RealEnvironment, |config| {
        let credential = DefaultCredential::from_environment(&RealEnvironment)?;
        ProjectClient::from_connection_string(&config.connection_string, Arc::new(credential))
    })
    .context("Failed to load project configuration")?;

    client
        .resolve_credential()
        .await
        .context("Failed to resolve Azure credential")?;

    let agent_id = cli
        .agent_id
        .or_else(|| config.agent_id.clone())
        .context("Agent id must be provided via --agent-id or AGENT_ID environment variable")?;

    match cli.command {
        Command::Run {
            agent,
            message,
            message_file,
            skip_configure,
        } => {
            if !skip_configure {
                configure(&client, &config, &agent_id, &agent).await?;
            }

            let content = match (message, message_file) {
                (Some(message), _) => message,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read message from {}", path.display()))?,
                (None, None) => LEAD_REQUEST_MESSAGE.to_string(),
            };

            let mut sink = ConsoleSink::stdout();
            let status = Session::new(&client, &agent_id)
                .run(&content, &mut sink)
                .await
                .context("Session stream failed")?;

            if let Some(status) = status {
                println!("{} {}", style("Run finished:").dim(), status);
            }
        }
        Command::Configure { agent } => {
            configure(&client, &config, &agent_id, &agent).await?;
        }
        Command::Show => {
            let agent = client
                .get_agent(&agent_id)
                .await
                .context("Failed to fetch agent")?;
            print_agent(&agent);
        }
    }

    Ok(())
}

async fn configure(
    client: &ProjectClient,
    config: &ProjectConfig,
    agent_id: &str,
    args: &AgentArgs,
) -> Result<Agent> {
    let settings = agent_settings(config, agent_id, args)?;
    let agent = configure_agent(client, &settings)
        .await
        .context("Failed to configure agent")?;

    println!(
        "{} {} {}",
        style("Updated agent").green(),
        agent.id,
        style(format!("({} tools, model {})", agent.tools.len(), agent.model)).dim()
    );
    Ok(agent)
}

fn agent_settings(config: &ProjectConfig, agent_id: &str, args: &AgentArgs) -> Result<AgentSettings> {
    let mut functions = Vec::new();
    if let Some(uri) = args
        .queue_service_uri
        .as_ref()
        .or(config.queue_service_uri.as_ref())
    {
        functions.push(send_email_tool(uri));
    }
    if let Some(path) = &args.tools {
        functions.extend(
            load_function_tools(path)
                .with_context(|| format!("Failed to load tools from {}", path.display()))?,
        );
    }

    let mut context = InstructionContext::new(&config.sales_rep, SEND_EMAIL_TOOL);
    context.conference = args.conference.clone();
    let instructions = match &args.instructions {
        Some(path) => load_prompt_file(path, &context)?,
        None => load_prompt(SALES_EMAIL_INSTRUCTIONS, &context)?,
    };

    Ok(AgentSettings {
        agent_id: agent_id.to_string(),
        model: args.model.clone().unwrap_or_else(|| config.model.clone()),
        instructions,
        search_connection_name: config.search_connection_name.clone(),
        functions,
    })
}

fn print_agent(agent: &Agent) {
    println!("{} {}", style("Agent").bold(), agent.id);
    if let Some(name) = &agent.name {
        println!("  name:  {}", name);
    }
    println!("  model: {}", agent.model);
    for tool in &agent.tools {
        match tool.function_name() {
            Some(name) => println!("  tool:  {} ({})", tool.kind(), name),
            None => println!("  tool:  {}", tool.kind()),
        }
    }
    if let Some(instructions) = &agent.instructions {
        println!("\n{}", style(instructions.trim()).dim());
    }
}
