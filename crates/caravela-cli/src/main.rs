//! CARAVELA CLI - deploy and manage containers through a local daemon.

use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use std::time::Duration;

use caravela_core::ClientError;
use caravela_node::client::UserClient;
use caravela_proto::{ContainerConfig, CpuClass, GroupPolicy, PortMapping, Resources};

/// Exit code when the daemon cannot be reached.
const EXIT_DAEMON_UNREACHABLE: u8 = 2;
/// Exit code when a deployment is impossible.
const EXIT_DEPLOY_IMPOSSIBLE: u8 = 3;
/// Exit code when stopping containers failed.
const EXIT_STOP_FAILED: u8 = 4;
/// Exit code when listing containers failed.
const EXIT_LIST_FAILED: u8 = 5;

#[derive(Parser)]
#[command(name = "caravela")]
#[command(about = "Deploy containers on a CARAVELA cluster")]
#[command(version)]
struct Cli {
    /// IP of the daemon to talk to.
    #[arg(long, global = true, default_value = "127.0.0.1")]
    ip: String,

    /// API port of the daemon.
    #[arg(long, global = true, default_value_t = 8001)]
    port: u16,

    /// Request timeout in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a container somewhere in the cluster
    Run {
        /// Container image key
        image: String,

        /// Arguments passed to the container
        #[arg(last = true)]
        args: Vec<String>,

        /// Maximum number of CPU cores the container can use
        #[arg(short, long, default_value_t = 1)]
        cpus: u32,

        /// Maximum amount of RAM (in megabytes) the container can use
        #[arg(short, long, default_value_t = 256)]
        ram: u32,

        /// CPU class to demand from the supplier
        #[arg(long, value_enum, default_value_t = CpuClassArg::Low)]
        cpu_class: CpuClassArg,

        /// Port mappings as host:container pairs
        #[arg(short, long, value_parser = parse_port_mapping)]
        publish: Vec<PortMapping>,

        /// Placement policy relative to the rest of the submission
        #[arg(long, value_enum, default_value_t = GroupPolicyArg::Spread)]
        group_policy: GroupPolicyArg,
    },

    /// Stop and remove containers by id
    Stop {
        /// Container ids to stop
        #[arg(required = true)]
        container_ids: Vec<String>,
    },

    /// List the containers deployed through this daemon
    Ps,

    /// Ask the daemon to leave the cluster and shut down
    Exit,
}

#[derive(Clone, Copy, ValueEnum)]
enum CpuClassArg {
    Low,
    High,
}

impl From<CpuClassArg> for CpuClass {
    fn from(arg: CpuClassArg) -> Self {
        match arg {
            CpuClassArg::Low => Self::Low,
            CpuClassArg::High => Self::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupPolicyArg {
    Spread,
    CoLocation,
}

impl From<GroupPolicyArg> for GroupPolicy {
    fn from(arg: GroupPolicyArg) -> Self {
        match arg {
            GroupPolicyArg::Spread => Self::Spread,
            GroupPolicyArg::CoLocation => Self::CoLocation,
        }
    }
}

fn parse_port_mapping(text: &str) -> Result<PortMapping, String> {
    let (host, container) = text
        .split_once(':')
        .ok_or_else(|| format!("expected host:container, got {text}"))?;
    Ok(PortMapping {
        host_port: host.parse().map_err(|_| format!("bad host port {host}"))?,
        container_port: container
            .parse()
            .map_err(|_| format!("bad container port {container}"))?,
    })
}

fn failure_code(error: &ClientError, command_code: u8) -> u8 {
    match error {
        ClientError::Unreachable(_) | ClientError::Timeout => EXIT_DAEMON_UNREACHABLE,
        _ => command_code,
    }
}

fn failure(error: &ClientError, command_code: u8) -> ExitCode {
    ExitCode::from(failure_code(error, command_code))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let client = match UserClient::new(&cli.ip, cli.port, Duration::from_secs(cli.timeout)) {
        Ok(client) => client,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::from(EXIT_DAEMON_UNREACHABLE);
        }
    };

    match cli.command {
        Commands::Run {
            image,
            args,
            cpus,
            ram,
            cpu_class,
            publish,
            group_policy,
        } => {
            let config = ContainerConfig {
                image_key: image,
                args,
                port_mappings: publish,
                resources: Resources {
                    cpu_class: cpu_class.into(),
                    cpus,
                    ram,
                },
                group_policy: group_policy.into(),
            };

            match client.submit_containers(&[config]).await {
                Ok(statuses) => {
                    for status in statuses {
                        println!("{}  {}  {}", status.container_id, status.image_key, status.supplier_ip);
                    }
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    eprintln!("Error: impossible to deploy the container: {error}");
                    failure(&error, EXIT_DEPLOY_IMPOSSIBLE)
                }
            }
        }

        Commands::Stop { container_ids } => match client.stop_containers(&container_ids).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("Error: stopping the containers: {error}");
                failure(&error, EXIT_STOP_FAILED)
            }
        },

        Commands::Ps => match client.list_containers().await {
            Ok(statuses) => {
                println!(
                    "{:<24}  {:<20}  {:<15}  {:<12}  STATE",
                    "CONTAINER ID", "IMAGE", "SUPPLIER", "RESOURCES"
                );
                for status in statuses {
                    println!(
                        "{:<24}  {:<20}  {:<15}  <{};{}>  {:?}",
                        status.container_id,
                        status.image_key,
                        status.supplier_ip,
                        status.resources.cpus,
                        status.resources.ram,
                        status.state,
                    );
                }
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("Error: listing the containers: {error}");
                failure(&error, EXIT_LIST_FAILED)
            }
        },

        Commands::Exit => match client.exit().await {
            Ok(()) => {
                println!("daemon is leaving the cluster");
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("Error: exiting the system: {error}");
                failure(&error, EXIT_DAEMON_UNREACHABLE)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_mapping_parses() {
        let mapping = parse_port_mapping("8080:80").unwrap();
        assert_eq!(mapping.host_port, 8080);
        assert_eq!(mapping.container_port, 80);

        assert!(parse_port_mapping("8080").is_err());
        assert!(parse_port_mapping("a:80").is_err());
    }

    #[test]
    fn unreachable_errors_win_over_command_codes() {
        let code = failure_code(
            &ClientError::Unreachable("down".into()),
            EXIT_DEPLOY_IMPOSSIBLE,
        );
        assert_eq!(code, EXIT_DAEMON_UNREACHABLE);

        let code = failure_code(&ClientError::Protocol("bad".into()), EXIT_DEPLOY_IMPOSSIBLE);
        assert_eq!(code, EXIT_DEPLOY_IMPOSSIBLE);

        let code = failure_code(&ClientError::Timeout, EXIT_STOP_FAILED);
        assert_eq!(code, EXIT_DAEMON_UNREACHABLE);
    }
}
