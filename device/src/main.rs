use clap::{Parser, Subcommand};
use common::{AuthConfig, Result};
use device::{
    ChallengePoller, FlowAction, FlowOrchestrator, FlowReport, FlowRequest, HttpVerifier,
    KeyVault, PollOutcome,
};
use env_logger::fmt::Color;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use rand::Rng;
use std::io::Write;
use std::sync::{Arc, Mutex};

const BANNER: &str = r#"
╔══════════════════════════════════════════════════╗
║   Device Authentication Client v1.0.0            ║
║   passwordless challenge-response over P-256     ║
╚══════════════════════════════════════════════════╝
"#;

fn setup_logger() {
    let mut builder = Builder::from_default_env();

    builder
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            let mut level_style = buf.style();
            let mut message_style = buf.style();

            let level_color = match record.level() {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Cyan,
                log::Level::Trace => Color::White,
            };

            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {} {}",
                timestamp_style
                    .set_color(Color::Rgb(100, 100, 100))
                    .value(timestamp),
                level_style.set_color(level_color).value(record.level()),
                message_style.set_color(Color::White).value(record.args())
            )
        })
        .filter(None, LevelFilter::Info)
        .init();
}

#[derive(Parser)]
#[command(name = "device", about = "Passwordless device authentication client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an identity and register it with the verifier
    Enroll {
        /// Human-readable device name; generated when omitted
        #[arg(long)]
        name: Option<String>,
        /// Enrollment challenge to finalize in the same run
        #[arg(long)]
        challenge_id: Option<String>,
        #[arg(long)]
        nonce: Option<String>,
    },
    /// Sign a login challenge with the enrolled identity
    Login {
        #[arg(long)]
        challenge_id: String,
        #[arg(long)]
        nonce: Option<String>,
    },
    /// Issue a login challenge and poll it until terminal
    RequestLogin,
    /// Issue an enrollment challenge and poll it until terminal
    RequestEnroll,
    /// Show the enrollment state
    Status,
    /// Remove the persisted identity
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger();
    println!("{}", BANNER);

    let args = Args::parse();
    let config = AuthConfig::from_env();
    let vault = KeyVault::new(config.vault_dir.clone());

    info!("verifier: {}", config.server_url);

    match args.command {
        Command::Enroll {
            name,
            challenge_id,
            nonce,
        } => {
            let device_name = name.unwrap_or_else(|| {
                format!("Device {}", rand::thread_rng().gen_range(0..1000))
            });
            let request = FlowRequest {
                action: FlowAction::Enroll { device_name },
                challenge_id,
                nonce,
            };
            run_flow(vault, &config, request).await
        }
        Command::Login {
            challenge_id,
            nonce,
        } => {
            let request = FlowRequest {
                action: FlowAction::Login,
                challenge_id: Some(challenge_id),
                nonce,
            };
            run_flow(vault, &config, request).await
        }
        Command::RequestLogin => watch_session(&config, false).await,
        Command::RequestEnroll => watch_session(&config, true).await,
        Command::Status => {
            match vault.load_identity()? {
                Some(identity) => {
                    println!("enrolled as {} ({})", identity.device_id, identity.device_name);
                }
                None => println!("not enrolled"),
            }
            Ok(())
        }
        Command::Reset => {
            vault.clear_identity()?;
            println!("identity cleared");
            Ok(())
        }
    }
}

async fn run_flow(vault: KeyVault, config: &AuthConfig, request: FlowRequest) -> Result<()> {
    let verifier = HttpVerifier::new(config)?;
    let orchestrator = FlowOrchestrator::new(vault, verifier);

    // a fresh orchestrator always accepts its first trigger
    let FlowReport { log, outcome } = orchestrator
        .run(request)
        .await
        .expect("first run on a fresh orchestrator");

    for line in &log {
        println!("> {}", line);
    }
    match outcome {
        Ok(kind) => {
            println!("STATUS: {:?}", kind);
            Ok(())
        }
        Err(e) => {
            error!("flow failed: {}", e);
            println!("STATUS: FAILED ({})", e);
            Err(e)
        }
    }
}

async fn watch_session(config: &AuthConfig, enroll: bool) -> Result<()> {
    let verifier = Arc::new(HttpVerifier::new(config)?);

    let (session, auth_url) = if enroll {
        device::open_enroll_session(verifier.as_ref()).await?
    } else {
        device::open_login_session(verifier.as_ref()).await?
    };

    println!("challenge: {}", session.challenge_id);
    if let Some(url) = auth_url {
        println!("authenticate at: {}", url);
    }

    let session = Arc::new(Mutex::new(session));
    let (handle, outcome) =
        ChallengePoller::new(Arc::clone(&session), verifier, config).start();

    tokio::select! {
        outcome = outcome => match outcome {
            Ok(PollOutcome::Verified) => println!("STATUS: VERIFIED"),
            Ok(PollOutcome::Expired) => println!("STATUS: EXPIRED"),
            Err(_) => println!("STATUS: CANCELLED"),
        },
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            handle.join().await;
            println!("STATUS: CANCELLED");
        }
    }
    Ok(())
}
