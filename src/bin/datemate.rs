//! # DateMate CLI
//!
//! Thin wrapper that drives the client library from the command line.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin datemate -- login ana@example.com s3cret
//! cargo run --bin datemate -- register --profile config/profile.toml --photo me.png
//! cargo run --bin datemate -- next
//! cargo run --bin datemate -- swipe 65f0c1 --like
//! cargo run --bin datemate -- recommendations
//! ```
//!
//! The session token survives between invocations in the storage directory
//! (one file per API origin). With `--metrics-output`, every request made by
//! the invocation is exported to JSON on exit.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{info, LevelFilter};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use datemate_client::client::{ClientCore, ClientMetrics, ClientMiddleware};
use datemate_client::common::config::{load_config, ClientConfig};
use datemate_client::common::forms::RegistrationForm;
use datemate_client::common::messages::Profile;
use datemate_client::processing::{ImageAsset, ImagePipeline, ImageLimits, SelectedFile};
use datemate_client::session::{FileStore, KvStore};

/// Command-line arguments for the DateMate client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the client configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to write metrics JSON output (optional)
    #[arg(long)]
    metrics_output: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and keep the session for later commands
    Login { email: String, password: String },
    /// Create an account from a TOML profile
    Register {
        #[arg(long)]
        profile: PathBuf,
        /// Profile photo (JPG, PNG or GIF, up to 5 MB)
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// End the session
    Logout,
    /// Show the next profile in the discovery feed
    Next,
    /// Like or pass on a profile
    Swipe {
        profile_id: String,
        #[arg(long, conflicts_with = "pass", required_unless_present = "pass")]
        like: bool,
        #[arg(long)]
        pass: bool,
    },
    /// List recommended matches
    Recommendations,
    /// Show your own profile
    Me,
    /// Update your profile from a JSON object
    Update {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Run a photo through the upload pipeline and print the result
    Ingest { path: PathBuf },
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = ClientConfig::load_or_default(args.config.as_ref())?;
    let pipeline = ImagePipeline::new(ImageLimits::from(&config.images));

    // Ingestion never needs a session
    if let Command::Ingest { path } = &args.command {
        return print_ingest(&pipeline, path).await;
    }

    let store: Arc<dyn KvStore> = Arc::new(
        FileStore::for_origin(&config.storage.dir, &config.api.base_url)
            .context("Failed to open session storage")?,
    );
    let core = Arc::new(ClientCore::new(&config.api)?);

    let mut client = ClientMiddleware::restore(core, store)
        .await?
        .with_unauthorized_handler(|| {
            eprintln!("Your session has expired. Run `datemate login` to sign in again.");
        });

    let metrics = if args.metrics_output.is_some() {
        let m = Arc::new(Mutex::new(ClientMetrics::new("datemate".to_string())));
        client = client.with_metrics(m.clone());
        Some(m)
    } else {
        None
    };

    let outcome = run(&client, &pipeline, args.command).await;

    if let (Some(metrics), Some(output_path)) = (metrics, args.metrics_output) {
        let metrics = metrics
            .lock()
            .map_err(|_| anyhow::anyhow!("metrics lock poisoned"))?;
        metrics.export_to_json(&output_path)?;
        info!("📊 Metrics exported to {}", output_path.display());
    }

    outcome
}

async fn run(
    client: &ClientMiddleware,
    pipeline: &ImagePipeline,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
            println!("Logged in as {}", email);
        }
        Command::Register { profile, photo } => {
            let mut form: RegistrationForm = load_config(&profile)?;
            if let Some(photo) = photo {
                form.attach_image(ingest(pipeline, &photo).await?);
            }
            let user = form.into_new_user()?;
            let created = client.register(&user).await?;
            let email = created.email.as_deref().unwrap_or(&user.email);
            println!("Registered {} ({})", created.name, email);
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Command::Next => match client.next_profile().await? {
            Some(profile) => print_profile(client, &profile).await,
            None => println!("No more profiles available. Check back later!"),
        },
        Command::Swipe {
            profile_id, like, ..
        } => {
            client.record_swipe(&profile_id, like).await?;
            let verb = if like { "Liked" } else { "Passed on" };
            println!("{} {}", verb, profile_id);
        }
        Command::Recommendations => {
            let recommendations = client.recommendations().await?;
            if let Some(message) = &recommendations.message {
                println!("{}", message);
            }
            if recommendations.profiles.is_empty() {
                println!("No matches yet.");
            }
            for profile in &recommendations.profiles {
                print_profile(client, profile).await;
                println!();
            }
        }
        Command::Me => {
            let profile = client.my_profile().await?;
            print_profile(client, &profile).await;
        }
        Command::Update { profile, photo } => {
            let contents = tokio::fs::read_to_string(&profile)
                .await
                .with_context(|| format!("Failed to read {}", profile.display()))?;
            let mut update: Value = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not valid JSON", profile.display()))?;
            let Some(fields) = update.as_object_mut() else {
                bail!("{} must contain a JSON object", profile.display());
            };
            if let Some(photo) = photo {
                let asset = ingest(pipeline, &photo).await?;
                fields.insert("profile_image".to_string(), asset.into_data_uri().into());
            }
            let updated = client.update_profile(&update).await?;
            print_profile(client, &updated).await;
        }
        Command::Ingest { path } => print_ingest(pipeline, &path).await?,
    }
    Ok(())
}

async fn ingest(pipeline: &ImagePipeline, path: &Path) -> anyhow::Result<ImageAsset> {
    let file = SelectedFile::from_path(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(pipeline.ingest(file).await?)
}

async fn print_ingest(pipeline: &ImagePipeline, path: &Path) -> anyhow::Result<()> {
    let asset = ingest(pipeline, path).await?;
    println!("{}", ingest_summary(path, &asset));
    Ok(())
}

fn ingest_summary(path: &Path, asset: &ImageAsset) -> String {
    let (width, height) = asset.dimensions();
    format!(
        "{}: {}x{} JPEG, {} bytes source, {} bytes as data URI",
        path.display(),
        width,
        height,
        asset.byte_size(),
        asset.data_uri().len()
    )
}

async fn print_profile(client: &ClientMiddleware, profile: &Profile) {
    let photo = match &profile.profile_image {
        Some(image) if !image.is_empty() => "uploaded photo".to_string(),
        _ => client
            .photo_cache()
            .photo_for(&profile.id, profile.gender.as_deref().unwrap_or_default())
            .await
            .unwrap_or_else(|_| profile.avatar_url()),
    };

    match profile.age {
        Some(age) => println!("{}, {}", profile.name, age),
        None => println!("{}", profile.name),
    }
    if let Some(location) = &profile.location {
        println!("  📍 {}", location);
    }
    if let Some(profession) = &profile.profession {
        println!("  💼 {}", profession);
    }
    if !profile.hobbies.is_empty() {
        println!("  Hobbies: {}", profile.hobbies.join(", "));
    }
    if !profile.languages.is_empty() {
        println!("  Languages: {}", profile.languages.join(", "));
    }
    println!("  Photo: {}", photo);
    println!("  Id: {}", profile.id);
}
