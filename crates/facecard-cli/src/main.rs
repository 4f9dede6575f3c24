use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use facecard_core::{
    identify_all, DescriptorExtractor, MatchPolicy, OnnxExtractor, DEFAULT_TOLERANCE,
};
use facecard_store::{Catalog, NewIdentity, Store};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

mod view;

#[derive(Parser)]
#[command(name = "facecard", about = "facecard loyalty database and face identification CLI")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "FACECARD_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    #[arg(long, env = "FACECARD_MODEL_DIR")]
    model_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create any missing tables
    Setup {
        /// Drop and recreate the users table, discarding every identity
        #[arg(long)]
        reset: bool,
    },
    /// Register a person from a reference photo
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        /// Photo containing the person's face
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[command(flatten)]
        models: ModelArgs,
    },
    /// Identify every face in a photo
    Identify {
        image: PathBuf,
        /// Maximum descriptor distance for a match
        #[arg(long, env = "FACECARD_TOLERANCE", default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
        /// Which entry wins when several are within tolerance: first or nearest
        #[arg(long, env = "FACECARD_MATCH_POLICY", default_value = "first")]
        policy: MatchPolicy,
        #[command(flatten)]
        models: ModelArgs,
    },
    /// Replace the reward catalog
    SeedRewards {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Catalog TOML file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Pre-grant birthday rewards to this user
        #[arg(long)]
        birthday_user: Option<i64>,
    },
    /// Delete every record, keeping the tables
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print the database contents
    View,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Store::new(
        cli.db
            .unwrap_or_else(|| facecard_core::default_data_dir().join("facecard.db")),
    );

    match cli.command {
        Commands::Setup { reset } => {
            store.init_schema()?;
            if reset {
                store.reset_identities()?;
                println!("Users table recreated; all identities removed.");
            }
            println!("Database ready at {}", store.path().display());
        }
        Commands::Register {
            name,
            age,
            image,
            email,
            phone,
            models,
        } => {
            let mut extractor = load_extractor(&models)?;
            let rgb = load_image(&image)?;
            let faces = extractor.extract(&rgb)?;
            let Some(face) = faces.into_iter().next() else {
                bail!("no face found in {} for {name}", image.display());
            };

            store.init_schema()?;
            let id = store.insert_identity(&NewIdentity {
                name: name.clone(),
                age: age.into(),
                email,
                phone,
                image_path: Some(image.to_string_lossy().into_owned()),
                descriptor: face.descriptor,
            })?;
            println!("Registered {name} (ID: {id})");
        }
        Commands::Identify {
            image,
            tolerance,
            policy,
            models,
        } => {
            let mut extractor = load_extractor(&models)?;
            let gallery = store.load_gallery(extractor.dimension())?;
            let rgb = load_image(&image)?;
            let matcher = policy.matcher();
            let results = identify_all(&mut extractor, &*matcher, &gallery, &rgb, tolerance)?;

            if results.is_empty() {
                println!("No face detected.");
            }
            for (i, face) in results.iter().enumerate() {
                let b = &face.bbox;
                println!(
                    "Face {} at ({:.0}, {:.0}) {:.0}x{:.0}, confidence {:.2}",
                    i + 1,
                    b.x,
                    b.y,
                    b.width,
                    b.height,
                    b.confidence
                );
                match &face.matched {
                    Some(hit) => {
                        let p = hit.metadata;
                        println!("  Name: {} (ID: {})", p.name, p.id);
                        println!("  Age: {}", p.age);
                        if let Some(email) = &p.email {
                            println!("  Email: {email}");
                        }
                        println!("  Distance: {:.3}", hit.distance);
                    }
                    None => println!("  Unknown"),
                }
            }
        }
        Commands::SeedRewards {
            yes,
            catalog,
            birthday_user,
        } => {
            let catalog = match catalog {
                Some(path) => Catalog::from_file(&path)
                    .with_context(|| format!("failed to load catalog {}", path.display()))?,
                None => Catalog::builtin()?,
            };
            if !yes && !confirm("This will reset all existing rewards. Continue?")? {
                println!("Operation cancelled.");
                return Ok(());
            }

            store.init_schema()?;
            let summary = store.seed_rewards(&catalog)?;
            println!("\n=== Rewards Added Successfully ===");
            println!("Total rewards added: {}", summary.total);
            println!("\nRewards per business:");
            for (business, count) in &summary.by_business {
                println!("- {}: {count} rewards", business.as_deref().unwrap_or("General"));
            }
            println!("\nRewards per tier:");
            for (tier, count) in &summary.by_tier {
                println!(
                    "- {}: {count} rewards",
                    tier.as_deref().unwrap_or("No tier requirement")
                );
            }

            if let Some(user_id) = birthday_user {
                let granted = store.grant_birthday_rewards(user_id)?;
                println!("\nGranted {granted} birthday reward(s) to user {user_id}");
            }
        }
        Commands::Clear { yes } => {
            if !yes {
                println!("\nWARNING: This will delete ALL data including:");
                println!("- Users and their face descriptors");
                println!("- Loyalty cards and points");
                println!("- Rewards and claimed rewards");
                println!("- Points history");
                println!("\nThis action cannot be undone!");
                if !confirm("Are you sure you want to clear all records?")? {
                    println!("Operation cancelled.");
                    return Ok(());
                }
            }

            let before = store.clear_all()?;
            println!("\n=== Database Cleanup ===");
            for count in &before {
                println!("Initial rows in {}: {}", count.table, count.rows);
            }
            println!("\nAll records have been deleted; table structure preserved.");
        }
        Commands::View => {
            let stdout = io::stdout();
            view::render(&store, &mut stdout.lock())?;
        }
    }

    Ok(())
}

fn load_extractor(args: &ModelArgs) -> Result<OnnxExtractor> {
    let dir = args
        .model_dir
        .clone()
        .unwrap_or_else(facecard_core::default_model_dir);
    OnnxExtractor::load(&dir).with_context(|| format!("failed to load models from {}", dir.display()))
}

fn load_image(path: &Path) -> Result<image::RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .to_rgb8())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} (yes/no): ");
    io::stdout().flush()?;
    read_confirmation(io::stdin().lock())
}

/// Only an explicit "yes" confirms.
fn read_confirmation(mut input: impl BufRead) -> Result<bool> {
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
