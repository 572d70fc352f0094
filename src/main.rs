use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use review_map::{
    Config, DirectoryError, NoGeolocation, PhotoFile, ReviewId, Session, SortMode, SupabaseStore,
};

#[derive(Parser)]
#[command(name = "review-map")]
#[command(about = "Map pins with short reviews, likes and photos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = ".review-map/config.yml")]
    config: PathBuf,

    /// Store project URL (overrides store.url)
    #[arg(long, env = "SUPABASE_URL")]
    url: Option<String>,

    /// Store anonymous key (overrides store.anon_key)
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all reviews
    List {
        /// Ordering: newest or most_liked
        #[arg(long)]
        sort: Option<SortMode>,

        /// Print the sidebar markup instead of plain text
        #[arg(long)]
        html: bool,

        /// Also print the carousel markup (with --html)
        #[arg(long)]
        carousel: bool,
    },

    /// Drop a pin with a review
    Add {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Review text
        #[arg(long)]
        text: String,

        /// Optional photo (JPEG or PNG by default)
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Like a review
    Like {
        /// Review ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("review_map=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if cli.url.is_some() {
        config.store.url = cli.url;
    }
    if cli.key.is_some() {
        config.store.anon_key = cli.key;
    }

    let store = SupabaseStore::from_config(&config)?;
    let mut session = Session::new(store, config);
    session
        .start(&NoGeolocation)
        .await
        .map_err(user_facing)?;

    match cli.command {
        Commands::List {
            sort,
            html,
            carousel,
        } => {
            let directory = session.directory_mut();
            if let Some(sort) = sort {
                directory.set_sort_mode(sort);
            }
            directory.set_carousel_active(carousel);

            let projection = directory.render();
            if projection.is_empty() {
                println!("No reviews yet.");
            } else if html {
                print!("{}", projection.to_html());
                if carousel {
                    print!("{}", projection.carousel_html());
                }
            } else {
                print!("{}", projection.to_text());
            }
        }
        Commands::Add {
            lat,
            lng,
            text,
            photo,
        } => {
            let photo = photo.as_deref().map(read_photo).transpose()?;

            session.directory().map().click(lat, lng);
            session.pump();

            let id = session
                .submit(&text, photo)
                .await
                .map_err(user_facing)?
                .context("Review form was not opened")?;

            info!(%id, "Review created");
            println!("Added review {}", id);
        }
        Commands::Like { id } => {
            let id = ReviewId::new(id);
            let likes = session
                .directory_mut()
                .like(&id)
                .await
                .map_err(user_facing)?;

            match likes {
                Some(likes) => println!("👍 {} for review {}", likes, id),
                None => println!("Like recorded, but review {} is not loaded", id),
            }
        }
    }

    Ok(())
}

fn user_facing(err: DirectoryError) -> anyhow::Error {
    if err.is_validation() {
        anyhow::anyhow!("Photo rejected: {}", err.user_message())
    } else {
        anyhow::anyhow!("{} (details are in the log)", err.user_message())
    }
}

fn read_photo(path: &Path) -> Result<PhotoFile> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read photo: {}", path.display()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());

    Ok(PhotoFile::new(name, content_type_for(path), bytes))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
