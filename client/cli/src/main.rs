use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use shelf::{
    ChannelSink, CollectionKind, Config, Level, MovieId, Resolution, Shelf, init_tracing,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Adds the movie to a collection, or removes it if already there
    Toggle {
        kind: CollectionKind,

        movie_id: MovieId,

        #[arg(long)]
        title: Option<String>,
    },

    /// Rates a movie from 0.5 to 10 in half steps
    Rate {
        movie_id: MovieId,

        rating: f64,

        #[arg(long)]
        title: Option<String>,
    },

    /// Removes a movie's rating
    Unrate {
        movie_id: MovieId,

        #[arg(long)]
        title: Option<String>,
    },

    /// Prints what is stored locally
    List { kind: Option<CollectionKind> },

    /// Clears local collections and the session
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Config::load().context("Environment misconfigured")?;
    let (sink, mut notifications) = ChannelSink::new();

    info!("Initializing shelf...");
    let shelf = Shelf::new(&config, Arc::new(sink))
        .await
        .context("Failed to start shelf")?;
    let mutator = shelf.mutator();

    let resolution = match args.command {
        Command::Toggle {
            kind,
            movie_id,
            title,
        } => {
            name(&shelf, movie_id, title);
            Some(mutator.toggle(kind, movie_id).await)
        }
        Command::Rate {
            movie_id,
            rating,
            title,
        } => {
            name(&shelf, movie_id, title);
            Some(mutator.set_rating(movie_id, rating).await)
        }
        Command::Unrate { movie_id, title } => {
            name(&shelf, movie_id, title);
            Some(mutator.clear_rating(movie_id).await)
        }
        Command::List { kind } => {
            list(&shelf, kind);
            None
        }
        Command::Logout => {
            mutator.logout().await;
            println!("Signed out, local collections cleared");
            None
        }
    };

    mutator.persisted().await;

    while let Ok(notification) = notifications.try_recv() {
        match notification.level {
            Level::Error => eprintln!("{}", notification.message),
            Level::Success | Level::Info => println!("{}", notification.message),
        }
    }

    match resolution {
        Some(Resolution::AuthRequired) => bail!("Not signed in, set SHELF_TOKEN"),
        Some(Resolution::Invalid(e)) => Err(e).context("Request refused"),
        _ => Ok(()),
    }
}

fn name(shelf: &Shelf, movie_id: MovieId, title: Option<String>) {
    if let Some(title) = title {
        shelf.mutator().titles().insert(movie_id, title);
    }
}

fn list(shelf: &Shelf, kind: Option<CollectionKind>) {
    let store = shelf.mutator().store();
    let kinds = kind.map_or(CollectionKind::ALL.to_vec(), |kind| vec![kind]);

    for kind in kinds {
        println!("{} ({})", kind.label(), store.len(kind));

        match kind {
            CollectionKind::Rating => {
                for rated in store.ratings() {
                    println!("  {:>8}  {}", rated.movie_id, rated.rating);
                }
            }
            CollectionKind::Favorite | CollectionKind::Watchlist => {
                for item in store.items(kind) {
                    println!(
                        "  {:>8}  added {}",
                        item.movie_id,
                        item.added_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
    }
}
