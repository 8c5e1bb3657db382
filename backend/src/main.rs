use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::{Profile, ProfileId, Session, State, VoteError, VoteStore, config::Config};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load profiles from a JSON array into the store, keeping roster order
    Seed { roster: PathBuf },

    /// Show the next profile for a voter
    Next {
        /// Signed-in profile id, anonymous if omitted
        #[arg(long)]
        voter: Option<String>,
    },

    /// Record one vote
    Vote {
        #[arg(long)]
        voter: Option<String>,

        subject: String,

        /// Swipe left instead of right
        #[arg(long)]
        reject: bool,
    },

    /// Print the ranked leaderboard
    Leaderboard,

    /// Print vote totals for one profile
    Stats { subject: String },
}

async fn session_for(state: &State, voter: Option<String>) -> Result<Session> {
    let mut session = Session::new();

    if let Some(voter) = voter {
        session.sign_in(ProfileId::new(voter), &*state.store).await?;
    }

    Ok(session)
}

async fn seed(state: &State, path: &Path) -> Result<()> {
    let raw = read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let profiles: Vec<Profile> = serde_json::from_str(&raw).context("parsing roster")?;

    let mut created = 0;
    for profile in profiles {
        if state.store.upsert_profile(&profile).await? {
            created += 1;
        }
    }

    info!("Seeded roster, {created} new profiles");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    info!("Initializing state...");
    let state = State::new(Config::load()?).await?;

    match args.command {
        Command::Seed { roster } => seed(&state, &roster).await?,
        Command::Next { voter } => {
            let session = session_for(&state, voter).await?;

            match session.next(&*state.store).await? {
                Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                None => println!("You've rated everyone!"),
            }
        }
        Command::Vote {
            voter,
            subject,
            reject,
        } => {
            let mut session = session_for(&state, voter).await?;

            match session
                .swipe(&state.recorder, &ProfileId::new(subject), !reject)
                .await
            {
                Ok(vote) => println!("{}", serde_json::to_string_pretty(&vote)?),
                Err(VoteError::DuplicateVote) => println!("You have already rated this profile"),
                Err(err) => return Err(err.into()),
            }
        }
        Command::Leaderboard => {
            let board = state.ranking.leaderboard().await?;

            if board.is_empty() {
                println!("No rankings available yet");
            } else {
                println!("{}", serde_json::to_string_pretty(&board)?);
            }
        }
        Command::Stats { subject } => {
            let stats = state.ranking.stats_for(&ProfileId::new(subject)).await?;

            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
