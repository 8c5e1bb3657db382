//! Drives many concurrent sessions against one store and checks that the leaderboard adds up.
//!
//! Every third session signs in, and each signed-in voter gets a twin session racing it on the
//! same feed, so the store's uniqueness rule is hit for real.
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, bail};
use clap::Parser;
use engine::{Profile, ProfileId, Session, State, VoteError, VoteStore, config::Config};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::{
    signal::ctrl_c,
    sync::broadcast::error::RecvError,
    task::JoinSet,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Profiles to seed when the roster is empty
    #[arg(long, default_value_t = 20)]
    profiles: usize,

    /// Concurrent voting sessions
    #[arg(long, default_value_t = 60)]
    sessions: usize,

    /// Leaderboard rows to print
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Default)]
struct Counters {
    written: AtomicU64,
    duplicates: AtomicU64,
    failed: AtomicU64,
    heard: AtomicU64,
}

/// Deterministic swipe so reruns rank the same way.
fn decide(session: usize, subject: &ProfileId) -> bool {
    let salt: usize = subject.as_str().bytes().map(usize::from).sum();

    (session * 31 + salt * 17) % 100 < 60
}

async fn seed_roster(store: &dyn VoteStore, count: usize) -> Result<usize> {
    let existing = store.list_profiles().await?.len();
    if existing > 0 {
        info!("Roster already has {existing} profiles, not seeding");
        return Ok(existing);
    }

    for i in 0..count {
        let profile = Profile::new(
            ProfileId::new(format!("p{i:03}")),
            &format!("Profile {i}"),
            vec![format!("https://img.example/p{i:03}.jpg")],
            None,
        )?;
        store.upsert_profile(&profile).await?;
    }

    Ok(count)
}

async fn run_session(
    state: Arc<State>,
    index: usize,
    identity: Option<ProfileId>,
    counters: Arc<Counters>,
    pb: ProgressBar,
) -> Result<()> {
    let mut session = Session::new();
    if let Some(profile) = identity {
        session.sign_in(profile, &*state.store).await?;
    }

    while let Some(next) = session.next(&*state.store).await? {
        match session
            .swipe(&state.recorder, &next.id, decide(index, &next.id))
            .await
        {
            Ok(_) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(VoteError::DuplicateVote) => {
                counters.duplicates.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) if err.is_retryable() => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Session {index} giving up on {}: {err}", next.id);
                session.skip(&next.id);
            }
            Err(err) => return Err(err.into()),
        }

        pb.inc(1);
    }

    Ok(())
}

async fn simulate(state: Arc<State>, args: &Args, counters: Arc<Counters>) -> Result<()> {
    let roster = seed_roster(&*state.store, args.profiles).await?;
    if roster == 0 {
        bail!("nothing to vote on, pass --profiles above 0");
    }

    let pb = ProgressBar::new((args.sessions * roster) as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut tasks = JoinSet::new();
    for index in 0..args.sessions {
        let identity = (index % 3 == 0).then(|| ProfileId::new(format!("p{:03}", index % roster)));

        if let Some(twin) = identity.clone() {
            tasks.spawn(run_session(
                state.clone(),
                index,
                Some(twin),
                counters.clone(),
                pb.clone(),
            ));
        }

        tasks.spawn(run_session(
            state.clone(),
            index,
            identity,
            counters.clone(),
            pb.clone(),
        ));
    }

    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    pb.finish_with_message("Done");

    Ok(())
}

async fn ranked_votes(state: &State) -> Result<u64> {
    let ranked = state.ranking.ranking().await?;

    Ok(ranked.iter().map(|entry| entry.total_votes).sum())
}

/// `baseline` is what the store already held before this run. `None` skips the count check.
async fn report(
    state: &State,
    counters: &Counters,
    top: usize,
    baseline: Option<u64>,
) -> Result<()> {
    let written = counters.written.load(Ordering::Relaxed);
    let board = state.ranking.leaderboard().await?;
    let ranked_votes: u64 = board.iter().map(|entry| entry.ranked.total_votes).sum();

    println!("Votes written: {written}");
    println!("Duplicates rejected: {}", counters.duplicates.load(Ordering::Relaxed));
    println!("Transient failures: {}", counters.failed.load(Ordering::Relaxed));
    println!(
        "Vote events heard: {}\n",
        counters.heard.load(Ordering::Relaxed)
    );

    for entry in board.iter().take(top) {
        println!(
            "#{:<3} {:<16} {:>3}% of {}",
            entry.ranked.rank,
            entry.display_name.as_deref().unwrap_or("?"),
            entry.ranked.approval_percentage,
            entry.ranked.total_votes
        );
    }

    if let Some(baseline) = baseline {
        // a timed-out attempt can still commit, then come back as a duplicate or a failure
        let uncertain = counters.duplicates.load(Ordering::Relaxed)
            + counters.failed.load(Ordering::Relaxed);
        check_counts(ranked_votes, baseline + written, uncertain)?;
    }

    Ok(())
}

/// `confirmed` votes must all be in the store, plus at most `uncertain` more.
fn check_counts(ranked_votes: u64, confirmed: u64, uncertain: u64) -> Result<()> {
    if ranked_votes < confirmed || ranked_votes > confirmed + uncertain {
        error!(
            "Leaderboard counts {ranked_votes} votes, expected {confirmed} plus up to {uncertain} unconfirmed"
        );
        bail!("vote count mismatch");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let state = State::new(Config::load()?).await?;
    let counters = Arc::new(Counters::default());

    let mut events = state.events.subscribe();
    let heard = counters.clone();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(_) => heard.heard.fetch_add(1, Ordering::Relaxed),
                Err(RecvError::Lagged(missed)) => heard.heard.fetch_add(missed, Ordering::Relaxed),
                Err(RecvError::Closed) => break,
            };
        }
    });

    let baseline = ranked_votes(&state).await?;

    // an interrupted run may drop tasks between insert and count, so only check complete runs
    let baseline = tokio::select! {
        result = simulate(state.clone(), &args, counters.clone()) => {
            result?;
            Some(baseline)
        }
        _ = ctrl_c() => {
            info!("Received Ctrl+C, stopping early");
            None
        }
    };

    // let the listener drain what is already buffered
    tokio::time::sleep(Duration::from_millis(50)).await;
    listener.abort();

    report(&state, &counters, args.top, baseline).await
}
