use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use encore_cli::{compare_files, render_report, simulate, LoggingSink};
use encore_core::{
    summarize, AuthoredNote, ChallengeContext, Command, Event, FallingConfig, FallingNoteSession,
    GameCore, GameServices, MonotonicClock, ScoreSubmitter,
};
use encore_infra_storage_fs::FsStorage;
use encore_ports::clock::{Clock, TickFlow};
use encore_ports::model::Composition;
use encore_ports::note::Instrument;
use encore_ports::storage::{CompositionStore, GameSettings, ScoreStore, SettingsStore};
use encore_ports::types::{CompositionId, Difficulty, PostId, TrackId, UserId};
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Rhythm challenges over recorded compositions", long_about = None)]
struct Cli {
    /// Directory holding settings, compositions and scores
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Overrides the stored difficulty (easy, medium, hard)
    #[arg(long, global = true)]
    difficulty: Option<Difficulty>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a recorded track against the original (both JSON)
    Compare {
        original: PathBuf,
        recorded: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Attach a composition (JSON) to a post
    Import { post: String, file: PathBuf },

    /// Play a post's composition through the log
    Play {
        post: String,

        /// Start offset in seconds
        #[arg(long, default_value = "0")]
        from: f64,

        #[arg(long)]
        mute: Vec<String>,

        #[arg(long)]
        solo: Vec<String>,
    },

    /// Autoplay a falling-notes run and print the result
    Simulate {
        /// Chart the run from this post's composition instead of random notes
        #[arg(long)]
        post: Option<String>,

        /// Layer to chart from (defaults to the first)
        #[arg(long)]
        track: Option<String>,

        /// Instrument for a random run
        #[arg(long, default_value = "drums")]
        instrument: Instrument,

        #[arg(long)]
        seed: Option<u64>,

        /// Let every n-th note fall through
        #[arg(long)]
        skip_every: Option<u32>,

        #[arg(long, default_value = "autoplay")]
        user: String,

        /// Record the score on the composition's leaderboard
        #[arg(long)]
        submit: bool,
    },

    /// Show the best scores for a post
    Leaderboard {
        post: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let storage = Arc::new(match cli.data_dir {
        Some(dir) => FsStorage::new(dir),
        None => FsStorage::default(),
    });
    let mut settings = storage.load_settings().unwrap_or_else(|err| {
        tracing::warn!(%err, "settings unreadable, using defaults");
        GameSettings::default()
    });
    if let Some(difficulty) = cli.difficulty {
        settings.difficulty = difficulty;
    }

    match cli.command {
        Commands::Compare {
            original,
            recorded,
            json,
        } => {
            let report = compare_files(&original, &recorded, &settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }
        }
        Commands::Import { post, file } => {
            let data = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let composition: Composition = serde_json::from_slice(&data)
                .with_context(|| format!("parsing composition {}", file.display()))?;
            for layer in &composition.layers {
                layer
                    .validate()
                    .with_context(|| format!("layer {}", layer.id))?;
            }
            storage.save_composition(&PostId(post.clone()), &composition)?;
            println!(
                "attached {} ({} layers) to post {post}",
                composition.id,
                composition.layers.len()
            );
        }
        Commands::Play {
            post,
            from,
            mute,
            solo,
        } => play(storage, post, from, mute, solo)?,
        Commands::Simulate {
            post,
            track,
            instrument,
            seed,
            skip_every,
            user,
            submit,
        } => {
            if seed.is_some() {
                settings.random_seed = seed;
            }
            let user_id = UserId(user);
            let (context, chart, instrument) = match post {
                Some(post) => {
                    let composition = storage.fetch_composition(&PostId(post))?;
                    let layer = match track {
                        Some(id) => composition
                            .layer(&TrackId(id.clone()))
                            .with_context(|| format!("no layer {id}"))?,
                        None => composition
                            .layers
                            .first()
                            .context("composition has no layers")?,
                    };
                    let context = ChallengeContext {
                        user_id,
                        original_track_id: layer.id.clone(),
                        composition_id: composition.id.clone(),
                    };
                    (context, Some(AuthoredNote::from_track(layer)), layer.instrument)
                }
                None => {
                    let context = ChallengeContext {
                        user_id,
                        original_track_id: TrackId(String::new()),
                        composition_id: CompositionId(String::new()),
                    };
                    (context, None, instrument)
                }
            };

            let config = FallingConfig::from_settings(&settings, instrument);
            let session =
                FallingNoteSession::new(config, context.clone(), Arc::new(LoggingSink::new()), chart);
            let frame = Duration::from_millis(settings.frame_interval_ms.max(1));
            let outcome = simulate(session, frame, skip_every)?;
            let Some(score) = outcome.score else {
                bail!("run did not complete after {} frames", outcome.frames);
            };

            let summary = summarize(&score, &settings.grade_cutoffs);
            println!(
                "grade {}  combined {}  timing {}  accuracy {}  points {}  max combo {}",
                summary.grade,
                score.combined_score,
                score.timing_score,
                score.accuracy_score,
                outcome.stats.points,
                outcome.stats.max_combo
            );
            for line in &summary.feedback {
                println!("{line}");
            }

            if submit {
                if context.composition_id.0.is_empty() {
                    bail!("random runs have no leaderboard; pass --post");
                }
                ScoreSubmitter::new(storage.clone()).submit(&context.composition_id, &score)?;
            }
        }
        Commands::Leaderboard { post, limit } => {
            let composition = storage.fetch_composition(&PostId(post))?;
            let mut scores = storage.scores_for(&composition.id)?;
            scores.sort_by(|a, b| b.combined_score.cmp(&a.combined_score));
            for (rank, score) in scores.iter().take(limit).enumerate() {
                println!(
                    "{:>3}. {:<16} {:>3}  {:?}",
                    rank + 1,
                    score.user_id.0,
                    score.combined_score,
                    score.challenge_type
                );
            }
        }
    }

    Ok(())
}

fn play(
    storage: Arc<FsStorage>,
    post: String,
    from: f64,
    mute: Vec<String>,
    solo: Vec<String>,
) -> anyhow::Result<()> {
    let clock = Arc::new(MonotonicClock::new());
    let sink = Arc::new(LoggingSink::new());
    let core = GameCore::new(GameServices {
        audio: sink.clone(),
        clock: clock.clone(),
        compositions: storage.clone(),
        scores: storage.clone(),
        settings: Some(storage),
    });
    let frame = Duration::from_millis(core.settings().frame_interval_ms.max(1));
    let core = Arc::new(Mutex::new(core));

    {
        let mut core = core.lock();
        core.handle_command(Command::LoadComposition {
            post_id: PostId(post.clone()),
        })?;
        let events = core.drain_events();
        if events
            .iter()
            .any(|event| matches!(event, Event::CompositionMissing { .. }))
        {
            println!("post {post} has no composition yet; attach one with `encore import`");
            return Ok(());
        }
        print_events(&events);

        for id in mute {
            core.handle_command(Command::SetMuted {
                track_id: TrackId(id),
                muted: true,
            })?;
        }
        for id in solo {
            core.handle_command(Command::SetSoloed {
                track_id: TrackId(id),
                soloed: true,
            })?;
        }
        core.handle_command(Command::Play { from_offset: from })?;
    }

    let ticker = {
        let core = core.clone();
        let clock = clock.clone();
        thread::spawn(move || loop {
            let (flow, events) = {
                let mut core = core.lock();
                let flow = core.tick(clock.now_ms());
                (flow, core.drain_events())
            };
            print_events(&events);
            if flow == TickFlow::Stop {
                break;
            }
            thread::sleep(frame);
        })
    };
    if ticker.join().is_err() {
        bail!("playback thread panicked");
    }

    info!(notes = sink.notes_played(), "playback finished");
    Ok(())
}

fn print_events(events: &[Event]) {
    for event in events {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(%err, "unprintable event"),
        }
    }
}
