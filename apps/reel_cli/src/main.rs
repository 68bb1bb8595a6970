use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use reel_core::{
    config::{config_path, load_settings_from, Settings},
    engagement::LikeTransition,
    intro::{IntroPhase, LOADING_DURATION, OPENING_DURATION, READY_DELAY},
    playback::{MediaElement, SimulatedMedia},
    share::{ShareError, ShareFallback, SharePlatform},
    time_ago::format_time_ago,
    CommentStore, InMemoryCommentStore, MissingCommentStore, ReelDependencies, ReelEvent,
    ReelsController, RestCommentStore,
};
use reel_shared::domain::{CommentId, CommentRow, NewComment, ShareData};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
struct Cli {
    /// Settings file; defaults to $REEL_CONFIG or ./reel.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    store_url: Option<String>,
    /// Use a process-local store seeded with sample comments.
    #[arg(long)]
    memory: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List comments newest first.
    Comments,
    Comment {
        #[arg(long)]
        name: String,
        #[arg(long)]
        message: String,
    },
    Delete {
        id: String,
    },
    /// Print comments as they are inserted until Ctrl-C.
    Watch,
    /// Run the envelope intro against simulated media and print reel events.
    Intro {
        #[arg(long)]
        like: bool,
        #[arg(long)]
        no_audio: bool,
    },
    Share {
        #[arg(long)]
        fallback: Option<ShareFallback>,
        #[arg(long)]
        copy: bool,
    },
}

/// Prints what a browser would open or copy.
struct TerminalShare;

#[async_trait]
impl SharePlatform for TerminalShare {
    fn can_share(&self, _data: &ShareData) -> bool {
        false
    }

    async fn share(&self, _data: &ShareData) -> Result<(), ShareError> {
        Err(ShareError::Failed("no share sheet in a terminal".into()))
    }

    async fn open_url(&self, url: &Url) -> Result<()> {
        println!("open: {url}");
        Ok(())
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        println!("copy: {text}");
        Ok(())
    }
}

fn sample_rows() -> Vec<CommentRow> {
    let now = Utc::now();
    vec![
        CommentRow {
            id: CommentId::from("1"),
            name: "Sarah & Mike".into(),
            message: "Congratulations! Can't wait to celebrate with you both! 💕".into(),
            timestamp: None,
            created_at: (now - chrono::Duration::hours(2)).to_rfc3339(),
        },
        CommentRow {
            id: CommentId::from("2"),
            name: "The Johnson Family".into(),
            message: "Such a beautiful invitation! Wishing you both endless happiness! 🥂".into(),
            timestamp: None,
            created_at: (now - chrono::Duration::hours(5)).to_rfc3339(),
        },
    ]
}

fn build_store(cli: &Cli, settings: &Settings) -> Result<Arc<dyn CommentStore>> {
    if cli.memory {
        return Ok(Arc::new(InMemoryCommentStore::with_rows(sample_rows())));
    }
    if settings.store_url.is_some() {
        return Ok(Arc::new(RestCommentStore::from_settings(settings)?));
    }
    warn!("no store_url configured; comment operations will fail");
    Ok(Arc::new(MissingCommentStore))
}

async fn list_comments(store: &dyn CommentStore) -> Result<()> {
    let now = Utc::now();
    for row in store.select_all().await? {
        let id = row.id.clone();
        match row.normalize() {
            Ok(comment) => println!(
                "[{}] {} ({}): {}",
                comment.id,
                comment.name,
                format_time_ago(comment.timestamp, now),
                comment.message
            ),
            Err(err) => warn!(%id, %err, "skipping row"),
        }
    }
    Ok(())
}

async fn watch_comments(store: &dyn CommentStore) -> Result<()> {
    let mut subscription = store.subscribe_inserts().await?;
    println!("watching for new comments, Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            row = subscription.next_row() => match row {
                Some(Ok(row)) => println!("+ {}: {}", row.name, row.message),
                Some(Err(err)) => return Err(err),
                None => return Err(anyhow!("realtime stream ended")),
            }
        }
    }
    subscription.release();
    Ok(())
}

fn describe(event: &ReelEvent) -> Option<String> {
    let line = match event {
        ReelEvent::IntroPhaseChanged(phase) => format!("intro: {phase:?}"),
        ReelEvent::IntroProgress(progress) if progress % 20 == 0 => {
            format!("loading: {progress}%")
        }
        ReelEvent::PlaybackChanged(state) => {
            format!("playback: playing={} muted={}", state.playing, state.muted)
        }
        ReelEvent::LikeChanged { liked, like_count } => {
            format!("likes: {like_count} (liked={liked})")
        }
        ReelEvent::HeartSpawned(heart) => {
            format!("heart at ({:.0}%, {:.0}%)", heart.x, heart.y)
        }
        ReelEvent::CommentsUpdated { count } => format!("comments: {count}"),
        ReelEvent::Notify(notification) => {
            format!("toast: {} / {}", notification.title, notification.description)
        }
        _ => return None,
    };
    Some(line)
}

async fn run_intro(
    settings: &Settings,
    store: Arc<dyn CommentStore>,
    like: bool,
    no_audio: bool,
) -> Result<()> {
    let video: Arc<dyn MediaElement> = Arc::new(
        SimulatedMedia::new(settings.video_path.clone()).with_length(Duration::from_secs(45)),
    );
    let audio: Option<Arc<dyn MediaElement>> = if no_audio {
        None
    } else {
        let label = settings
            .audio_path
            .clone()
            .unwrap_or_else(|| "soundtrack".to_string());
        Some(Arc::new(SimulatedMedia::new(label)))
    };

    let controller = ReelsController::new(
        settings,
        ReelDependencies {
            store,
            video,
            audio,
            share: Arc::new(TerminalShare),
        },
    );
    let mut events = controller.subscribe_events();
    controller.open_envelope().await;

    let intro_length = OPENING_DURATION + LOADING_DURATION + READY_DELAY;
    let deadline = tokio::time::sleep(intro_length + Duration::from_secs(2));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    if controller.intro().phase() == IntroPhase::Ready && like {
        if let LikeTransition::Liked(heart) = controller.double_tap_surface().await {
            println!("liked, heart {}", heart.id.0);
        }
    }

    let snapshot = controller.snapshot().await;
    println!(
        "final: phase={:?} playing={} likes={} comments={}",
        snapshot.phase, snapshot.playback.playing, snapshot.like_count, snapshot.comment_count
    );
    controller.teardown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(config_path);
    let mut settings = load_settings_from(&path);
    if let Some(url) = &cli.store_url {
        settings.store_url = Some(url.clone());
    }
    info!(config = %path.display(), table = %settings.comments_table, "settings loaded");

    let store = build_store(&cli, &settings)?;

    match cli.command {
        Command::Comments => list_comments(store.as_ref()).await?,
        Command::Comment { name, message } => {
            let (name, message) = (name.trim().to_string(), message.trim().to_string());
            if name.is_empty() || message.is_empty() {
                return Err(anyhow!("name and message must not be blank"));
            }
            store
                .insert(NewComment {
                    name,
                    message,
                    timestamp: Utc::now(),
                })
                .await?;
            println!("comment added");
        }
        Command::Delete { id } => {
            store.delete(&CommentId::new(id.clone())).await?;
            println!("deleted {id}");
        }
        Command::Watch => watch_comments(store.as_ref()).await?,
        Command::Intro { like, no_audio } => run_intro(&settings, store, like, no_audio).await?,
        Command::Share { fallback, copy } => {
            if let Some(fallback) = fallback {
                settings.share_fallback = fallback;
            }
            let controller = ReelsController::new(
                &settings,
                ReelDependencies {
                    store,
                    video: Arc::new(SimulatedMedia::new(settings.video_path.clone())),
                    audio: None,
                    share: Arc::new(TerminalShare),
                },
            );
            if copy {
                controller.copy_link().await;
            } else {
                let outcome = controller.share_invitation().await;
                info!(?outcome, "share finished");
            }
            controller.teardown();
        }
    }

    Ok(())
}
