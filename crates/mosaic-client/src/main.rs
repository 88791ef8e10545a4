use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use mosaic_client::comments::CommentThread;
use mosaic_client::feed::{self, FeedSource, FeedState, ProfileState};
use mosaic_client::{AppState, ChatSession, ClientConfig, OptimisticCoordinator, ViewScope};
use mosaic_media::{AspectPreset, CropRect, CropSpec, EditSession, Filter, MediaBlob, VideoDraft};
use mosaic_net::{ChatApi, SocialApi};
use mosaic_shared::models::{FeedItem, Message};
use mosaic_shared::protocol::{DraftKind, PublishDraft};
use mosaic_shared::types::{ActionKind, CommentId, ConversationId, EntityKey, PostId, ReelId, UserId};

#[derive(Parser)]
#[command(name = "mosaic", version, about = "Command-line client for the Mosaic social backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the token pair.
    Login {
        /// Defaults to the last username used.
        username: Option<String>,
    },
    /// Forget the stored token pair.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Chat in a conversation. Lists conversations when neither option is given.
    Chat {
        /// Open (or create) the conversation with this user.
        #[arg(long, conflicts_with = "conversation")]
        with: Option<i64>,
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// Print the posts or reels feed.
    Feed {
        #[arg(long)]
        reels: bool,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Toggle the like on a post or reel.
    Like { kind: ItemKind, id: i64 },
    /// Toggle the bookmark on a post or reel.
    Save { kind: ItemKind, id: i64 },
    /// Toggle following a user.
    Follow { user: i64 },
    /// Show (and optionally add to) the comments of a post or reel.
    Comments {
        kind: ItemKind,
        id: i64,
        #[arg(long)]
        add: Option<String>,
        #[arg(long, requires = "add")]
        reply_to: Option<i64>,
    },
    /// Search users by name.
    Search { query: String },
    /// Publish a post (images) or a reel (one video).
    Publish {
        #[arg(long, default_value = "")]
        caption: String,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        /// Crop every image to `original`, `1:1`, `4:5` or `16:9`.
        #[arg(long)]
        aspect: Option<AspectPreset>,
        #[arg(long)]
        zoom: Option<f32>,
        /// One per image, in order; missing ones default to `none`.
        #[arg(long = "filter")]
        filters: Vec<Filter>,
        #[arg(long, conflicts_with = "images")]
        video: Option<PathBuf>,
        /// Clip length in seconds.
        #[arg(long, requires = "video")]
        duration: Option<f64>,
        #[arg(long, requires = "video")]
        trim_start: Option<f64>,
        #[arg(long, requires = "video")]
        trim_end: Option<f64>,
    },
    /// Show or change stored client settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        live_url: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ItemKind {
    Post,
    Reel,
}

impl ItemKind {
    fn key(self, id: i64) -> EntityKey {
        match self {
            Self::Post => EntityKey::Post(PostId(id)),
            Self::Reel => EntityKey::Reel(ReelId(id)),
        }
    }

    fn source(self) -> FeedSource {
        match self {
            Self::Post => FeedSource::Posts,
            Self::Reel => FeedSource::Reels,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    mosaic_client::init_tracing();

    let cli = Cli::parse();
    let mut state =
        AppState::open(ClientConfig::from_env()).context("Failed to open client state")?;

    let result = run(cli.command, &mut state).await;
    state
        .persist_tokens()
        .context("Failed to save credentials")?;
    result
}

async fn run(command: Command, state: &mut AppState) -> Result<()> {
    match command {
        Command::Login { username } => login(state, username).await,
        Command::Logout => {
            state.auth.expire();
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => {
            let user = state.current_user().await?;
            println!("{} (id {})", user.username, user.id);
            if let Some(ref name) = user.display_name {
                println!("  {name}");
            }
            Ok(())
        }
        Command::Chat { with, conversation } => chat(state, with, conversation).await,
        Command::Feed { reels, pages } => show_feed(state, reels, pages).await,
        Command::Like { kind, id } => toggle_item(state, kind, id, ActionKind::Like).await,
        Command::Save { kind, id } => toggle_item(state, kind, id, ActionKind::Save).await,
        Command::Follow { user } => follow(state, UserId(user)).await,
        Command::Comments {
            kind,
            id,
            add,
            reply_to,
        } => comments(state, kind.key(id), add, reply_to.map(CommentId)).await,
        Command::Search { query } => {
            for user in state.api.search_users(&query).await? {
                println!("{:>8}  {}", user.id.to_string(), user.username);
            }
            Ok(())
        }
        Command::Publish {
            caption,
            images,
            aspect,
            zoom,
            filters,
            video,
            duration,
            trim_start,
            trim_end,
        } => {
            let draft = match video {
                Some(path) => reel_draft(caption, &path, duration, trim_start, trim_end)?,
                None => post_draft(caption, &images, aspect, zoom, &filters)?,
            };
            let item = state.api.publish(&draft).await?;
            print_item(&item);
            Ok(())
        }
        Command::Config { action } => config(state, action),
    }
}

async fn login(state: &mut AppState, username: Option<String>) -> Result<()> {
    let mut settings = state.database.get_settings()?;
    let username = match username.or_else(|| settings.last_username.clone()) {
        Some(name) => name,
        None => bail!("No username given and none remembered"),
    };

    let password = match std::env::var("MOSAIC_PASSWORD") {
        Ok(pw) => pw,
        Err(_) => {
            eprint!("Password for {username}: ");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            lines.next_line().await?.context("No password given")?
        }
    };

    let pair = state.api.login(&username, password.trim_end()).await?;
    state.database.save_tokens(&pair)?;

    settings.last_username = Some(username.clone());
    state.database.update_settings(&settings)?;

    println!("Logged in as {username}");
    Ok(())
}

async fn chat(state: &mut AppState, with: Option<i64>, conversation: Option<i64>) -> Result<()> {
    let me = state.current_user().await?.id;

    let conv = match (with, conversation) {
        (Some(user), _) => state.api.open_conversation(UserId(user)).await?,
        (None, Some(id)) => state
            .api
            .conversations()
            .await?
            .into_iter()
            .find(|c| c.id == ConversationId(id))
            .with_context(|| format!("No conversation {id}"))?,
        (None, None) => {
            for conv in state.api.conversations().await? {
                let peer = conv
                    .peer_of(me)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".into());
                println!("{:>8}  with user {peer}", conv.id.to_string());
            }
            return Ok(());
        }
    };
    let peer = conv
        .peer_of(me)
        .context("You are not a participant of this conversation")?;

    let session = ChatSession::open(&state.session_deps(), conv.id, ViewScope::new()).await?;
    for msg in session.messages() {
        print_message(&msg, me);
    }
    session.on_message(move |msg| print_message(msg, me));
    info!(conversation = %conv.id, "Type a message and press enter; ctrl-c to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(text) = line else { break };
        if text.trim().is_empty() {
            continue;
        }

        match session.send(&text, peer).await {
            Ok(msg) => print_message(&msg, me),
            Err(e) => eprintln!("! {e}"),
        }

        let current = session.state();
        if current.is_terminal() {
            eprintln!("! session ended: {current:?}");
            break;
        }
    }

    session.close();
    Ok(())
}

async fn show_feed(state: &AppState, reels: bool, pages: u32) -> Result<()> {
    let source = if reels { FeedSource::Reels } else { FeedSource::Posts };
    let feed_state = Arc::new(Mutex::new(FeedState::new(source)));
    let scope = ViewScope::new();

    for _ in 0..pages.max(1) {
        if feed::load_more(state.api.as_ref(), &feed_state, &scope).await? == 0 {
            break;
        }
    }

    let guard = feed_state
        .lock()
        .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
    for item in guard.items() {
        print_item(item);
    }
    Ok(())
}

async fn toggle_item(state: &AppState, kind: ItemKind, id: i64, action: ActionKind) -> Result<()> {
    let key = kind.key(id);
    let item = state.api.feed_item(key).await?;
    let current = match action {
        ActionKind::Save => item.engagement().is_saved,
        _ => item.engagement().is_liked,
    };

    let mut feed_state = FeedState::new(kind.source());
    feed_state.upsert(item);

    let coordinator =
        OptimisticCoordinator::new(state.api.clone(), Arc::new(Mutex::new(feed_state)), ViewScope::new());
    let settled = coordinator.toggle(key, action, current).await?;

    match settled.count {
        Some(count) => println!("{key}: {action} = {} ({count})", settled.active),
        None => println!("{key}: {action} = {}", settled.active),
    }
    Ok(())
}

async fn follow(state: &AppState, user: UserId) -> Result<()> {
    let profile = state.api.profile(user).await?;
    let current = profile.is_following;

    let mut profiles = ProfileState::new();
    profiles.insert(profile);

    let coordinator =
        OptimisticCoordinator::new(state.api.clone(), Arc::new(Mutex::new(profiles)), ViewScope::new());
    let settled = coordinator
        .toggle(EntityKey::User(user), ActionKind::Follow, current)
        .await?;

    let verb = if settled.active { "Following" } else { "Not following" };
    println!("{verb} user {user} ({} followers)", settled.count.unwrap_or_default());
    Ok(())
}

async fn comments(
    state: &AppState,
    target: EntityKey,
    add: Option<String>,
    reply_to: Option<CommentId>,
) -> Result<()> {
    let mut thread = CommentThread::build(state.api.comments(target).await?);

    if let Some(text) = add {
        let comment = state.api.add_comment(target, text.trim(), reply_to).await?;
        thread.insert(comment);
    }

    for node in thread.roots() {
        println!("[{}] {}: {}", node.comment.id, node.comment.author.username, node.comment.text);
        for reply in &node.replies {
            println!("    [{}] {}: {}", reply.id, reply.author.username, reply.text);
        }
    }
    Ok(())
}

fn config(state: &AppState, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = state.database.get_settings()?;
            println!("api_url  = {}", state.config.api_url);
            println!("live_url = {}", state.config.live_url);
            if let Some(path) = state.database.path() {
                println!("database = {}", path.display());
            }
            if let Some(name) = settings.last_username {
                println!("user     = {name}");
            }
        }
        ConfigAction::Set { api_url, live_url } => {
            let mut settings = state.database.get_settings()?;
            if let Some(url) = api_url {
                settings.api_url = url;
            }
            if let Some(url) = live_url {
                settings.live_url = url;
            }
            state.database.update_settings(&settings)?;
            println!("Settings saved");
        }
    }
    Ok(())
}

fn post_draft(
    caption: String,
    images: &[PathBuf],
    aspect: Option<AspectPreset>,
    zoom: Option<f32>,
    filters: &[Filter],
) -> Result<PublishDraft> {
    if images.is_empty() {
        return Ok(PublishDraft {
            kind: DraftKind::Post,
            content: caption,
            media: Vec::new(),
        });
    }

    let files = images
        .iter()
        .map(|path| {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok((file_name(path), data))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut edit = EditSession::new();
    edit.select(files)?;

    if aspect.is_some() || zoom.is_some() {
        let sizes: Vec<(u32, u32)> = edit
            .images()
            .iter()
            .map(|img| (img.image.width(), img.image.height()))
            .collect();
        for (i, (w, h)) in sizes.into_iter().enumerate() {
            let spec = match aspect {
                Some(preset) => CropSpec::preset(preset, w, h),
                None => CropSpec::new(CropRect::full(w, h)),
            };
            edit.set_crop(i, spec.with_zoom(zoom.unwrap_or(1.0)))?;
        }
    }

    edit.advance()?;
    for (i, filter) in filters.iter().enumerate() {
        edit.set_filter(i, *filter)?;
    }

    let media = edit
        .finalize()?
        .into_iter()
        .map(MediaBlob::into_upload)
        .collect();

    Ok(PublishDraft {
        kind: DraftKind::Post,
        content: caption,
        media,
    })
}

fn reel_draft(
    caption: String,
    path: &Path,
    duration: Option<f64>,
    trim_start: Option<f64>,
    trim_end: Option<f64>,
) -> Result<PublishDraft> {
    let duration = duration.context("--duration is required with --video")?;
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut draft = VideoDraft::new(file_name(path), Bytes::from(data), duration)?;
    if trim_start.is_some() || trim_end.is_some() {
        draft.set_trim(trim_start.unwrap_or(0.0), trim_end.unwrap_or(duration))?;
    }

    Ok(PublishDraft {
        kind: DraftKind::Reel,
        content: caption,
        media: vec![draft.into_upload()],
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

fn print_message(msg: &Message, me: UserId) {
    let who = if msg.sender == me { "me".to_string() } else { msg.sender.to_string() };
    println!("{} <{who}> {}", msg.timestamp.format("%H:%M"), msg.content);
}

fn print_item(item: &FeedItem) {
    let e = item.engagement();
    println!(
        "{:<10} @{:<16} {:>5} likes {:>4} comments{}{}  {}",
        item.key().to_string(),
        item.author().username,
        e.like_count,
        e.comment_count,
        if e.is_liked { " [liked]" } else { "" },
        if e.is_saved { " [saved]" } else { "" },
        item.content()
    );
}
