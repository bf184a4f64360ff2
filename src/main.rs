use clap::Parser;
use orpheon_player::commands::{playback_commands, queue_commands, Command, HELP};
use orpheon_player::source::fs::FileLibrary;
use orpheon_player::source::http::HttpLibrary;
use orpheon_player::{
    AppError, AppResult, ContentSource, CpalBackend, Player, PlayerConfig, TrackCatalog,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "orpheon-player", about = "Stream and play tracks from an Orpheon library")]
struct Args {
    /// Local directory of `<track-id>.mp3` files
    #[arg(long, conflicts_with = "api")]
    media_dir: Option<PathBuf>,

    /// Base URL of the content API, e.g. http://localhost:8080/api/v1
    #[arg(long)]
    api: Option<String>,

    /// Config file (defaults to ~/.orpheon/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start the next track automatically when one finishes
    #[arg(long)]
    auto_advance: bool,

    /// Container/codec of the stored audio, used as the decoder probe hint
    #[arg(long, default_value = "mp3")]
    codec: String,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,

    /// Tracks to queue and start playing
    track_ids: Vec<String>,
}

#[tokio::main]
async fn main() {
    orpheon_player::init_logging();

    if let Err(e) = run(Args::parse()).await {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AppResult<()> {
    let mut config = PlayerConfig::load_or_default(args.config.as_deref());
    config.validate()?;
    if args.auto_advance {
        config.auto_advance = true;
    }

    if args.media_dir.is_some() {
        config.media_dir = args.media_dir;
        config.api_base_url = None;
    } else if args.api.is_some() {
        config.api_base_url = args.api;
        config.media_dir = None;
    }

    if args.save_config {
        match args.config.as_deref() {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        log::info!("Saved config");
    }

    let backend = Arc::new(CpalBackend::new(config.volume).with_codec_hint(Some(args.codec)));
    let (player, library) = match (config.media_dir.clone(), config.api_base_url.clone()) {
        (Some(dir), _) => {
            let library = Arc::new(FileLibrary::new(dir)?);
            let source: Arc<dyn ContentSource> = library.clone();
            let catalog: Arc<dyn TrackCatalog> = library.clone();
            (
                Player::with_catalog(source, catalog, backend, config),
                Some(library),
            )
        }
        (None, Some(url)) => {
            let library = Arc::new(HttpLibrary::new(&url)?);
            let source: Arc<dyn ContentSource> = library.clone();
            let catalog: Arc<dyn TrackCatalog> = library;
            (Player::with_catalog(source, catalog, backend, config), None)
        }
        (None, None) => {
            return Err(AppError::Config(
                "Either --media-dir or --api is required".into(),
            ))
        }
    };

    if !args.track_ids.is_empty() {
        queue_commands::add_to_queue(&player, &args.track_ids).await?;
        playback_commands::play(&player).await?;
        println!("{}", playback_commands::format_status(&player.snapshot().await));
    }

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = execute(&player, library.as_deref(), command).await {
            println!("error: {}", e);
        }
    }

    player.shutdown().await;
    Ok(())
}

async fn execute(player: &Player, library: Option<&FileLibrary>, command: Command) -> AppResult<()> {
    match command {
        Command::Play => playback_commands::play(player).await?,
        Command::Pause => playback_commands::pause(player).await,
        Command::Resume => playback_commands::resume(player).await,
        Command::Stop => playback_commands::stop(player).await,
        Command::Next => playback_commands::next(player).await,
        Command::Previous => playback_commands::previous(player).await,
        Command::Seek(second) => playback_commands::seek(player, second).await,
        Command::Add(ids) => queue_commands::add_to_queue(player, &ids).await?,
        Command::List => match library {
            Some(library) => {
                for id in queue_commands::list_library(library).await? {
                    println!("{}", id);
                }
            }
            None => println!("listing is only available for a local library"),
        },
        Command::Status => {}
        Command::Queue => println!("{}", queue_commands::format_queue(&player.queue().await)),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }

    println!("{}", playback_commands::format_status(&player.snapshot().await));
    Ok(())
}
