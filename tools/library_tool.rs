use std::env;
use std::path::PathBuf;

use common::{PlaylistId, Track, TrackId};
use library::config::{config_path_from_env, load_or_create_config, resolve_music_root};
use library::MusicLibrary;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: library_tool <command>

commands:
  scan [DIR]                   scan DIR, or music_root from the config
  import FILE...               add individual files
  remove TRACK_ID              drop a track from the library
  stats                        track, album and artist counts
  albums                       list albums
  artists                      list artists
  search QUERY                 search titles, artists and albums
  playlists                    list playlists
  playlist-create NAME [QUERY] new playlist, seeded with search results
  playlist-show ID             list playlist tracks
  playlist-rename ID NAME      rename a playlist
  playlist-delete ID           delete a playlist";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Wrote default config to {:?}", config_path);
    }
    let mut library = MusicLibrary::open_path(&config_path, &config).await?;

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("stats");
    let rest = args.get(1..).unwrap_or(&[]);

    match command {
        "scan" => {
            let root = match rest.first() {
                Some(dir) => PathBuf::from(dir),
                None => resolve_music_root(&config_path, &config.music_root)
                    .ok_or("music_root not set and no directory argument")?,
            };
            let summary = library.scan_directory(root).await?;
            println!(
                "Added {} tracks ({} already indexed, {} failed)",
                summary.added, summary.skipped, summary.failed
            );
        }
        "import" => {
            if rest.is_empty() {
                return Err("import needs at least one file".into());
            }
            let paths = rest.iter().map(PathBuf::from).collect();
            let summary = library.add_files(paths).await?;
            println!(
                "Added {} tracks ({} already indexed, {} failed)",
                summary.added, summary.skipped, summary.failed
            );
        }
        "remove" => {
            let id = rest.first().ok_or("remove needs a track id")?;
            let track = library.remove_track(&TrackId::from(id.as_str()))?;
            println!("Removed {}", track.location.display());
        }
        "stats" => {
            println!(
                "{} artists, {} albums, {} tracks, {} playlists",
                library.artists().len(),
                library.albums().len(),
                library.tracks().len(),
                library.playlists().len()
            );
        }
        "albums" => {
            for album in library.albums().iter() {
                let year = album.year.map(|year| format!(" ({})", year)).unwrap_or_default();
                println!(
                    "{} - {}{} [{} tracks, {}]",
                    album.artist,
                    album.title,
                    year,
                    album.tracks.len(),
                    format_duration(album.duration)
                );
            }
        }
        "artists" => {
            for artist in library.artists().iter() {
                println!(
                    "{} [{} albums, {} tracks]",
                    artist.name,
                    artist.albums.len(),
                    artist.track_count()
                );
            }
        }
        "search" => {
            let query = rest.join(" ");
            for track in library.search(&query) {
                print_track(&track);
            }
        }
        "playlists" => {
            for playlist in library.playlists().iter() {
                println!(
                    "{} {} [{} tracks]",
                    playlist.id(),
                    playlist.name(),
                    playlist.track_ids().len()
                );
            }
        }
        "playlist-create" => {
            let name = rest.first().ok_or("playlist-create needs a name")?;
            let seed: Vec<TrackId> = match rest.get(1..) {
                Some(words) if !words.is_empty() => library
                    .search(&words.join(" "))
                    .into_iter()
                    .map(|track| track.id)
                    .collect(),
                _ => Vec::new(),
            };
            let playlist = library.create_playlist(name, seed)?;
            println!(
                "Created {} {} [{} tracks]",
                playlist.id(),
                playlist.name(),
                playlist.track_ids().len()
            );
        }
        "playlist-show" => {
            let id = parse_playlist_id(rest.first())?;
            for track in library.playlist_tracks(id)? {
                print_track(&track);
            }
        }
        "playlist-rename" => {
            let id = parse_playlist_id(rest.first())?;
            let name = rest.get(1).ok_or("playlist-rename needs a new name")?;
            library.rename_playlist(id, name)?;
        }
        "playlist-delete" => {
            let id = parse_playlist_id(rest.first())?;
            library.delete_playlist(id)?;
        }
        _ => {
            eprintln!("{}", USAGE);
            return Err(format!("unknown command: {}", command).into());
        }
    }

    Ok(())
}

fn parse_playlist_id(value: Option<&String>) -> Result<PlaylistId, Box<dyn std::error::Error>> {
    let value = value.ok_or("missing playlist id")?;
    Ok(PlaylistId::parse_str(value)?)
}

fn print_track(track: &Track) {
    println!(
        "{}  {} - {} ({}) {}",
        track.id,
        track.artist,
        track.title,
        track.album,
        format_duration(track.duration)
    );
}

fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
