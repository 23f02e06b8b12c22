use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use minibit::client::{Client, MetadataSource};
use minibit::metainfo::{MagnetLink, Metainfo};
use minibit::peer::{PeerId, PeerSession};
use minibit::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "minibit", about = "A minimal BitTorrent client", version)]
struct Cli {
    /// Port reported to trackers
    #[arg(long, global = true, env = "MINIBIT_PORT", default_value_t = minibit::constants::DEFAULT_PORT)]
    port: u16,

    /// Seconds to wait for a TCP connection to a peer
    #[arg(long, global = true, value_name = "SECS", env = "MINIBIT_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Seconds to wait for the next message from a peer
    #[arg(long, global = true, value_name = "SECS", env = "MINIBIT_READ_TIMEOUT")]
    read_timeout: Option<u64>,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "snake_case")]
enum Command {
    /// Decode a bencoded value and print it as JSON
    Decode { value: String },
    /// Print the metadata of a torrent file
    Info { torrent: PathBuf },
    /// List the peers the tracker returns for a torrent file
    Peers { torrent: PathBuf },
    /// Handshake with a peer and print its peer id
    Handshake { torrent: PathBuf, peer: SocketAddr },
    /// Download and verify a single piece
    DownloadPiece {
        #[arg(short, long)]
        output: PathBuf,
        torrent: PathBuf,
        piece: u32,
    },
    /// Download the whole file
    Download {
        #[arg(short, long)]
        output: PathBuf,
        torrent: PathBuf,
    },
    /// Print the tracker and info hash of a magnet link
    MagnetParse { link: String },
    /// Handshake with a peer from a magnet link and print its extension id
    MagnetHandshake { link: String },
    /// Fetch and print the metadata behind a magnet link
    MagnetInfo { link: String },
    /// Download and verify a single piece of a magnet link
    MagnetDownloadPiece {
        #[arg(short, long)]
        output: PathBuf,
        link: String,
        piece: u32,
    },
    /// Download the whole file of a magnet link
    MagnetDownload {
        #[arg(short, long)]
        output: PathBuf,
        link: String,
    },
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default().with_port(self.port);
        if let Some(secs) = self.connect_timeout {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.read_timeout {
            config = config.with_read_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let client = Client::new(cli.config());
    match cli.command {
        Command::Decode { value } => {
            let (decoded, _) = minibit::bencode::decode_prefix(value.as_bytes())
                .context("invalid bencode")?;
            println!("{}", serde_json::to_string(&decoded.to_json())?);
        }
        Command::Info { torrent } => print_metainfo(&load_torrent(&torrent)?),
        Command::Peers { torrent } => {
            let source = MetadataSource::Torrent(load_torrent(&torrent)?);
            for peer in client.announce(&source).await? {
                println!("{}", peer);
            }
        }
        Command::Handshake { torrent, peer } => {
            let metainfo = load_torrent(&torrent)?;
            let mut session = client.dial(peer, metainfo.info_hash).await?;
            let remote = session
                .handshake(false)
                .await
                .with_context(|| format!("handshake with {} failed", peer))?;
            print_peer_id(&remote);
        }
        Command::DownloadPiece {
            output,
            torrent,
            piece,
        } => {
            let source = MetadataSource::Torrent(load_torrent(&torrent)?);
            download_piece(&client, &source, piece, &output).await?;
        }
        Command::Download { output, torrent } => {
            let source = MetadataSource::Torrent(load_torrent(&torrent)?);
            download(&client, &source, &output).await?;
        }
        Command::MagnetParse { link } => {
            let magnet = parse_magnet(&link)?;
            println!("Tracker URL: {}", magnet.tracker().unwrap_or_default());
            println!("Info Hash: {}", magnet.info_hash);
        }
        Command::MagnetHandshake { link } => {
            let source = MetadataSource::Magnet(parse_magnet(&link)?);
            let (mut session, remote) = first_peer(&client, &source).await?;
            print_peer_id(&remote);
            let id = session.extension_handshake().await?;
            println!("Peer Metadata Extension ID: {}", id);
        }
        Command::MagnetInfo { link } => {
            let source = MetadataSource::Magnet(parse_magnet(&link)?);
            let (_session, metainfo) = client.connect(&source).await?;
            print_metainfo(&metainfo);
        }
        Command::MagnetDownloadPiece {
            output,
            link,
            piece,
        } => {
            let source = MetadataSource::Magnet(parse_magnet(&link)?);
            download_piece(&client, &source, piece, &output).await?;
        }
        Command::MagnetDownload { output, link } => {
            let source = MetadataSource::Magnet(parse_magnet(&link)?);
            download(&client, &source, &output).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_torrent(path: &Path) -> Result<Metainfo> {
    Metainfo::from_file(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_magnet(link: &str) -> Result<MagnetLink> {
    MagnetLink::parse(link).context("invalid magnet link")
}

fn print_metainfo(metainfo: &Metainfo) {
    println!("Tracker URL: {}", metainfo.announce);
    println!("Length: {}", metainfo.info.length);
    println!("Info Hash: {}", metainfo.info_hash);
    println!("Piece Length: {}", metainfo.info.piece_length);
    println!("Piece Hashes:");
    for digest in &metainfo.info.pieces {
        println!("{}", hex::encode(digest));
    }
}

fn print_peer_id(peer_id: &PeerId) {
    println!("Peer ID: {}", peer_id);
}

/// Announces and returns the first peer that completes the handshake steps.
async fn first_peer(
    client: &Client,
    source: &MetadataSource,
) -> Result<(PeerSession<TcpStream>, PeerId)> {
    for addr in client.announce(source).await? {
        let attempt = async {
            let mut session = client.dial(addr, source.info_hash()).await?;
            let remote = client.negotiate(&mut session, source).await?;
            Ok::<_, minibit::ClientError>((session, remote))
        };
        match attempt.await {
            Ok(found) => return Ok(found),
            Err(e) => warn!(%addr, error = %e, "peer failed"),
        }
    }
    bail!("no peer completed the handshake")
}

async fn download_piece(
    client: &Client,
    source: &MetadataSource,
    piece: u32,
    output: &Path,
) -> Result<()> {
    let (mut session, metainfo) = client.connect(source).await?;
    let data = client
        .download_piece(&mut session, &metainfo.info, piece)
        .await
        .with_context(|| format!("failed to download piece {}", piece))?;
    tokio::fs::write(output, &data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Piece {} downloaded to {}", piece, output.display());
    Ok(())
}

async fn download(client: &Client, source: &MetadataSource, output: &Path) -> Result<()> {
    let (mut session, metainfo) = client.connect(source).await?;
    client
        .download_file(&mut session, &metainfo.info, output)
        .await
        .with_context(|| format!("failed to download {}", metainfo.info.name))?;
    println!("File downloaded to {}", output.display());
    Ok(())
}
