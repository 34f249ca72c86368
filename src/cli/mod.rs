pub mod container;
pub mod migrate;
pub mod serve;
pub mod user;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gallery")]
#[command(version)]
#[command(about = "Media gallery API server", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "gallery.toml", env = "GALLERY_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    Migrate {
        #[command(subcommand)]
        command: Option<MigrateCommand>,
    },
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Album {
        #[command(subcommand)]
        command: AlbumCommand,
    },
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
}

#[derive(Subcommand)]
pub enum MigrateCommand {
    /// Show applied and pending migrations
    Status,
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user and print an API token for it
    Add {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "member")]
        role: String,
    },
    List,
    /// Issue another API token for an existing user
    Token { username: String },
}

#[derive(Subcommand)]
pub enum AlbumCommand {
    Add {
        #[arg(long)]
        title: String,
        /// Username of the album owner
        #[arg(long)]
        owner: String,
        #[arg(long, default_value = "public")]
        view: String,
        #[arg(long, default_value = "members")]
        add: String,
    },
    List,
}

#[derive(Subcommand)]
pub enum CategoryCommand {
    Add {
        #[arg(long)]
        title: String,
        #[arg(long = "type", default_value = "media")]
        category_type: String,
    },
    List,
}
