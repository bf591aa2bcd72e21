use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use journal::api::HttpContentApi;
use journal::compose::{Composer, Outcome};
use journal::config::Config;
use journal::render::Renderer;
use journal::server::{self, Site};
use journal::url::UrlGenerator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "journal")]
#[command(about = "Serves journal pages composed from a content API")]
struct Args {
    /// Directory to search for `journal.yaml` (defaults to the current
    /// directory)
    #[arg(short, long)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to listen on, overriding the project file
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Print an article's BibTeX record
    Bibtex {
        /// The article id, e.g. 00001
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "journal=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let project = match args.project {
        Some(project) => project,
        None => std::env::current_dir()?,
    };
    let config = Config::from_directory(&project)?;
    info!(api_url = %config.api_url, site_url = %config.site_url, "Loaded configuration");

    let composer = Composer::new(
        Arc::new(HttpContentApi::new(config.api_url.clone())),
        UrlGenerator::new(config.site_url.clone()),
        config.calls_to_action,
    )
    .with_social_image(config.social_image)
    .with_events_per_page(config.events_per_page);

    match args.command {
        Command::Serve { listen } => {
            let site = Site {
                composer,
                renderer: Renderer::new(&config.templates)?,
            };
            let listen = listen.unwrap_or(config.listen);
            server::run_server(site, &listen).await?;
            Ok(())
        }
        Command::Bibtex { id } => match composer.bibtex(&id).await {
            Outcome::Rendered(record) => {
                print!("{}", record);
                Ok(())
            }
            Outcome::NotFound => Err(anyhow!("Article `{}` can't be cited", id)),
            Outcome::Redirect { location, .. } => Err(anyhow!("Redirected to `{}`", location)),
            Outcome::Error(err) => Err(err.into()),
        },
    }
}
