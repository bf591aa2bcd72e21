//! Loads the site configuration from a `journal.yaml` project file. The file
//! is found by searching the given directory and then each of its parents,
//! and may point at a theme directory whose `theme.yaml` overrides the
//! built-in templates.

use crate::compose::{Button, CallToAction};
use crate::page::SocialImage;
use crate::render::TemplateFiles;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

const PROJECT_FILE: &str = "journal.yaml";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

#[derive(Deserialize)]
struct Listen(String);
impl Default for Listen {
    fn default() -> Self {
        Listen(String::from("127.0.0.1:8080"))
    }
}

#[derive(Deserialize)]
struct ButtonEntry {
    text: String,
    path: String,
}

#[derive(Deserialize)]
struct Dismissible {
    cookie_expires: Option<DateTime<Utc>>,
}

/// A call to action as written in the project file.
#[derive(Deserialize)]
struct CallToActionEntry {
    id: String,
    text: String,
    image: Url,
    button: ButtonEntry,

    /// A regular expression the request path must match.
    #[serde(default)]
    path: Option<String>,

    /// The call to action is hidden before this time.
    #[serde(default)]
    from: Option<DateTime<Utc>>,

    #[serde(default)]
    needs_js: bool,

    #[serde(default)]
    dismissible: Option<Dismissible>,
}

impl CallToActionEntry {
    fn compile(self) -> Result<CallToAction> {
        let path = match &self.path {
            None => None,
            Some(pattern) => Some(
                Regex::new(pattern)
                    .with_context(|| format!("call to action `{}`: invalid path", self.id))?,
            ),
        };
        Ok(CallToAction {
            id: self.id,
            text: self.text,
            image: self.image,
            button: Button {
                text: self.button.text,
                path: self.button.path,
            },
            path,
            from: self.from,
            needs_js: self.needs_js,
            cookie_expires: self.dismissible.and_then(|d| d.cookie_expires),
        })
    }
}

#[derive(Deserialize)]
struct Project {
    /// The root of the content API.
    pub api_url: Url,

    /// The public root of this site, used for absolute URLs in metadata.
    pub site_url: Url,

    #[serde(default)]
    pub listen: Listen,

    #[serde(default)]
    pub events_per_page: PageSize,

    #[serde(default)]
    pub social_image: Option<SocialImage>,

    #[serde(default)]
    pub calls_to_action: Vec<CallToActionEntry>,

    /// A theme directory, relative to the project file.
    #[serde(default)]
    pub theme: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct Theme {
    #[serde(default)]
    layout: Vec<PathBuf>,
    #[serde(default)]
    event: Vec<PathBuf>,
    #[serde(default)]
    job_advert: Vec<PathBuf>,
    #[serde(default)]
    listing: Vec<PathBuf>,
    #[serde(default)]
    publishing: Vec<PathBuf>,
    #[serde(default)]
    archive: Vec<PathBuf>,
}

pub struct Config {
    pub api_url: Url,
    pub site_url: Url,
    pub listen: String,
    pub events_per_page: usize,
    pub social_image: SocialImage,
    pub calls_to_action: Vec<CallToAction>,

    /// Template overrides; empty lists fall back to the built-in templates.
    pub templates: TemplateFiles,
}

impl Config {
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            match Config::from_project_file(&path) {
                Ok(config) => Ok(config),
                Err(e) => Err(anyhow!("Loading configuration: {:?}", e)),
            }
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => Config::from_project(project, project_root),
        }
    }

    fn from_project(project: Project, project_root: &Path) -> Result<Config> {
        let templates = match &project.theme {
            None => TemplateFiles::default(),
            Some(theme_dir) => {
                let theme_dir = project_root.join(theme_dir);
                let theme: Theme =
                    serde_yaml::from_reader(open(&theme_dir.join("theme.yaml"), "theme")?)?;
                let resolve = |paths: Vec<PathBuf>| -> Vec<PathBuf> {
                    paths.iter().map(|relpath| theme_dir.join(relpath)).collect()
                };
                TemplateFiles {
                    layout: resolve(theme.layout),
                    event: resolve(theme.event),
                    job_advert: resolve(theme.job_advert),
                    listing: resolve(theme.listing),
                    publishing: resolve(theme.publishing),
                    archive: resolve(theme.archive),
                }
            }
        };

        Ok(Config {
            api_url: project.api_url,
            site_url: project.site_url,
            listen: project.listen.0,
            events_per_page: project.events_per_page.0,
            social_image: project.social_image.unwrap_or_default(),
            calls_to_action: project
                .calls_to_action
                .into_iter()
                .map(CallToActionEntry::compile)
                .collect::<Result<Vec<CallToAction>>>()?,
            templates,
        })
    }
}

fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}
