use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use super::DocumentFormat;

/// Where command results are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDestination {
    Stdout,
    File(PathBuf),
}

impl OutputDestination {
    pub fn file(path: impl AsRef<Path>) -> Self {
        OutputDestination::File(path.as_ref().to_path_buf())
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: DocumentFormat,
    pub pretty: bool,
    pub destination: OutputDestination,
}

impl OutputOptions {
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            format,
            pretty: true,
            destination: OutputDestination::Stdout,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_destination(mut self, destination: OutputDestination) -> Self {
        self.destination = destination;
        self
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::new(DocumentFormat::Json)
    }
}

/// Serialize `value` in the configured format.
pub fn render<T: Serialize + ?Sized>(value: &T, options: &OutputOptions) -> Result<String> {
    match options.format {
        DocumentFormat::Json if options.pretty => {
            serde_json::to_string_pretty(value).context("failed to serialize JSON")
        }
        DocumentFormat::Json => serde_json::to_string(value).context("failed to serialize JSON"),
        #[cfg(feature = "yaml")]
        DocumentFormat::Yaml => serde_yaml::to_string(value).context("failed to serialize YAML"),
        #[cfg(feature = "toml")]
        DocumentFormat::Toml => {
            let rendered = if options.pretty {
                toml::to_string_pretty(value)
            } else {
                toml::to_string(value)
            };
            rendered.context("failed to serialize TOML")
        }
    }
}

/// Serialize and write `value` to the configured destination.
pub fn emit<T: Serialize + ?Sized>(value: &T, options: &OutputOptions) -> Result<()> {
    let payload = render(value, options)?;
    match &options.destination {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{payload}").context("failed to write to stdout")?;
            stdout.flush().context("failed to flush stdout")
        }
        OutputDestination::File(path) => fs::write(path, format!("{payload}\n"))
            .with_context(|| format!("failed to write to file {}", path.display())),
    }
}
