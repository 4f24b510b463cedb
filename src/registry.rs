/// Gauge registry file generation.
///
/// The simulation tool reads its precipitation gauges from an XML document:
///
/// ```text
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Gages>
///     <Gage id="Gage-0" name="S_1">
///         <timeSeries file="precipitation.dss" pathname="/1/PRECIP/OBS/01JAN2024/1DAY/OBS/"/>
///     </Gage>
/// </Gages>
/// ```
///
/// `render_registry` is the only place this layout is written down.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::logging::{self, Component};
use crate::model::GaugeEntry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry write to {path} failed: {source}")]
    RegistryWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What `generate` did.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum RegistryOutcome {
    Written { path: PathBuf, gauges: usize },
    /// No gauges; nothing was written.
    Skipped,
    /// The registry file could not be written.
    Failed { path: PathBuf, error: String },
}

/// Renders the registry document for `entries`.
pub fn render_registry(entries: &[GaugeEntry]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Gages>\n");
    for g in entries {
        let _ = writeln!(
            out,
            "    <Gage id=\"{}\" name=\"{}\">",
            escape_attr(&g.id),
            escape_attr(&g.name)
        );
        let _ = writeln!(
            out,
            "        <timeSeries file=\"{}\" pathname=\"{}\"/>",
            escape_attr(&g.file_reference),
            escape_attr(&g.pathname)
        );
        out.push_str("    </Gage>\n");
    }
    out.push_str("</Gages>\n");
    out
}

/// Writes the registry for `entries` to `output_path`.
///
/// An empty `entries` is a no-op: a warning is logged and no file is
/// created. Write errors are returned, not retried.
pub fn generate(entries: &[GaugeEntry], output_path: &Path) -> Result<RegistryOutcome, RegistryError> {
    if entries.is_empty() {
        logging::warn(
            Component::Registry,
            None,
            "No gauge entries were created; registry not written. Check the input table.",
        );
        return Ok(RegistryOutcome::Skipped);
    }

    let document = render_registry(entries);
    write_document(output_path, &document).map_err(|source| {
        logging::error(
            Component::Registry,
            None,
            &format!("Writing {} failed: {}", output_path.display(), source),
        );
        RegistryError::RegistryWriteFailed {
            path: output_path.to_path_buf(),
            source,
        }
    })?;

    logging::info(
        Component::Registry,
        None,
        &format!(
            "Gauge registry written: {} ({} gauges)",
            output_path.display(),
            entries.len()
        ),
    );
    Ok(RegistryOutcome::Written {
        path: output_path.to_path_buf(),
        gauges: entries.len(),
    })
}

fn write_document(path: &Path, document: &str) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(document.as_bytes())?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn escape_attr(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
