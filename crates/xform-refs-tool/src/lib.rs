//! Command-line driver for the xform-refs engine.
//!
//! ## Commands
//!
//! - `xml`: print the document's `<itext>` block
//! - `export-tsv`: print the bulk translation sheet
//! - `import-tsv`: apply a translation sheet and print the new `<itext>` block
//! - `rename`: rename a node and print what was rewritten
//! - `refs`: list tracked references and unresolved-reference warnings

pub mod document;

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use xform_refs::{EngineConfig, FormSession, FormTree};

use crate::document::DocumentSpec;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by all commands.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// JSON document description
    #[arg(short, long)]
    pub doc: PathBuf,

    /// Engine configuration JSON (defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the itext XML block
    Xml(CommonArgs),
    /// Print the tab-delimited translation sheet
    ExportTsv(CommonArgs),
    /// Import a tab-delimited translation sheet
    ImportTsv {
        #[command(flatten)]
        common: CommonArgs,
        /// Sheet to import
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Rename a node and report rewritten properties and translations
    Rename {
        #[command(flatten)]
        common: CommonArgs,
        /// Absolute path of the node, e.g. /data/age
        #[arg(long)]
        path: String,
        /// New node name
        #[arg(long)]
        name: String,
    },
    /// List tracked references
    Refs(CommonArgs),
}

impl CommonArgs {
    fn open(&self) -> Result<FormSession> {
        debug!(doc = %self.doc.display(), "opening document");
        let config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        DocumentSpec::load(&self.doc)?.open(config)
    }
}

/// Runs one command, writing its report to `out`.
pub fn run(args: Arguments, out: &mut impl Write) -> Result<()> {
    match args.command {
        Command::Xml(common) => {
            let mut session = common.open()?;
            writeln!(out, "{}", session.write_itext_xml()?)?;
        }
        Command::ExportTsv(common) => {
            let mut session = common.open()?;
            write!(out, "{}", session.export_translations()?)?;
        }
        Command::ImportTsv { common, input } => {
            let mut session = common.open()?;
            let sheet = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let summary = session.import_translations(&sheet)?;
            writeln!(out, "rows: {}, cells: {}", summary.rows, summary.cells)?;
            for id in &summary.skipped_ids {
                writeln!(out, "skipped: {id}")?;
            }
            writeln!(out, "{}", session.write_itext_xml()?)?;
        }
        Command::Rename { common, path, name } => {
            let mut session = common.open()?;
            let node = session
                .form()
                .resolve_path(&path)
                .ok_or_else(|| anyhow!("no node at {path}"))?;
            let rewritten = session.rename_node(node, &name)?;
            for (source, property) in rewritten {
                let source_path = session.form().absolute_path(source).unwrap_or_default();
                let value = session.form().property(source, &property).unwrap_or_default();
                writeln!(out, "{source_path} {property}: {value}")?;
            }
            writeln!(out, "{}", session.write_itext_xml()?)?;
        }
        Command::Refs(common) => {
            let session = common.open()?;
            for reference in session.graph().records() {
                let target = reference
                    .target
                    .and_then(|t| session.form().absolute_path(t))
                    .unwrap_or_else(|| "?".to_string());
                writeln!(
                    out,
                    "{} {} {} -> {}",
                    reference.source_path, reference.property, reference.path, target
                )?;
            }
            for warning in session.warnings() {
                writeln!(out, "{warning}")?;
            }
        }
    }
    Ok(())
}
