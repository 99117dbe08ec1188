//! Command-line viewer: loads fragments and prints what the consumer receives.

use crate::config::{AttachTiming, ViewerConfig};
use crate::error::Result;
use crate::fragment::{self, Fragment};
use crate::gate::ConsumerHandle;
use crate::registry::GlobalRegistry;
use crate::session;
use clap::Parser;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Parser)]
#[command(name = "rustdoc-implementors")]
#[command(about = "Merge rustdoc implementor fragments and list trait implementors", long_about = None)]
pub struct Cli {
    /// Fragment files, registered in the order given
    pub fragments: Vec<PathBuf>,

    /// Directory scanned (recursively) for `*.json` fragments
    #[arg(short, long, env = "RUSTDOC_IMPLEMENTORS_DIR")]
    pub dir: Option<PathBuf>,

    /// TOML config providing default fragments, directory and attach timing
    #[arg(short, long, env = "RUSTDOC_IMPLEMENTORS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only list implementors of this trait id
    #[arg(short = 't', long = "trait")]
    pub trait_id: Option<String>,

    /// When the printing consumer attaches
    #[arg(short, long, value_enum)]
    pub attach: Option<AttachTiming>,

    /// Print deliveries as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Combine CLI flags with the optional config file.
    ///
    /// Config fragments come first, then CLI fragments, then the scanned
    /// directory. CLI flags win over config values.
    pub fn resolve(&self) -> Result<ResolvedOptions> {
        let config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };

        let mut fragments = config.fragments;
        fragments.extend(self.fragments.iter().cloned());
        if let Some(dir) = self.dir.as_ref().or(config.fragment_dir.as_ref()) {
            fragments.extend(fragment::discover_fragments(dir));
        }

        Ok(ResolvedOptions {
            fragments,
            attach: self.attach.or(config.attach).unwrap_or_default(),
            trait_id: self.trait_id.clone(),
            json: self.json,
        })
    }
}

/// Effective options after merging CLI and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub fragments: Vec<PathBuf>,
    pub attach: AttachTiming,
    pub trait_id: Option<String>,
    pub json: bool,
}

/// Load every fragment into the process-wide session and print deliveries.
///
/// Returns the number of deliveries the printing consumer received.
pub fn run(options: &ResolvedOptions) -> Result<usize> {
    let deliveries = Arc::new(AtomicUsize::new(0));
    let consumer = printing_consumer(options, Arc::clone(&deliveries));

    if options.attach == AttachTiming::Early {
        session::attach_consumer(consumer.clone());
    }

    let mut skipped = 0;
    for fragment in fragment::load_fragments(&options.fragments) {
        let Fragment {
            source,
            mapping,
            skipped: dropped,
        } = fragment;
        skipped += dropped;
        if let Some(source) = source {
            tracing::debug!("Registering {}", source.display());
        }
        session::register_implementors(mapping);
    }

    if options.attach == AttachTiming::Late {
        session::attach_consumer(consumer);
    }

    let registry = session::current_registry();
    tracing::info!(
        "Merged {} fragments: {} modules, {} records ({} malformed records skipped)",
        session::with_session(session::ImplementorSession::fragment_count),
        registry.module_count(),
        registry.record_count(),
        skipped
    );

    Ok(deliveries.load(Ordering::SeqCst))
}

fn printing_consumer(options: &ResolvedOptions, deliveries: Arc<AtomicUsize>) -> ConsumerHandle {
    let trait_id = options.trait_id.clone();
    let json = options.json;

    ConsumerHandle::new(move |registry| {
        let delivery = deliveries.fetch_add(1, Ordering::SeqCst) + 1;
        match render(&registry, trait_id.as_deref(), json) {
            Ok(output) => {
                println!("# delivery {}", delivery);
                print!("{}", output);
            }
            Err(e) => tracing::error!("Failed to render registry: {:#}", e),
        }
    })
}

#[derive(Serialize)]
struct ImplementorRow<'a> {
    module: &'a str,
    implementor: &'a str,
    generics: &'a [String],
}

/// Render a registry, or the implementors of one trait, as text or JSON.
pub fn render(registry: &GlobalRegistry, trait_id: Option<&str>, json: bool) -> Result<String> {
    if let Some(trait_id) = trait_id {
        let rows: Vec<ImplementorRow<'_>> = registry
            .implementors_of(trait_id)
            .map(|(module, record)| ImplementorRow {
                module: module.as_str(),
                implementor: record.implementor_id(),
                generics: record.generic_parameters(),
            })
            .collect();

        if json {
            return Ok(serde_json::to_string_pretty(&rows)? + "\n");
        }

        let mut output = String::new();
        if rows.is_empty() {
            writeln!(output, "No implementors of {}", trait_id)?;
        }
        for row in rows {
            if row.generics.is_empty() {
                writeln!(output, "{}: {}", row.module, row.implementor)?;
            } else {
                writeln!(
                    output,
                    "{}: {}<{}>",
                    row.module,
                    row.implementor,
                    row.generics.join(", ")
                )?;
            }
        }
        return Ok(output);
    }

    if json {
        return Ok(serde_json::to_string_pretty(registry)? + "\n");
    }

    let mut output = String::new();
    for (module, records) in registry.modules() {
        writeln!(output, "{} ({} implementors)", module, records.len())?;
        for record in records {
            writeln!(output, "  {} for {}", record.trait_id(), record.implementor_id())?;
        }
    }
    Ok(output)
}
