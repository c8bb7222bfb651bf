use regex::Regex;
use std::collections::HashSet;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::LookupConfig;
use crate::domain::is_reverse_name;
use crate::error::{Result, RollupError};
use crate::stats::MappingRow;

/// Resolves one reverse name to its forward name.
///
/// `Ok(None)` means the resolver ran but produced no answer.
pub trait ReverseLookup {
    fn lookup(&self, name: &str) -> Result<Option<String>>;
}

/// Runs an external utility once per name and reads the token that
/// follows a fixed marker in its output.
pub struct CommandLookup {
    program: String,
    args: Vec<String>,
    marker: Regex,
}

impl CommandLookup {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let pattern = format!(r"{}\s+(\S+)", regex::escape(config.marker.trim()));
        let marker = Regex::new(&pattern)
            .map_err(|e| RollupError::Config(format!("lookup marker: {}", e)))?;
        Ok(Self {
            program: config.program.clone(),
            args: config.args.clone(),
            marker,
        })
    }

    pub fn parse_output(&self, stdout: &str) -> Option<String> {
        self.marker
            .captures(stdout)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl ReverseLookup for CommandLookup {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(name)
            .output()
            .map_err(|e| RollupError::upstream(&self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RollupError::upstream(
                &self.program,
                format!("{} for {}: {}", output.status, name, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(action = "output", component = "reverse_lookup", name, stdout = %stdout.trim(), "Lookup output");
        Ok(self.parse_output(&stdout))
    }
}

/// Looks up every reverse name among `names`, once per distinct name.
///
/// Failures and unanswered lookups are logged and skipped.
pub fn resolve_all<'a, I, L>(names: I, resolver: &L) -> Vec<MappingRow>
where
    I: IntoIterator<Item = &'a str>,
    L: ReverseLookup + ?Sized,
{
    let start_time = Instant::now();
    info!(action = "start", component = "reverse_lookup", "Resolving reverse names");

    let mut seen = HashSet::new();
    let mut mapping = Vec::new();
    let mut failed = 0usize;

    for name in names {
        if !is_reverse_name(name) || !seen.insert(name) {
            continue;
        }
        match resolver.lookup(name) {
            Ok(Some(forward)) => {
                debug!(action = "resolved", component = "reverse_lookup", name, forward = %forward, "Resolved reverse name");
                mapping.push(MappingRow {
                    reverse: name.to_string(),
                    forward,
                });
            }
            Ok(None) => {
                failed += 1;
                warn!(action = "skip", component = "reverse_lookup", name, "Lookup output has no marker");
            }
            Err(e) => {
                failed += 1;
                warn!(action = "skip", component = "reverse_lookup", name, error = %e, "Lookup failed");
            }
        }
    }

    info!(
        action = "complete",
        component = "reverse_lookup",
        attempted = seen.len(),
        resolved = mapping.len(),
        failed,
        duration_ms = start_time.elapsed().as_millis(),
        "Reverse lookups completed"
    );
    mapping
}
