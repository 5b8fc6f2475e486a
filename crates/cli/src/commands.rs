//! Subcommand implementations
//!
//! Scripts are compiled on scoped worker threads that share the session's
//! registry; results are printed in the order the files were given.

use crate::Session;
use anyhow::{Context, Result};
use gridscript_compiler::{CompileReport, CompiledUnit, Compiler, Vm};
use gridscript_registry::ScriptContext;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};

/// What one worker produced for one file
struct Outcome {
    ok: bool,
    stdout: String,
    stderr: String,
}

impl Outcome {
    fn failed(stderr: String) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr,
        }
    }
}

/// Run `job` over every file concurrently and print the outcomes in order
fn for_each_file<F>(files: &[PathBuf], job: F) -> Result<bool>
where
    F: Fn(&Path, &str) -> Outcome + Sync,
{
    let outcomes: Mutex<Vec<Option<Outcome>>> = Mutex::new((0..files.len()).map(|_| None).collect());

    // Read everything up front so I/O errors abort before any work starts
    let sources = files
        .iter()
        .map(|path| fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    thread::scope(|scope| {
        for (index, (path, source)) in files.iter().zip(&sources).enumerate() {
            let job = &job;
            let outcomes = &outcomes;
            scope.spawn(move || {
                debug!(file = %path.display(), "worker started");
                let outcome = job(path, source);
                outcomes.lock()[index] = Some(outcome);
            });
        }
    });

    let mut all_ok = true;
    for outcome in outcomes.into_inner().into_iter().flatten() {
        print!("{}", outcome.stdout);
        eprint!("{}", outcome.stderr);
        all_ok &= outcome.ok;
    }
    Ok(all_ok)
}

fn report_failure(path: &Path, report: &CompileReport, json: bool) -> Outcome {
    if json {
        return match serde_json::to_string(report) {
            Ok(text) => Outcome {
                ok: false,
                stdout: format!("{}\n", text),
                stderr: String::new(),
            },
            Err(e) => Outcome::failed(format!("{}: failed to encode diagnostics: {}\n", path.display(), e)),
        };
    }
    Outcome::failed(report.render(&path.display().to_string()))
}

/// `gridscriptc check`
pub fn check(session: &Session, files: &[PathBuf], json: bool) -> Result<bool> {
    let compiler = Compiler::with_options(&session.registry, session.options.clone());
    let directives = BTreeMap::new();

    let ok = for_each_file(files, |path, source| match compiler.check(source, &directives) {
        Ok(()) => Outcome {
            ok: true,
            stdout: if json { "[]\n".into() } else { format!("{}: ok\n", path.display()) },
            stderr: String::new(),
        },
        Err(report) => report_failure(path, &report, json),
    })?;

    info!(files = files.len(), ok, "check finished");
    Ok(ok)
}

/// `gridscriptc compile`
pub fn compile(session: &Session, files: &[PathBuf], disassemble: bool, call_sites: bool, run: bool) -> Result<bool> {
    let compiler = Compiler::with_options(&session.registry, session.options.clone());
    let directives = BTreeMap::new();

    let ok = for_each_file(files, |path, source| match compiler.compile(source, &directives) {
        Ok(unit) => describe(session, path, &unit, disassemble, call_sites, run),
        Err(report) => report_failure(path, &report, false),
    })?;

    info!(files = files.len(), ok, "compile finished");
    Ok(ok)
}

fn describe(session: &Session, path: &Path, unit: &CompiledUnit, disassemble: bool, call_sites: bool, run: bool) -> Outcome {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} globals, {} functions, {} states, {} API calls",
        path.display(),
        unit.globals().len(),
        unit.functions().len(),
        unit.states().len(),
        unit.call_sites().len()
    );

    if disassemble {
        out.push_str(&unit.disassemble());
    }

    if call_sites {
        match serde_json::to_string_pretty(unit.call_sites()) {
            Ok(text) => {
                out.push_str(&text);
                out.push('\n');
            }
            Err(e) => return Outcome::failed(format!("{}: failed to encode call sites: {}\n", path.display(), e)),
        }
    }

    if run {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Object".into());
        let result = Vm::new(unit, &session.registry, ScriptContext::new(name)).and_then(|mut vm| {
            vm.start()?;
            Ok(vm)
        });
        match result {
            Ok(mut vm) => {
                for line in vm.context_mut().take_chat() {
                    let _ = writeln!(out, "[{}] {}", line.channel, line.text);
                }
                debug!(file = %path.display(), energy = vm.energy_used(), "script ran");
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "script failed");
                return Outcome {
                    ok: false,
                    stdout: out,
                    stderr: format!("{}: runtime error: {}\n", path.display(), e),
                };
            }
        }
    }

    Outcome {
        ok: true,
        stdout: out,
        stderr: String::new(),
    }
}

/// `gridscriptc manifest`
pub fn manifest(session: &Session, pretty: bool) -> Result<()> {
    let json = session
        .registry
        .manifest()
        .to_json(pretty)
        .context("failed to encode capability manifest")?;
    println!("{}", json);
    Ok(())
}
