//! Line-oriented script engine for generated fixtures
//!
//! A fixture is a list of commands, one per line, optionally followed
//! by an archive of files:
//!
//! ```text
//! # comment
//! [linux] exec dbdeployer deploy single 8.0.29
//! [!minimum_version_for_group:5.6.41] skip 'no group replication'
//! ! find_errors $HOME/sandboxes/msb_8_0_29
//! stdout 'Database installed'
//! -- extra.cnf --
//! [mysqld]
//! ```
//!
//! A `[cond]` guard runs the line only when the condition holds
//! (`[!cond]` when it does not). A leading `!` asks the command to
//! assert the opposite of its normal outcome, a leading `?` lets it fail.
//! Single quotes group words and suppress `$VAR` expansion.
//!
//! Commands beyond the built-ins and conditions beyond the built-ins
//! come from [`EngineParams`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, warn};

use sbtest_common::probe::{file_exists, is_file};

use crate::error::{HarnessError, HarnessResult};

/// A command invokable from a script: `(state, negated, args)`
pub type CommandFn = fn(&mut ScriptState, bool, &[String]) -> HarnessResult<()>;

/// Hook evaluating conditions the engine does not know itself
pub type ConditionFn = fn(&str) -> HarnessResult<bool>;

/// Named commands available to scripts
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandFn>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, cmd: CommandFn) -> &mut Self {
        self.commands.insert(name.into(), cmd);
        self
    }

    pub fn get(&self, name: &str) -> Option<CommandFn> {
        self.commands.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}

/// Extension vocabulary and environment handed to the engine
#[derive(Debug, Clone, Default)]
pub struct EngineParams {
    pub cmds: CommandRegistry,
    pub condition: Option<ConditionFn>,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Negated,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Guard {
    negated: bool,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fragment {
    Expand(String),
    Literal(String),
}

type Word = Vec<Fragment>;

#[derive(Debug, Clone)]
struct ScriptLine {
    number: usize,
    text: String,
    guards: Vec<Guard>,
    mode: Mode,
    words: Vec<Word>,
}

/// A file from the archive section, written into the work directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub data: String,
}

/// A parsed script
#[derive(Debug, Clone)]
pub struct Script {
    pub name: String,
    lines: Vec<ScriptLine>,
    pub files: Vec<ArchiveFile>,
}

impl Script {
    pub fn parse(name: &str, text: &str) -> HarnessResult<Self> {
        let mut lines = Vec::new();
        let mut files: Vec<ArchiveFile> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let number = idx + 1;

            if let Some(file_name) = archive_header(raw) {
                files.push(ArchiveFile {
                    name: file_name.to_string(),
                    data: String::new(),
                });
                continue;
            }
            if let Some(current) = files.last_mut() {
                current.data.push_str(raw);
                current.data.push('\n');
                continue;
            }

            let parse_err = |reason: &str| HarnessError::ScriptParse {
                script: name.to_string(),
                line: number,
                reason: reason.to_string(),
            };

            let mut rest = raw.trim();
            let mut guards = Vec::new();
            while let Some(after) = rest.strip_prefix('[') {
                let close = after
                    .find(']')
                    .ok_or_else(|| parse_err("unterminated condition"))?;
                let cond = after[..close].trim();
                let (negated, cond) = match cond.strip_prefix('!') {
                    Some(c) => (true, c.trim()),
                    None => (false, cond),
                };
                if cond.is_empty() {
                    return Err(parse_err("empty condition"));
                }
                guards.push(Guard {
                    negated,
                    name: cond.to_string(),
                });
                rest = after[close + 1..].trim_start();
            }

            let mut words = tokenize(rest).map_err(|reason| parse_err(&reason))?;
            if words.is_empty() {
                if guards.is_empty() {
                    continue;
                }
                return Err(parse_err("condition without a command"));
            }

            let mode = match words[0].as_slice() {
                [Fragment::Expand(w)] if w == "!" => Mode::Negated,
                [Fragment::Expand(w)] if w == "?" => Mode::Optional,
                _ => Mode::Normal,
            };
            if mode != Mode::Normal {
                words.remove(0);
                if words.is_empty() {
                    return Err(parse_err("missing command after '!' or '?'"));
                }
            }

            lines.push(ScriptLine {
                number,
                text: raw.trim().to_string(),
                guards,
                mode,
                words,
            });
        }

        Ok(Self {
            name: name.to_string(),
            lines,
            files,
        })
    }

    /// Load a script, naming it after the file stem
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::io("reading script", path, e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&name, &text)
    }

    /// Number of command lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn archive_header(line: &str) -> Option<&str> {
    let name = line.strip_prefix("-- ")?.strip_suffix(" --")?.trim();
    (!name.is_empty()).then_some(name)
}

fn tokenize(line: &str) -> Result<Vec<Word>, String> {
    let mut words = Vec::new();
    let mut word: Word = Vec::new();
    let mut started = false;
    let mut chars = line.chars().peekable();

    let flush = |word: &mut Word, words: &mut Vec<Word>, started: &mut bool| {
        if *started {
            words.push(std::mem::take(word));
            *started = false;
        }
    };

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => flush(&mut word, &mut words, &mut started),
            '#' if !started => break,
            '\'' => {
                started = true;
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            quoted.push('\'');
                        }
                        Some('\'') => break,
                        Some(q) => quoted.push(q),
                        None => return Err("unterminated quoted argument".to_string()),
                    }
                }
                word.push(Fragment::Literal(quoted));
            }
            c => {
                started = true;
                match word.last_mut() {
                    Some(Fragment::Expand(s)) => s.push(c),
                    _ => word.push(Fragment::Expand(c.to_string())),
                }
            }
        }
    }
    flush(&mut word, &mut words, &mut started);
    Ok(words)
}

/// Replaces `$NAME` and `${NAME}` with values from `env`; unknown names expand to nothing.
pub fn expand_vars(text: &str, env: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let rest = &text[i + 1..];
        if let Some(braced) = rest.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                out.push_str(env.get(name).map(String::as_str).unwrap_or(""));
                for _ in 0..name.chars().count() + 2 {
                    chars.next();
                }
                continue;
            }
        }
        let len = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            out.push('$');
            continue;
        }
        out.push_str(env.get(&rest[..len]).map(String::as_str).unwrap_or(""));
        for _ in 0..len {
            chars.next();
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Halt {
    Skip(String),
    Stop(String),
}

/// Mutable state of one running script, handed to every command
#[derive(Debug)]
pub struct ScriptState {
    name: String,
    work_dir: PathBuf,
    env: BTreeMap<String, String>,
    stdout: String,
    stderr: String,
    log: Vec<String>,
    halt: Option<Halt>,
}

impl ScriptState {
    pub fn new(name: &str, work_dir: &Path, extra_env: &[(String, String)]) -> Self {
        // entries that are not valid UTF-8 cannot be expanded and are left out
        let mut env: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        env.insert("WORK".to_string(), work_dir.to_string_lossy().into_owned());
        for (key, value) in extra_env {
            env.insert(key.clone(), value.clone());
        }
        Self {
            name: name.to_string(),
            work_dir: work_dir.to_path_buf(),
            env,
            stdout: String::new(),
            stderr: String::new(),
            log: Vec::new(),
            halt: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Resolves `path` against the work directory unless it is absolute
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.work_dir.join(p)
        }
    }

    pub fn getenv(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn setenv(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn logf(&mut self, msg: impl Into<String>) {
        self.log.push(msg.into());
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    fn expand(&self, word: &Word) -> String {
        word.iter()
            .map(|fragment| match fragment {
                Fragment::Expand(s) => expand_vars(s, &self.env),
                Fragment::Literal(s) => s.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Skipped { reason: String },
    Failed { line: usize, message: String },
}

/// Result of running one script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub log: Vec<String>,
}

impl ScriptResult {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Passed)
    }

    pub fn failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Runs `script` in a fresh work directory
pub fn run_script(script: &Script, params: &EngineParams) -> ScriptResult {
    let start = Instant::now();
    let finish = |outcome: Outcome, log: Vec<String>| ScriptResult {
        name: script.name.clone(),
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
        log,
    };

    let work = match tempfile::Builder::new().prefix("sbtest-work-").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            return finish(
                Outcome::Failed {
                    line: 0,
                    message: format!("error creating work directory: {}", e),
                },
                Vec::new(),
            )
        }
    };

    let mut state = ScriptState::new(&script.name, work.path(), &params.env);
    if let Err(e) = write_archive(&script.files, work.path()) {
        return finish(
            Outcome::Failed {
                line: 0,
                message: e.to_string(),
            },
            state.log,
        );
    }

    for line in &script.lines {
        match run_line(line, &mut state, params) {
            Ok(()) => {}
            Err(e) => {
                state.logf(format!("FAIL: {}:{}: {}", script.name, line.number, e));
                return finish(
                    Outcome::Failed {
                        line: line.number,
                        message: e.to_string(),
                    },
                    state.log,
                );
            }
        }

        match state.halt.take() {
            Some(Halt::Skip(reason)) => return finish(Outcome::Skipped { reason }, state.log),
            Some(Halt::Stop(reason)) => {
                if !reason.is_empty() {
                    state.logf(format!("stop: {}", reason));
                }
                break;
            }
            None => {}
        }
    }

    finish(Outcome::Passed, state.log)
}

fn write_archive(files: &[ArchiveFile], work_dir: &Path) -> HarnessResult<()> {
    for file in files {
        let path = work_dir.join(&file.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HarnessError::io("creating directory", parent, e))?;
        }
        std::fs::write(&path, &file.data)
            .map_err(|e| HarnessError::io("writing archive file", &path, e))?;
    }
    Ok(())
}

fn run_line(line: &ScriptLine, state: &mut ScriptState, params: &EngineParams) -> HarnessResult<()> {
    for guard in &line.guards {
        let name = expand_vars(&guard.name, &state.env);
        let holds = evaluate_guard(&name, params)?;
        if holds == guard.negated {
            debug!("{}:{}: [{}] not met, skipping", state.name, line.number, guard.name);
            state.logf(format!("[condition not met] {}", line.text));
            return Ok(());
        }
    }

    let args: Vec<String> = line.words.iter().map(|w| state.expand(w)).collect();
    let (name, args) = match args.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };

    state.logf(format!("> {}", line.text));
    debug!("{}:{}: {}", state.name, line.number, line.text);

    let cmd = params
        .cmds
        .get(name)
        .or_else(|| builtin_command(name))
        .ok_or_else(|| HarnessError::UnknownCommand(name.clone()))?;

    match line.mode {
        Mode::Normal => cmd(state, false, args),
        Mode::Negated => cmd(state, true, args),
        Mode::Optional => {
            if let Err(e) = cmd(state, false, args) {
                state.logf(format!("[ignored failure] {}", e));
            }
            Ok(())
        }
    }
}

fn evaluate_guard(name: &str, params: &EngineParams) -> HarnessResult<bool> {
    if let Some(result) = builtin_condition(name) {
        return Ok(result);
    }
    match params.condition {
        Some(condition) => condition(name),
        None => Err(HarnessError::UnknownCondition(name.to_string())),
    }
}

fn builtin_condition(name: &str) -> Option<bool> {
    if let Some(program) = name.strip_prefix("exec:") {
        return Some(program_in_path(program));
    }
    match name {
        "unix" => Some(cfg!(unix)),
        "linux" | "macos" | "windows" | "freebsd" => Some(std::env::consts::OS == name),
        _ => None,
    }
}

fn program_in_path(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return is_file(program);
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_file(dir.join(program))))
        .unwrap_or(false)
}

fn builtin_command(name: &str) -> Option<CommandFn> {
    let cmd: CommandFn = match name {
        "exec" => cmd_exec,
        "stdout" => cmd_stdout,
        "stderr" => cmd_stderr,
        "exists" => cmd_exists,
        "env" => cmd_env,
        "skip" => cmd_skip,
        "stop" => cmd_stop,
        _ => return None,
    };
    Some(cmd)
}

fn cmd_exec(state: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| HarnessError::Usage("exec program [args...]".to_string()))?;

    let output = match Command::new(program)
        .args(rest)
        .current_dir(&state.work_dir)
        .env_clear()
        .envs(&state.env)
        .output()
    {
        Ok(output) => output,
        Err(e) if neg => {
            state.logf(format!("exec {}: {}", program, e));
            return Ok(());
        }
        Err(e) => return Err(HarnessError::io("running", program, e)),
    };

    state.stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    state.stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !state.stdout.is_empty() {
        state.logf(format!("[stdout]\n{}", state.stdout.trim_end()));
    }
    if !state.stderr.is_empty() {
        state.logf(format!("[stderr]\n{}", state.stderr.trim_end()));
    }

    match (neg, output.status.success()) {
        (false, false) => Err(HarnessError::AssertionFailed(format!(
            "exec {}: {}",
            program, output.status
        ))),
        (true, true) => Err(HarnessError::AssertionFailed(format!(
            "exec {}: unexpected command success",
            program
        ))),
        _ => Ok(()),
    }
}

fn match_output(stream: &str, text: &str, neg: bool, args: &[String]) -> HarnessResult<()> {
    let pattern = match args {
        [pattern] => pattern,
        _ => return Err(HarnessError::Usage(format!("{} 'regexp'", stream))),
    };
    let re = Regex::new(&format!("(?m){}", pattern))?;
    let found = re.is_match(text);
    match (neg, found) {
        (false, false) => Err(HarnessError::AssertionFailed(format!(
            "no match for `{}` found in {}",
            pattern, stream
        ))),
        (true, true) => Err(HarnessError::AssertionFailed(format!(
            "unexpected match for `{}` found in {}",
            pattern, stream
        ))),
        _ => Ok(()),
    }
}

fn cmd_stdout(state: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    match_output("stdout", &state.stdout, neg, args)
}

fn cmd_stderr(state: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    match_output("stderr", &state.stderr, neg, args)
}

fn cmd_exists(state: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    if args.is_empty() {
        return Err(HarnessError::Usage("exists file...".to_string()));
    }
    for arg in args {
        let path = state.resolve(arg);
        let exists = file_exists(&path);
        if neg && exists {
            return Err(HarnessError::AssertionFailed(format!(
                "{} unexpectedly exists",
                path.display()
            )));
        }
        if !neg && !exists {
            return Err(HarnessError::AssertionFailed(format!(
                "{} does not exist",
                path.display()
            )));
        }
    }
    Ok(())
}

fn cmd_env(state: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    if neg {
        return Err(HarnessError::Usage("unsupported: ! env".to_string()));
    }
    if args.is_empty() {
        let dump: Vec<String> = state.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        for entry in dump {
            state.logf(entry);
        }
        return Ok(());
    }
    for arg in args {
        match arg.split_once('=') {
            Some((key, value)) => state.setenv(key, value),
            None => {
                let value = state.getenv(arg).unwrap_or("").to_string();
                state.logf(format!("{}={}", arg, value));
            }
        }
    }
    Ok(())
}

fn cmd_skip(state: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    if neg {
        return Err(HarnessError::Usage("unsupported: ! skip".to_string()));
    }
    state.halt = Some(Halt::Skip(args.join(" ")));
    Ok(())
}

fn cmd_stop(state: &mut ScriptState, neg: bool, args: &[String]) -> HarnessResult<()> {
    if neg {
        return Err(HarnessError::Usage("unsupported: ! stop".to_string()));
    }
    state.halt = Some(Halt::Stop(args.join(" ")));
    Ok(())
}

/// Loads every fixture in `dir` with extension `ext`, sorted by name.
///
/// A fixture that fails to parse is reported as a failed script rather
/// than aborting its siblings.
pub fn load_scripts(dir: &Path, ext: &str) -> HarnessResult<Vec<Result<Script, ScriptResult>>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| HarnessError::io("reading directory", dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map(|e| e == ext).unwrap_or(false))
        .collect();
    paths.sort();

    Ok(paths
        .iter()
        .map(|path| {
            Script::from_file(path).map_err(|e| {
                warn!("{}", e);
                ScriptResult {
                    name: path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    outcome: Outcome::Failed {
                        line: 0,
                        message: e.to_string(),
                    },
                    duration_ms: 0,
                    log: Vec::new(),
                }
            })
        })
        .collect())
}
