use std::path::{Path, PathBuf};

use crate::casing::KeyCase;
use crate::error::CliError;
use crate::normalize::{CollisionPolicy, NormalizeOptions, DEFAULT_MAX_DEPTH};
use crate::payload::Payload;

const DEFAULT_WORKERS: usize = 2;

/// Command-line arguments of the `keycase` binary.
#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// JSON-lines input: a directory, a glob pattern, a file, or `-` for stdin
    #[clap(value_parser)]
    pub input: String,

    /// Key convention to produce
    #[clap(value_enum, short, long, env = "KEYCASE_CASE", default_value_t = KeyCase::Camel)]
    pub case: KeyCase,

    /// What to do when two keys re-case to the same key
    #[clap(value_enum, long, default_value_t = CollisionPolicy::Overwrite)]
    pub collisions: CollisionPolicy,

    /// Maximum nesting depth of a record, 0 disables the check
    #[clap(long, env = "KEYCASE_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Record written in place of one that fails to normalize
    #[clap(long, default_value = "{}")]
    pub fallback: String,

    /// Abort on the first malformed or faulting record
    #[clap(long)]
    pub strict: bool,

    /// Number of normalization workers
    #[clap(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Output file, stdout when omitted
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    pub fn name(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::File(path) => path.display().to_string(),
        }
    }
}

/// Everything a pipeline run needs, resolved from [`Args`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub inputs: Vec<InputSource>,
    pub options: NormalizeOptions,
    /// `None` in strict mode.
    pub fallback: Option<Payload>,
    pub workers: usize,
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            case: self.case,
            collisions: self.collisions,
            max_depth: (self.max_depth > 0).then_some(self.max_depth),
        }
    }

    pub fn into_run_config(self) -> Result<RunConfig, CliError> {
        let fallback = if self.strict {
            None
        } else {
            let fallback: Payload =
                serde_json::from_str(&self.fallback).map_err(CliError::InvalidFallback)?;
            Some(fallback)
        };

        Ok(RunConfig {
            inputs: resolve_inputs(&self.input)?,
            options: self.normalize_options(),
            fallback,
            workers: self.workers.max(1),
            output: self.output,
        })
    }
}

/// Expand the positional input into the list of sources to read, in order.
pub fn resolve_inputs(input: &str) -> Result<Vec<InputSource>, CliError> {
    if input == "-" {
        return Ok(vec![InputSource::Stdin]);
    }

    let path = Path::new(input);
    if path.is_file() {
        return Ok(vec![InputSource::File(path.to_path_buf())]);
    }

    let patterns = if path.is_dir() {
        vec![format!("{}/*.json", input), format!("{}/*.jsonl", input)]
    } else {
        vec![input.to_string()]
    };

    let mut files = Vec::new();
    for pattern in &patterns {
        for entry in glob::glob(pattern)? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => log::error!("error reading path: {}", e),
            }
        }
    }
    files.sort();

    if files.is_empty() {
        log::error!("No files found in {}", input);
        return Err(CliError::NoInput(input.to_string()));
    }

    log::info!("Found {} files to normalize", files.len());
    Ok(files.into_iter().map(InputSource::File).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["keycase", "-"]).unwrap();
        assert_eq!(args.case, KeyCase::Camel);
        assert_eq!(args.collisions, CollisionPolicy::Overwrite);
        assert_eq!(args.workers, DEFAULT_WORKERS);
        assert!(!args.strict);

        let config = args.into_run_config().unwrap();
        assert_eq!(config.inputs, vec![InputSource::Stdin]);
        assert_eq!(config.options, NormalizeOptions::default());
        assert_eq!(config.fallback, Some(Payload::Mapping(Default::default())));
        assert_eq!(config.output, None);
    }

    #[test]
    fn flags_map_onto_options() {
        let args = Args::try_parse_from([
            "keycase",
            "-",
            "--case",
            "pascal",
            "--collisions",
            "keep-first",
            "--max-depth",
            "0",
            "--workers",
            "0",
        ])
        .unwrap();
        let config = args.into_run_config().unwrap();
        assert_eq!(
            config.options,
            NormalizeOptions {
                case: KeyCase::Pascal,
                collisions: CollisionPolicy::KeepFirst,
                max_depth: None,
            }
        );
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn strict_mode_has_no_fallback() {
        let args = Args::try_parse_from(["keycase", "-", "--strict", "--fallback", "not json"]).unwrap();
        assert_eq!(args.into_run_config().unwrap().fallback, None);
    }

    #[test]
    fn invalid_fallback_is_rejected() {
        let args = Args::try_parse_from(["keycase", "-", "--fallback", "{oops"]).unwrap();
        assert!(matches!(
            args.into_run_config(),
            Err(CliError::InvalidFallback(_))
        ));
    }

    #[test]
    fn directory_input_lists_json_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}\n").unwrap();
        fs::write(dir.path().join("a.jsonl"), "{}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let inputs = resolve_inputs(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(
            inputs,
            vec![
                InputSource::File(dir.path().join("a.jsonl")),
                InputSource::File(dir.path().join("b.json")),
            ]
        );
    }

    #[test]
    fn single_file_and_empty_glob() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("records.txt");
        fs::write(&file, "{}\n").unwrap();

        assert_eq!(
            resolve_inputs(file.to_str().unwrap()).unwrap(),
            vec![InputSource::File(file.clone())]
        );

        let missing = format!("{}/*.ndjson", dir.path().display());
        assert!(matches!(resolve_inputs(&missing), Err(CliError::NoInput(_))));
    }
}
