use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;
use path_slash::PathBufExt as _;
use tracing::{debug, info, warn};

use crate::ext::PathExt;
use crate::{
    check_applicable, md5_digest, name_digest, normalize, resolve, Advisory, Classifier, Error,
    Games, Md5Digest, Mode, PathIndex, Plan, Rename, Skip, Step, StepKey, Transform,
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Settings for one run. Built once up front and never changed while files are processed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    input: PathBuf,
    output: PathBuf,
    mode: Mode,
    games: Games,
    index: Option<PathIndex>,
    replace: bool,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            mode: Mode::auto(),
            games: Games::none(),
            index: None,
            replace: false,
        }
    }
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
    pub fn games(mut self, games: Games) -> Self {
        self.games = games;
        self
    }
    pub fn index(mut self, index: Option<PathIndex>) -> Self {
        self.index = index;
        self
    }
    /// Overwrite existing outputs instead of moving them to `.bak`
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

/// What happened to a single input file
#[derive(Debug)]
pub enum Outcome {
    Written {
        input: PathBuf,
        output: PathBuf,
        backup: Option<PathBuf>,
        plan: Plan,
    },
    Skipped {
        input: PathBuf,
        reason: Skip,
    },
    Failed {
        input: PathBuf,
        error: Error,
    },
}

#[derive(Debug, Default)]
pub struct Summary {
    pub outcomes: Vec<Outcome>,
}

impl Summary {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Written { .. }))
    }
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }
    fn count(&self, f: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(o)).count()
    }
}

/// Walks the input and runs every file through classification, resolution and the
/// transforms, then commits the result under the output root.
pub struct Engine<T: Transform> {
    config: RunConfig,
    advisories: Vec<Advisory>,
    classifier: Classifier,
    transform: T,
}

impl<T: Transform> Engine<T> {
    /// Normalizes the configured mode against the configured games, reporting every correction.
    pub fn new(mut config: RunConfig, transform: T) -> Self {
        let (mode, advisories) = normalize(&config.mode, &config.games);
        for advisory in &advisories {
            warn!("{advisory}");
        }
        config.mode = mode;
        Self {
            config,
            advisories,
            classifier: Classifier::default(),
            transform,
        }
    }

    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn mode(&self) -> &Mode {
        &self.config.mode
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Process the configured input, a single file or a directory tree.
    ///
    /// Failures confined to one file are recorded and the walk carries on; anything else
    /// stops the run and is returned with the offending path attached.
    pub fn run(&self) -> Result<Summary> {
        let input = &self.config.input;
        let (root, files) = if input.is_dir() {
            let mut files = vec![];
            collect_files(&mut files, input).map_err(|(dir, e)| Error::Io(e).in_file(&dir))?;
            files.sort();
            (input.as_path(), files)
        } else if input.is_file() {
            (input.parent().unwrap_or(Path::new("")), vec![input.clone()])
        } else {
            return Err(Error::MissingInput(input.to_string_lossy().into_owned()));
        };
        info!("processing {} files in {} mode", files.len(), self.config.mode);

        let mut summary = Summary::default();
        for file in files {
            let outcome = match self.process_file(root, &file) {
                Ok(outcome) => outcome,
                Err(error) if error.is_contained() => {
                    warn!("{}: {error}", file.display());
                    Outcome::Failed { input: file, error }
                }
                Err(error) => return Err(error.in_file(&file)),
            };
            summary.outcomes.push(outcome);
        }
        debug!(
            "done: {} written, {} skipped, {} failed",
            summary.written(),
            summary.skipped(),
            summary.failed()
        );
        Ok(summary)
    }

    fn process_file(&self, root: &Path, file: &Path) -> Result<Outcome> {
        let RunConfig { mode, games, .. } = &self.config;
        let skipped = |reason: Skip| {
            match reason.is_warning() {
                true => warn!("skipping {}: {reason}", file.display()),
                false => info!("skipping {}: {reason}", file.display()),
            }
            Ok(Outcome::Skipped {
                input: file.to_path_buf(),
                reason,
            })
        };

        if let Err(reason) = check_applicable(file, mode, games) {
            return skipped(reason);
        }

        let mut data = fs::read(file).map_err(Error::FileIo)?;
        let signature = self.classifier.classify(file, &data);
        let plan = match resolve(mode, games, &signature) {
            Ok(plan) => plan,
            Err(reason) => return skipped(reason),
        };
        debug!("{}: {plan}", file.display());

        let name = file.file_name_lossy();
        let digest = match plan.steps().iter().find(|s| s.is_md5()) {
            Some(&step) => Some(md5_key(step, file, &name)?),
            None => None,
        };
        let key = StepKey {
            name: &name,
            digest,
        };
        for &step in plan.steps() {
            data = self.transform.apply(step, &data, &key)?;
        }

        let relative = file
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .unwrap_or(Path::new(""));
        let output = self.output_path(relative, &name, digest, &plan)?;
        let backup = self.commit(&output, &data).map_err(Error::FileIo)?;
        info!("{} -> {}", file.display(), output.display());

        Ok(Outcome::Written {
            input: file.to_path_buf(),
            output,
            backup,
            plan,
        })
    }

    /// Output location mirroring the input's place below the input root. Paths recovered
    /// from the index may add directories but never leave the output root.
    fn output_path(
        &self,
        relative: &Path,
        name: &str,
        digest: Option<Md5Digest>,
        plan: &Plan,
    ) -> Result<PathBuf> {
        let mut dir = relative.to_path_buf();
        let mut name = name.to_string();
        for (step, rename) in plan.renames() {
            match rename {
                Rename::Keep => {}
                Rename::RecoverMd5 => {
                    let digest = digest.ok_or_else(|| Error::Md5KeyUnavailable(name.clone()))?;
                    match self.config.index.as_ref().and_then(|i| i.lookup_name(&name)) {
                        Some(original) => {
                            let original = PathBuf::from_slash(original);
                            if let Some(parent) = original.parent() {
                                dir.push(parent);
                            }
                            name = original.file_name_lossy();
                        }
                        None => name = unindexed_name(&name, &digest),
                    }
                }
                Rename::Md5Digest => {
                    if name_digest(&name).is_some() {
                        name.truncate(32);
                    } else {
                        let digest = digest.ok_or_else(|| Error::Md5KeyUnavailable(name.clone()))?;
                        name = hex::encode(digest);
                    }
                }
                Rename::AppendGz => {
                    if !Path::new(&name).extension_lower().is_empty() {
                        name.push_str("gz");
                    }
                }
                Rename::StripGz => {
                    let extension = Path::new(&name).extension_lower();
                    if extension.len() > ".gz".len() && extension.ends_with("gz") {
                        name.truncate(name.len() - 2);
                    }
                }
            }
            debug!("{step}: output name {name}");
        }

        let relative = dir.join(&name);
        let escapes = !matches!(relative.clean().components().next(), Some(Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(Error::WriteOutsideOutput(relative.to_string_lossy().into_owned()));
        }
        Ok(self.config.output.join(relative))
    }

    /// Write the finished output, rotating an existing file to `.bak` unless replacing.
    fn commit(&self, output: &Path, data: &[u8]) -> io::Result<Option<PathBuf>> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut backup = None;
        if !self.config.replace && output.exists() {
            let mut bak = output.as_os_str().to_owned();
            bak.push(".bak");
            let bak = PathBuf::from(bak);
            match fs::remove_file(&bak) {
                Ok(_) => Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }?;
            fs::rename(output, &bak)?;
            backup = Some(bak);
        }
        fs::write(output, data)?;
        Ok(backup)
    }
}

/// Digest keying an MD5 step.
///
/// Decryption needs an MD5 shaped name. Encryption takes the digest from an MD5 prefixed
/// name, or hashes the path relative to the closest enclosing `data` directory.
fn md5_key(step: Step, file: &Path, name: &str) -> Result<Md5Digest> {
    if let Some(digest) = name_digest(name) {
        return Ok(digest);
    }
    if step == Step::Md5Encrypt {
        if let Some(relative) = data_relative_path(file) {
            return Ok(md5_digest(&relative));
        }
    }
    Err(Error::Md5KeyUnavailable(name.to_string()))
}

/// Normalized path starting at the last `data` component, e.g. `data/char/char_am_img.pac`
fn data_relative_path(file: &Path) -> Option<String> {
    let components: Vec<Component> = file.components().collect();
    let start = components
        .iter()
        .rposition(|c| c.as_os_str().eq_ignore_ascii_case("data"))?;
    let relative: PathBuf = components[start..].iter().collect();
    crate::normalize_path(&relative.to_slash_lossy())
}

/// Name for a decrypted MD5 file the path index knows nothing about. The suffix keeps
/// distinct files from colliding after decryption.
fn unindexed_name(name: &str, digest: &Md5Digest) -> String {
    format!("{}_{}", &name[..32.min(name.len())], digest[7] % 43)
}

/// Recursively gather every file below `dir`, failing with the directory that could not be read
fn collect_files(paths: &mut Vec<PathBuf>, dir: &Path) -> Result<(), (PathBuf, io::Error)> {
    let unreadable = |e| (dir.to_path_buf(), e);
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(paths, &path)?;
        } else {
            paths.push(entry.path());
        }
    }
    Ok(())
}
