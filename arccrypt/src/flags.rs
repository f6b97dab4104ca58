use std::collections::BTreeSet;
use std::path::PathBuf;

/// A concrete transformation step.
///
/// Declaration order is execution order: every decoding step runs before any encoding step,
/// so iterating a `BTreeSet<Step>` yields a valid composition.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Step {
    Inflate,
    SwitchInflate,
    Decrypt,
    #[strum(serialize = "MD5Decrypt")]
    Md5Decrypt,
    #[strum(serialize = "MD5Encrypt")]
    Md5Encrypt,
    Encrypt,
    Deflate,
    SwitchDeflate,
}

impl Step {
    /// The step undoing this one
    pub fn opposite(self) -> Step {
        match self {
            Step::Inflate => Step::Deflate,
            Step::Deflate => Step::Inflate,
            Step::SwitchInflate => Step::SwitchDeflate,
            Step::SwitchDeflate => Step::SwitchInflate,
            Step::Decrypt => Step::Encrypt,
            Step::Encrypt => Step::Decrypt,
            Step::Md5Decrypt => Step::Md5Encrypt,
            Step::Md5Encrypt => Step::Md5Decrypt,
        }
    }

    pub fn is_switch(self) -> bool {
        matches!(self, Step::SwitchDeflate | Step::SwitchInflate)
    }

    pub fn is_md5(self) -> bool {
        matches!(self, Step::Md5Encrypt | Step::Md5Decrypt)
    }

    pub fn is_crypt(self) -> bool {
        matches!(self, Step::Encrypt | Step::Decrypt)
    }

    pub fn is_compression(self) -> bool {
        matches!(self, Step::Deflate | Step::Inflate)
    }
}

/// The requested transformation mode: either `Auto`, or an explicit set of steps.
///
/// A raw mode straight from the command line may carry both the auto flag and steps;
/// [`normalize`] brings it into canonical form where auto implies no steps.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Mode {
    auto: bool,
    steps: BTreeSet<Step>,
}

impl Mode {
    pub fn auto() -> Self {
        Mode {
            auto: true,
            steps: BTreeSet::new(),
        }
    }

    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Mode {
            auto: false,
            steps: steps.into_iter().collect(),
        }
    }

    /// Parse `--mode` tokens. Unknown tokens are reported and otherwise ignored.
    pub fn parse_tokens<S: AsRef<str>>(tokens: &[S]) -> (Self, Vec<Advisory>) {
        let mut mode = Mode::default();
        let mut advisories = vec![];
        for token in tokens.iter().map(|t| t.as_ref().trim()) {
            if token.eq_ignore_ascii_case("auto") {
                mode.auto = true;
            } else if let Ok(step) = token.parse::<Step>() {
                mode.steps.insert(step);
            } else {
                advisories.push(Advisory::UnknownMode(token.to_string()));
            }
        }
        (mode, advisories)
    }

    pub fn is_auto(&self) -> bool {
        self.auto
    }

    pub fn is_empty(&self) -> bool {
        !self.auto && self.steps.is_empty()
    }

    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps.iter().copied()
    }

    pub(crate) fn any(&self, f: impl Fn(Step) -> bool) -> bool {
        self.steps().any(f)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.auto {
            return write!(f, "Auto");
        }
        let mut first = true;
        for step in self.steps() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{step}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum Game {
    /// Calamity Trigger: plain encryption, no compression
    Bbct,
    /// Continuum Shift Extend
    Bbcsex,
    /// Chrono Phantasma Extend
    Bbcpex,
    /// Cross Tag Battle: MD5-keyed encryption and switch gzip
    Bbtag,
}

const FPAC_EXTENSIONS: &[&str] = &[".pac"];

const BBTAG_EXTENSIONS: &[&str] = &[
    "", ".pac", ".pacgz", ".hip", ".abc", ".txt", ".pat", ".ha6", ".fod",
];

impl Game {
    /// Lowercase extensions (with leading dot, or empty) this title obfuscates
    pub fn obfuscated_extensions(self) -> &'static [&'static str] {
        match self {
            Game::Bbct | Game::Bbcsex | Game::Bbcpex => FPAC_EXTENSIONS,
            Game::Bbtag => BBTAG_EXTENSIONS,
        }
    }

    fn uses_fpac_crypt(self) -> bool {
        !matches!(self, Game::Bbtag)
    }
}

/// The set of titles selected for the run. Usually zero or one.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Games(BTreeSet<Game>);

impl Games {
    pub fn none() -> Self {
        Games::default()
    }

    pub fn one(game: Game) -> Self {
        Games(BTreeSet::from([game]))
    }

    /// Parse `--game` tokens: the first recognized title wins, the rest are reported.
    pub fn parse_tokens<S: AsRef<str>>(tokens: &[S]) -> (Self, Vec<Advisory>) {
        let mut games = Games::none();
        let mut advisories = vec![];
        for token in tokens.iter().map(|t| t.as_ref().trim()) {
            match token.parse::<Game>() {
                Ok(game) if games.0.is_empty() => {
                    games.0.insert(game);
                }
                Ok(_) => advisories.push(Advisory::ExtraGame(token.to_string())),
                Err(_) => advisories.push(Advisory::UnknownGame(token.to_string())),
            }
        }
        (games, advisories)
    }

    pub fn contains(&self, game: Game) -> bool {
        self.0.contains(&game)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Game> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Game> for Games {
    fn from_iter<T: IntoIterator<Item = Game>>(iter: T) -> Self {
        Games(iter.into_iter().collect())
    }
}

/// A non-fatal correction made while setting up the run
#[derive(thiserror::Error, Clone, PartialEq, Eq, Debug)]
pub enum Advisory {
    #[error("Auto mode overrides every other mode, ignoring {0}")]
    AutoOverrides(Mode),

    #[error("conflicting modes {0} and {1}, falling back to Auto")]
    ConflictingModes(Step, Step),

    #[error("{0} does not use MD5 encryption, falling back to Auto")]
    Md5Unsupported(Game),

    #[error("{0} does not use switch compression, falling back to Auto")]
    SwitchUnsupported(Game),

    #[error("{0} only uses MD5 encryption, falling back to Auto")]
    Md5Only(Game),

    #[error("{0} does not support MD5 encryption combined with switch compression, falling back to Auto")]
    Md5WithSwitch(Game),

    #[error("{0} has no compression, falling back to Auto")]
    NoCompression(Game),

    #[error("unknown mode \"{0}\", ignoring")]
    UnknownMode(String),

    #[error("unknown game \"{0}\", ignoring")]
    UnknownGame(String),

    #[error("only one game can be selected, ignoring \"{0}\"")]
    ExtraGame(String),

    #[error("no paths file given, using {}", .0.display())]
    DefaultManifest(PathBuf),

    #[error("paths file {} could not be read, MD5 names will not be recovered", .0.display())]
    ManifestUnavailable(PathBuf),

    #[error("no output directory given, using {}", .0.display())]
    DefaultOutput(PathBuf),
}

/// Bring a raw mode into canonical, conflict-free form for the selected games.
///
/// Every correction collapses to `Auto` and is reported as an [`Advisory`]. Normalizing
/// an already normalized mode returns it unchanged with no advisories.
pub fn normalize(mode: &Mode, games: &Games) -> (Mode, Vec<Advisory>) {
    let mut advisories = vec![];
    let collapsed = |advisories: Vec<Advisory>| (Mode::auto(), advisories);

    if mode.is_empty() {
        return collapsed(advisories);
    }
    if mode.is_auto() {
        if !mode.steps.is_empty() {
            advisories.push(Advisory::AutoOverrides(Mode::from_steps(mode.steps())));
        }
        return collapsed(advisories);
    }

    if let Some(step) = mode.steps().find(|s| mode.contains(s.opposite())) {
        advisories.push(Advisory::ConflictingModes(step, step.opposite()));
        return collapsed(advisories);
    }

    for game in games.iter() {
        let advisory = if game.uses_fpac_crypt() {
            if mode.any(Step::is_md5) {
                Some(Advisory::Md5Unsupported(game))
            } else if mode.any(Step::is_switch) {
                Some(Advisory::SwitchUnsupported(game))
            } else {
                None
            }
        } else if mode.any(|s| s.is_crypt() || s.is_compression()) {
            Some(Advisory::Md5Only(game))
        } else if mode.any(Step::is_md5) && mode.any(Step::is_switch) {
            Some(Advisory::Md5WithSwitch(game))
        } else {
            None
        };
        if let Some(advisory) = advisory {
            advisories.push(advisory);
            return collapsed(advisories);
        }
    }

    if games.contains(Game::Bbct) && mode.any(Step::is_compression) {
        advisories.push(Advisory::NoCompression(Game::Bbct));
        return collapsed(advisories);
    }

    (mode.clone(), advisories)
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    fn steps(steps: &[Step]) -> Mode {
        Mode::from_steps(steps.iter().copied())
    }

    #[test]
    fn test_parse_tokens() {
        let (mode, advisories) = Mode::parse_tokens(&["decrypt", "MD5Decrypt", "Inflate", "frobnicate"]);
        assert_eq!(mode, steps(&[Step::Decrypt, Step::Md5Decrypt, Step::Inflate]));
        assert_eq!(advisories, vec![Advisory::UnknownMode("frobnicate".into())]);

        let (mode, advisories) = Mode::parse_tokens::<&str>(&[]);
        assert!(mode.is_empty());
        assert!(advisories.is_empty());

        let (games, advisories) = Games::parse_tokens(&["nope", "bbtag", "BBCT"]);
        assert_eq!(games, Games::one(Game::Bbtag));
        assert_eq!(
            advisories,
            vec![
                Advisory::UnknownGame("nope".into()),
                Advisory::ExtraGame("BBCT".into())
            ]
        );
    }

    #[test]
    fn test_missing_mode_is_auto() {
        let (mode, advisories) = normalize(&Mode::default(), &Games::none());
        assert_eq!(mode, Mode::auto());
        assert!(advisories.is_empty());
    }

    #[test]
    fn test_auto_wins() {
        let (raw, _) = Mode::parse_tokens(&["encrypt", "auto"]);
        let (mode, advisories) = normalize(&raw, &Games::none());
        assert_eq!(mode, Mode::auto());
        assert_eq!(
            advisories,
            vec![Advisory::AutoOverrides(steps(&[Step::Encrypt]))]
        );
    }

    #[test]
    fn test_conflicts_collapse() {
        for step in Step::iter() {
            for extra in Step::iter() {
                let raw = steps(&[step, step.opposite(), extra]);
                for games in [Games::none(), Games::one(Game::Bbtag), Games::one(Game::Bbct)] {
                    let (mode, advisories) = normalize(&raw, &games);
                    assert_eq!(mode, Mode::auto(), "{raw} for {games:?}");
                    assert_eq!(advisories.len(), 1);
                    assert_eq!(normalize(&mode, &games), (Mode::auto(), vec![]));
                }
            }
        }
    }

    #[test]
    fn test_game_incompatibility() {
        use Advisory::*;
        use Game::*;
        let cases = [
            (Bbtag, steps(&[Step::Md5Encrypt, Step::SwitchDeflate]), Md5WithSwitch(Bbtag)),
            (Bbtag, steps(&[Step::Decrypt]), Md5Only(Bbtag)),
            (Bbtag, steps(&[Step::Inflate]), Md5Only(Bbtag)),
            (Bbct, steps(&[Step::Inflate]), NoCompression(Bbct)),
            (Bbct, steps(&[Step::Md5Decrypt]), Md5Unsupported(Bbct)),
            (Bbcsex, steps(&[Step::SwitchInflate]), SwitchUnsupported(Bbcsex)),
            (Bbcpex, steps(&[Step::Md5Encrypt]), Md5Unsupported(Bbcpex)),
        ];
        for (game, raw, expected) in cases {
            let (mode, advisories) = normalize(&raw, &Games::one(game));
            assert_eq!(mode, Mode::auto(), "{game} {raw}");
            assert_eq!(advisories, vec![expected]);
        }
    }

    #[test]
    fn test_compatible_modes_kept() {
        let cases = [
            (Games::one(Game::Bbtag), steps(&[Step::Md5Decrypt])),
            (Games::one(Game::Bbtag), steps(&[Step::SwitchInflate])),
            (Games::one(Game::Bbct), steps(&[Step::Decrypt])),
            (Games::one(Game::Bbcpex), steps(&[Step::Inflate, Step::Decrypt])),
            (Games::none(), steps(&[Step::Md5Encrypt, Step::SwitchDeflate])),
        ];
        for (games, raw) in cases {
            let (mode, advisories) = normalize(&raw, &games);
            assert_eq!(mode, raw);
            assert!(advisories.is_empty());
            assert_eq!(normalize(&mode, &games), (raw, vec![]));
        }
    }

    #[test]
    fn test_step_order() {
        let order: Vec<Step> = steps(&[Step::Deflate, Step::Encrypt, Step::Inflate, Step::Decrypt])
            .steps()
            .collect();
        assert_eq!(order, vec![Step::Inflate, Step::Decrypt, Step::Encrypt, Step::Deflate]);
        assert_eq!(Step::Md5Encrypt.to_string(), "MD5Encrypt");
        assert_eq!(Game::Bbtag.to_string(), "BBTAG");
    }
}
