use std::path::Path;

use crate::ext::PathExt;
use crate::{FileSignature, Game, Games, Mode, Step, SWITCH_COMPRESSED_EXTENSION};

/// Why a file was left untouched
#[derive(thiserror::Error, Clone, PartialEq, Eq, Debug)]
pub enum Skip {
    #[error("{game} does not obfuscate \"{extension}\" files")]
    NotObfuscated { game: Game, extension: String },

    #[error("already switch compressed")]
    AlreadySwitchCompressed,

    #[error("switch compression does not apply to files without an extension")]
    Extensionless,

    #[error("could not determine what to do with this file")]
    Unresolvable,
}

impl Skip {
    /// Unresolvable files are worth a warning, the rest are expected
    pub fn is_warning(&self) -> bool {
        matches!(self, Skip::Unresolvable)
    }
}

/// How a step changes the output file name
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rename {
    Keep,
    /// Recover the original path from the path index, or append a disambiguation suffix
    RecoverMd5,
    /// Replace the name by its MD5 digest
    Md5Digest,
    /// `.ext` to `.extgz`
    AppendGz,
    /// `.extgz` to `.ext`
    StripGz,
}

impl From<Step> for Rename {
    fn from(step: Step) -> Self {
        match step {
            Step::Md5Decrypt => Rename::RecoverMd5,
            Step::Md5Encrypt => Rename::Md5Digest,
            Step::SwitchDeflate => Rename::AppendGz,
            Step::SwitchInflate => Rename::StripGz,
            _ => Rename::Keep,
        }
    }
}

/// Concrete steps to run on one file, in execution order
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let mut steps: Vec<Step> = steps.into_iter().collect();
        steps.sort();
        steps.dedup();
        Plan { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }

    pub fn renames(&self) -> impl Iterator<Item = (Step, Rename)> + '_ {
        self.steps.iter().map(|&s| (s, Rename::from(s)))
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(Step::to_string).collect();
        write!(f, "{}", steps.join(" -> "))
    }
}

/// Decide from the name alone whether a file is in scope for this run. Runs before the
/// file is read.
pub fn check_applicable(path: &Path, mode: &Mode, games: &Games) -> Result<(), Skip> {
    let extension = path.extension_lower();
    if let Some(game) = games
        .iter()
        .find(|g| !g.obfuscated_extensions().contains(&extension.as_str()))
    {
        return Err(Skip::NotObfuscated { game, extension });
    }

    let switch = mode.any(Step::is_switch);
    if extension == SWITCH_COMPRESSED_EXTENSION && !switch && !mode.is_auto() {
        return Err(Skip::AlreadySwitchCompressed);
    }
    if extension.is_empty() && switch {
        return Err(Skip::Extensionless);
    }
    Ok(())
}

/// Turn a normalized mode into a plan for one file.
///
/// Explicit modes are taken as is. `Auto` looks at the signature: compression magic first,
/// then the shape of the name, then per title whether the file is a readable container.
pub fn resolve(mode: &Mode, games: &Games, signature: &FileSignature) -> Result<Plan, Skip> {
    if !mode.is_auto() {
        let plan = Plan::new(mode.steps());
        return match plan.steps.is_empty() {
            true => Err(Skip::Unresolvable),
            false => Ok(plan),
        };
    }

    let known = signature.container.is_known();
    let steps: &[Step] = if signature.is_deflated() {
        &[Step::Inflate]
    } else if signature.is_gzip() {
        &[Step::SwitchInflate]
    } else if signature.md5_name {
        &[Step::Md5Decrypt]
    } else if signature.md5_prefixed_name {
        &[Step::Md5Encrypt]
    } else if games.contains(Game::Bbct) {
        match known {
            true => &[Step::Encrypt],
            false => &[Step::Decrypt],
        }
    } else if games.contains(Game::Bbtag) {
        match known {
            true => &[Step::Md5Encrypt],
            false => &[Step::Md5Decrypt],
        }
    } else {
        match known {
            true => &[Step::Encrypt, Step::Deflate],
            false => &[Step::Inflate, Step::Decrypt],
        }
    };
    Ok(Plan::new(steps.iter().copied()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ContainerKind, Step::*};

    const MD5_NAME: &str = "abcffeeddc1100112233445566778899";

    fn signature(magic: &[u8; 4], container: ContainerKind, name: &str) -> FileSignature {
        FileSignature {
            extension: Path::new(name).extension_lower(),
            magic: *magic,
            container,
            md5_name: crate::looks_like_md5(name),
            md5_prefixed_name: crate::looks_like_md5_prefixed(name),
        }
    }

    fn auto(games: &Games, sig: &FileSignature) -> Vec<Step> {
        resolve(&Mode::auto(), games, sig).unwrap().steps().to_vec()
    }

    #[test]
    fn test_deflated_magic_wins() {
        for name in [MD5_NAME, "0123456789abcdef0123456789abcdef_4", "char.pac"] {
            for container in [ContainerKind::Pac, ContainerKind::Unknown] {
                for games in [Games::none(), Games::one(Game::Bbtag), Games::one(Game::Bbct)] {
                    let sig = signature(b"DFAS", container, name);
                    assert_eq!(auto(&games, &sig), vec![Inflate]);
                }
            }
        }
    }

    #[test]
    fn test_gzip_then_names() {
        let games = Games::one(Game::Bbtag);
        let sig = signature(&[0x1F, 0x8B, 0x08, 0x00], ContainerKind::Unknown, MD5_NAME);
        assert_eq!(auto(&games, &sig), vec![SwitchInflate]);

        let sig = signature(b"FPAC", ContainerKind::Pac, MD5_NAME);
        assert_eq!(auto(&games, &sig), vec![Md5Decrypt]);
        assert_eq!(auto(&Games::none(), &sig), vec![Md5Decrypt]);

        let name = "0123456789abcdef0123456789abcdef_1234567";
        assert_eq!(name.len(), 40);
        let sig = signature(b"FPAC", ContainerKind::Pac, name);
        assert_eq!(auto(&Games::none(), &sig), vec![Md5Encrypt]);
    }

    #[test]
    fn test_per_game_fallback() {
        let pac = signature(b"FPAC", ContainerKind::Pac, "char.pac");
        let opaque = signature(&[0x12, 0x34, 0x56, 0x78], ContainerKind::Unknown, "char.pac");

        let bbct = Games::one(Game::Bbct);
        assert_eq!(auto(&bbct, &pac), vec![Encrypt]);
        assert_eq!(auto(&bbct, &opaque), vec![Decrypt]);

        let bbtag = Games::one(Game::Bbtag);
        assert_eq!(auto(&bbtag, &pac), vec![Md5Encrypt]);
        assert_eq!(auto(&bbtag, &opaque), vec![Md5Decrypt]);

        for games in [Games::none(), Games::one(Game::Bbcsex), Games::one(Game::Bbcpex)] {
            assert_eq!(auto(&games, &pac), vec![Encrypt, Deflate]);
            assert_eq!(auto(&games, &opaque), vec![Inflate, Decrypt]);
        }
    }

    #[test]
    fn test_explicit_mode() {
        let sig = signature(b"DFAS", ContainerKind::Unknown, "char.pac");
        let mode = Mode::from_steps([Deflate, Encrypt]);
        let plan = resolve(&mode, &Games::none(), &sig).unwrap();
        assert_eq!(plan.steps(), &[Encrypt, Deflate]);
        assert_eq!(plan.to_string(), "Encrypt -> Deflate");

        assert_eq!(
            resolve(&Mode::default(), &Games::none(), &sig),
            Err(Skip::Unresolvable)
        );
    }

    #[test]
    fn test_applicability() {
        let auto = Mode::auto();
        let bbct = Games::one(Game::Bbct);
        assert_eq!(
            check_applicable(Path::new("data.unknownext"), &auto, &bbct),
            Err(Skip::NotObfuscated {
                game: Game::Bbct,
                extension: ".unknownext".into()
            })
        );
        assert_eq!(check_applicable(Path::new("CHAR.PAC"), &auto, &bbct), Ok(()));

        let bbtag = Games::one(Game::Bbtag);
        assert_eq!(check_applicable(Path::new(MD5_NAME), &auto, &bbtag), Ok(()));
        assert_eq!(check_applicable(Path::new("scr.ha6"), &auto, &bbtag), Ok(()));
        assert!(check_applicable(Path::new("movie.usm"), &auto, &bbtag).is_err());

        let decrypt = Mode::from_steps([Md5Decrypt]);
        assert_eq!(
            check_applicable(Path::new("a.pacgz"), &decrypt, &Games::none()),
            Err(Skip::AlreadySwitchCompressed)
        );
        assert_eq!(check_applicable(Path::new("a.pacgz"), &auto, &Games::none()), Ok(()));
        let inflate = Mode::from_steps([SwitchInflate]);
        assert_eq!(check_applicable(Path::new("a.pacgz"), &inflate, &Games::none()), Ok(()));
        assert_eq!(
            check_applicable(Path::new(MD5_NAME), &inflate, &Games::none()),
            Err(Skip::Extensionless)
        );
    }

    #[test]
    fn test_renames() {
        let plan = Plan::new([Md5Decrypt, SwitchInflate]);
        let renames: Vec<Rename> = plan.renames().map(|(_, r)| r).collect();
        assert_eq!(renames, vec![Rename::StripGz, Rename::RecoverMd5]);
        assert!(!Skip::Extensionless.is_warning());
        assert!(Skip::Unresolvable.is_warning());
    }
}
