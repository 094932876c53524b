//! Version specification and constraint parsing
//!
//! Implements the pip-style constraints used by runtime package installs:
//! - `==2.1.0` - Exact version (a pin)
//! - `>=1.2.0` - Minimum version
//! - `<=2.0.0` - Maximum version
//! - `~=1.2.0` - Compatible release (>=1.2.0,<1.3.0)
//! - `!=1.5.0` - Exclude version
//! - Multiple constraints: `>=1.2,<2.0,!=1.5.0`
//!
//! Versions with fewer than three components (`2.1`) are padded with zeros;
//! package-index forms such as `2023.3.post1` or `2.2.0rc1` are folded onto
//! semver by [`parse_version`].

use envbake_errors::VersionError;
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse a package version, padding missing minor/patch components
///
/// Package-index versions are folded onto semver so they can be ordered
/// and pinned:
/// - release components past the third become build identifiers
///   (`1.2.3.4` -> `1.2.3+4`)
/// - `a`/`b`/`rc` pre-releases and `dev` releases become pre-release
///   identifiers (`2.2.0rc1` -> `2.2.0-rc.1`, `0.8.0.dev0` -> `0.8.0-dev.0`)
/// - post releases become build identifiers (`2023.3.post1` -> `2023.3.0+post.1`)
/// - a `+local` label is appended to the build identifiers
///
/// Pre-release ordering follows semver precedence, so `dev` releases of a
/// pre-release sort after it rather than before.
///
/// # Errors
///
/// Returns `VersionError::InvalidVersion` if the input is not a dotted
/// numeric version with optional pre, post, dev and local segments, or if
/// it carries a non-zero epoch.
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    let invalid = || VersionError::InvalidVersion {
        input: input.trim().to_string(),
    };

    let lowered = input.trim().to_ascii_lowercase();
    let (public, local) = match lowered.split_once('+') {
        Some((public, local)) => (public, Some(local)),
        None => (lowered.as_str(), None),
    };
    let public = public.strip_prefix('v').unwrap_or(public);
    let public = match public.split_once('!') {
        Some(("0", rest)) => rest,
        Some(_) => return Err(invalid()),
        None => public,
    };

    let segments = PublicVersion::scan(public).ok_or_else(invalid)?;

    let mut pre = Vec::new();
    if let Some((kind, number)) = segments.pre {
        pre.push(format!("{kind}.{number}"));
    }
    if let Some(number) = segments.dev {
        pre.push(format!("dev.{number}"));
    }

    let mut build: Vec<String> = segments.release.iter().skip(3).map(u64::to_string).collect();
    if let Some(number) = segments.post {
        build.push(format!("post.{number}"));
    }
    if let Some(local) = local {
        if local.is_empty() {
            return Err(invalid());
        }
        build.extend(local.split(['.', '-', '_']).map(str::to_string));
    }

    let component = |index: usize| segments.release.get(index).copied().unwrap_or(0);
    Ok(Version {
        major: component(0),
        minor: component(1),
        patch: component(2),
        pre: Prerelease::new(&pre.join(".")).map_err(|_| invalid())?,
        build: BuildMetadata::new(&build.join(".")).map_err(|_| invalid())?,
    })
}

/// Segments of a package-index public version (`1.2rc1.post2.dev3`)
struct PublicVersion {
    release: Vec<u64>,
    pre: Option<(&'static str, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

const PRE_SPELLINGS: [(&str, &str); 8] = [
    ("alpha", "a"),
    ("a", "a"),
    ("beta", "b"),
    ("b", "b"),
    ("preview", "rc"),
    ("pre", "rc"),
    ("rc", "rc"),
    ("c", "rc"),
];
const POST_SPELLINGS: [(&str, &str); 3] = [("post", "post"), ("rev", "post"), ("r", "post")];
const DEV_SPELLINGS: [(&str, &str); 1] = [("dev", "dev")];

impl PublicVersion {
    fn scan(input: &str) -> Option<Self> {
        let mut rest = input;

        let mut release = vec![take_number(&mut rest)?];
        while let Some(after_dot) = rest.strip_prefix('.') {
            if !after_dot.starts_with(|c: char| c.is_ascii_digit()) {
                break;
            }
            rest = after_dot;
            release.push(take_number(&mut rest)?);
        }

        let pre = take_segment(&mut rest, &PRE_SPELLINGS);
        let post = take_segment(&mut rest, &POST_SPELLINGS)
            .map(|(_, number)| number)
            .or_else(|| take_implicit_post(&mut rest));
        let dev = take_segment(&mut rest, &DEV_SPELLINGS).map(|(_, number)| number);

        rest.is_empty().then_some(Self {
            release,
            pre,
            post,
            dev,
        })
    }
}

fn take_number(rest: &mut &str) -> Option<u64> {
    let current = *rest;
    let end = current
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(current.len());
    let number = current[..end].parse().ok()?;
    *rest = &current[end..];
    Some(number)
}

fn strip_separator(s: &str) -> &str {
    s.strip_prefix(['.', '-', '_']).unwrap_or(s)
}

/// `[sep]<spelling>[sep][N]`, leaving `rest` untouched when absent
fn take_segment(
    rest: &mut &str,
    spellings: &[(&str, &'static str)],
) -> Option<(&'static str, u64)> {
    let candidate = strip_separator(*rest);
    let &(spelling, kind) = spellings
        .iter()
        .find(|(spelling, _)| candidate.starts_with(*spelling))?;
    let mut after = &candidate[spelling.len()..];

    let mut numbered = strip_separator(after);
    let number = if numbered.starts_with(|c: char| c.is_ascii_digit()) {
        let number = take_number(&mut numbered)?;
        after = numbered;
        number
    } else {
        0
    };

    *rest = after;
    Some((kind, number))
}

/// `-N` post release shorthand (`1.0-1`)
fn take_implicit_post(rest: &mut &str) -> Option<u64> {
    let mut after = (*rest).strip_prefix('-')?;
    let number = take_number(&mut after)?;
    *rest = after;
    Some(number)
}

/// A single version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Exact(Version),
    GreaterEqual(Version),
    LessEqual(Version),
    Greater(Version),
    Less(Version),
    Compatible(Version),
    NotEqual(Version),
}

impl VersionConstraint {
    /// Check if a version satisfies this constraint
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterEqual(v) => version >= v,
            Self::LessEqual(v) => version <= v,
            Self::Greater(v) => version > v,
            Self::Less(v) => version < v,
            Self::NotEqual(v) => version != v,
            Self::Compatible(v) => {
                version >= v && version.major == v.major && version.minor == v.minor
            }
        }
    }

    /// Parse a single constraint from a string
    fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        let operators: [(&str, fn(Version) -> Self); 7] = [
            ("==", Self::Exact),
            (">=", Self::GreaterEqual),
            ("<=", Self::LessEqual),
            ("!=", Self::NotEqual),
            ("~=", Self::Compatible),
            (">", Self::Greater),
            ("<", Self::Less),
        ];

        for (prefix, build) in operators {
            if let Some(version_str) = s.strip_prefix(prefix) {
                return parse_version(version_str).map(build);
            }
        }

        Err(VersionError::InvalidConstraint {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "=={v}"),
            Self::GreaterEqual(v) => write!(f, ">={v}"),
            Self::LessEqual(v) => write!(f, "<={v}"),
            Self::Greater(v) => write!(f, ">{v}"),
            Self::Less(v) => write!(f, "<{v}"),
            Self::Compatible(v) => write!(f, "~={v}"),
            Self::NotEqual(v) => write!(f, "!={v}"),
        }
    }
}

/// A version specification that can contain multiple constraints
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionSpec {
    constraints: Vec<VersionConstraint>,
}

impl VersionSpec {
    /// Create a version spec from a single constraint
    #[must_use]
    pub fn single(constraint: VersionConstraint) -> Self {
        Self {
            constraints: vec![constraint],
        }
    }

    /// Create an exact version spec
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self::single(VersionConstraint::Exact(version))
    }

    /// Check if a version satisfies all constraints
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }

    /// Get the constraints
    #[must_use]
    pub fn constraints(&self) -> &[VersionConstraint] {
        &self.constraints
    }

    /// Check if this spec has any constraints
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }

    /// The exact version this spec pins, if it is a single `==` constraint
    #[must_use]
    pub fn pinned(&self) -> Option<&Version> {
        match self.constraints.as_slice() {
            [VersionConstraint::Exact(v)] => Some(v),
            _ => None,
        }
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(Self::default());
        }

        let constraints = s
            .split(',')
            .map(VersionConstraint::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { constraints })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            write!(f, "*")
        } else {
            let strs: Vec<_> = self.constraints.iter().map(ToString::to_string).collect();
            write!(f, "{}", strs.join(","))
        }
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A runtime package requirement (e.g. `torch==2.1.0`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub version_spec: VersionSpec,
}

impl Requirement {
    /// Parse a requirement from a string (e.g., "PyOpenGL>=3.1,<4")
    ///
    /// # Errors
    ///
    /// Returns `VersionError` if the name is empty or the constraints are
    /// malformed.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let operators = ["==", ">=", "<=", "!=", "~=", ">", "<"];
        let split_pos = operators.iter().filter_map(|op| s.find(op)).min();

        let (name, version_str) = match split_pos {
            Some(pos) => (s[..pos].trim(), s[pos..].trim()),
            None => (s.trim(), "*"),
        };

        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid_name {
            return Err(VersionError::InvalidRequirement {
                input: s.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            version_spec: version_str.parse()?,
        })
    }

    /// Normalised package name used as the key in the environment state
    #[must_use]
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version_spec.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}", self.name, self.version_spec)
        }
    }
}

/// Normalise a runtime package name the way package indexes compare them
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}

/// Interpreter version as selected by an interpreter-selection step (`3.10`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterpreterVersion {
    pub major: u64,
    pub minor: u64,
}

impl InterpreterVersion {
    #[must_use]
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    /// OS package that provides this interpreter (`python3.10`)
    #[must_use]
    pub fn package_name(&self) -> String {
        format!("python{}.{}", self.major, self.minor)
    }

    /// Recognise an interpreter OS package name (`python3.10` -> 3.10)
    #[must_use]
    pub fn from_package_name(package: &str) -> Option<Self> {
        package.strip_prefix("python")?.parse().ok()
    }
}

impl FromStr for InterpreterVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionError::InvalidInterpreter {
            input: s.to_string(),
        };
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for InterpreterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Serialize for InterpreterVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InterpreterVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_constraint() {
        let spec = VersionSpec::from_str("==1.2.3").unwrap();
        let v123 = Version::parse("1.2.3").unwrap();
        let v124 = Version::parse("1.2.4").unwrap();

        assert!(spec.matches(&v123));
        assert!(!spec.matches(&v124));
        assert_eq!(spec.pinned(), Some(&v123));
    }

    #[test]
    fn test_range_constraints() {
        let spec = VersionSpec::from_str(">=1.2,<2").unwrap();

        assert!(!spec.matches(&Version::parse("1.1.9").unwrap()));
        assert!(spec.matches(&Version::parse("1.2.0").unwrap()));
        assert!(spec.matches(&Version::parse("1.9.9").unwrap()));
        assert!(!spec.matches(&Version::parse("2.0.0").unwrap()));
        assert_eq!(spec.pinned(), None);
    }

    #[test]
    fn test_compatible_constraint() {
        let spec = VersionSpec::from_str("~=1.2.3").unwrap();
        assert!(spec.matches(&Version::parse("1.2.3").unwrap()));
        assert!(spec.matches(&Version::parse("1.2.9").unwrap()));
        assert!(!spec.matches(&Version::parse("1.3.0").unwrap()));
    }

    #[test]
    fn test_any_version() {
        let spec = VersionSpec::from_str("*").unwrap();
        assert!(spec.is_any());
        assert!(spec.matches(&Version::parse("0.0.1").unwrap()));
    }

    #[test]
    fn test_parse_version_padding() {
        assert_eq!(parse_version("2.1").unwrap(), Version::new(2, 1, 0));
        assert_eq!(parse_version("3").unwrap(), Version::new(3, 0, 0));
        let local = parse_version("2.1.0+cpu").unwrap();
        assert_eq!(local.build.as_str(), "cpu");
        assert!(parse_version("two").is_err());
    }

    #[test]
    fn test_parse_version_package_index_forms() {
        let post = parse_version("2023.3.post1").unwrap();
        assert_eq!((post.major, post.minor, post.patch), (2023, 3, 0));
        assert_eq!(post.build.as_str(), "post.1");

        let four = parse_version("1.2.3.4").unwrap();
        assert_eq!((four.major, four.minor, four.patch), (1, 2, 3));
        assert_eq!(four.build.as_str(), "4");

        assert_eq!(parse_version("2.2.0rc1").unwrap().pre.as_str(), "rc.1");
        assert_eq!(parse_version("1.0.0-alpha.2").unwrap().pre.as_str(), "a.2");
        assert_eq!(parse_version("0.8.0.dev0").unwrap().pre.as_str(), "dev.0");
        assert_eq!(parse_version("1.0-1").unwrap().build.as_str(), "post.1");
        assert_eq!(parse_version("v1.4").unwrap(), Version::new(1, 4, 0));
        assert_eq!(parse_version("0!1.4").unwrap(), Version::new(1, 4, 0));

        assert!(parse_version("1!1.4").is_err());
        assert!(parse_version("1.2.3.").is_err());
        assert!(parse_version("1.2.3+").is_err());
        assert!(parse_version("1.2.3garbage").is_err());
    }

    #[test]
    fn test_package_index_forms_order() {
        let v = |s: &str| parse_version(s).unwrap();
        assert!(v("2.2.0rc1") < v("2.2.0"));
        assert!(v("2.2.0a1") < v("2.2.0b1"));
        assert!(v("2.2.0b1") < v("2.2.0rc1"));
        assert!(v("0.8.0.dev0") < v("0.8.0"));
        assert!(v("2023.3") < v("2023.3.post1"));
        assert!(v("2023.3.post1") < v("2023.4"));
        assert!(v("1.2.3") < v("1.2.3.4"));
        assert!(v("1.2.3.4") < v("1.2.4"));
    }

    #[test]
    fn test_requirement_accepts_package_index_pins() {
        let req = Requirement::parse("pytz==2023.3.post1").unwrap();
        assert!(req.version_spec.matches(&parse_version("2023.3.post1").unwrap()));
        assert!(!req.version_spec.matches(&parse_version("2023.3").unwrap()));

        let torch = Requirement::parse("torch>=2.2.0rc1").unwrap();
        assert!(torch.version_spec.matches(&parse_version("2.2.0").unwrap()));
        assert!(!torch.version_spec.matches(&parse_version("2.1.2").unwrap()));
    }

    #[test]
    fn test_requirement_parse() {
        let req = Requirement::parse("PyOpenGL==3.1.7").unwrap();
        assert_eq!(req.name, "PyOpenGL");
        assert_eq!(req.key(), "pyopengl");
        assert_eq!(req.version_spec.pinned(), Some(&Version::new(3, 1, 7)));

        let bare = Requirement::parse("pip").unwrap();
        assert!(bare.version_spec.is_any());
        assert_eq!(bare.to_string(), "pip");

        assert!(Requirement::parse("==1.0").is_err());
        assert!(Requirement::parse("torch;rm -rf").is_err());
    }

    #[test]
    fn test_interpreter_version() {
        let v: InterpreterVersion = "3.10".parse().unwrap();
        assert_eq!(v, InterpreterVersion::new(3, 10));
        assert_eq!(v.package_name(), "python3.10");
        assert_eq!(
            InterpreterVersion::from_package_name("python3.10"),
            Some(InterpreterVersion::new(3, 10))
        );
        assert_eq!(InterpreterVersion::from_package_name("python3-pip"), None);
        assert!("3".parse::<InterpreterVersion>().is_err());
        assert!(InterpreterVersion::new(3, 9) < InterpreterVersion::new(3, 10));
    }
}
