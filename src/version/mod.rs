// src/version/mod.rs

//! Version ranges and constraint satisfaction for npm-style dependencies
//!
//! A range is a disjunction (`||`) of comparator sets. Every comparator set
//! normalises to a single [`Interval`], which makes satisfaction a bounds check
//! and range intersection an overlap test.
//!
//! Supported syntax:
//! - `*`, `x`, empty string, `latest` → any version
//! - `1.2.3`, `=1.2.3`, `v1.2.3` → exact
//! - `>`, `>=`, `<`, `<=` with full or partial versions
//! - `^1.2.3`, `~1.2.3`, `1.x`, `1.2.*`, `1`
//! - `1.2.3 - 2.3.4` hyphen ranges
//! - whitespace or comma separated conjunctions

use crate::error::{Error, Result};
use semver::{Prerelease, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse a concrete package version, tolerating a leading `v` or `=`
pub fn parse_version(s: &str) -> Result<Version> {
    let trimmed = s.trim().trim_start_matches('=').trim_start_matches('v');
    Version::parse(trimmed)
        .map_err(|e| Error::RangeError(format!("Invalid version '{}': {}", s, e)))
}

/// One end of an [`Interval`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    Inclusive(Version),
    Exclusive(Version),
}

/// A contiguous span of versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub lower: Bound,
    pub upper: Bound,
    /// `major.minor.patch` tuples whose prereleases are allowed to match
    prerelease_tuples: Vec<(u64, u64, u64)>,
}

impl Interval {
    /// The interval containing every version
    pub fn any() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            prerelease_tuples: Vec::new(),
        }
    }

    /// An interval containing nothing (`>*`, `<*`)
    fn empty() -> Self {
        Self {
            lower: Bound::Inclusive(Version::new(0, 0, 0)),
            upper: Bound::Exclusive(Version::new(0, 0, 0)),
            prerelease_tuples: Vec::new(),
        }
    }

    /// True if no version can fall inside the bounds
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Inclusive(lo), Bound::Inclusive(hi)) => lo > hi,
            (Bound::Inclusive(lo), Bound::Exclusive(hi))
            | (Bound::Exclusive(lo), Bound::Inclusive(hi))
            | (Bound::Exclusive(lo), Bound::Exclusive(hi)) => lo >= hi,
        }
    }

    /// Check whether a version lies inside this interval
    pub fn contains(&self, version: &Version) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Inclusive(lo) => version >= lo,
            Bound::Exclusive(lo) => version > lo,
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Inclusive(hi) => version <= hi,
            Bound::Exclusive(hi) => version < hi,
        };
        if !(above && below) {
            return false;
        }
        if version.pre.is_empty() {
            return true;
        }
        self.prerelease_tuples
            .contains(&(version.major, version.minor, version.patch))
    }

    /// Intersection of two intervals (may be empty)
    pub fn intersect(&self, other: &Interval) -> Interval {
        let mut result = self.clone();
        result.tighten_lower(other.lower.clone());
        result.tighten_upper(other.upper.clone());
        for tuple in &other.prerelease_tuples {
            if !result.prerelease_tuples.contains(tuple) {
                result.prerelease_tuples.push(*tuple);
            }
        }
        result
    }

    fn tighten_lower(&mut self, bound: Bound) {
        let replace = match (&self.lower, &bound) {
            (_, Bound::Unbounded) => false,
            (Bound::Unbounded, _) => true,
            (Bound::Inclusive(cur), Bound::Inclusive(new))
            | (Bound::Exclusive(cur), Bound::Exclusive(new)) => new > cur,
            (Bound::Inclusive(cur), Bound::Exclusive(new)) => new >= cur,
            (Bound::Exclusive(cur), Bound::Inclusive(new)) => new > cur,
        };
        if replace {
            self.lower = bound;
        }
    }

    fn tighten_upper(&mut self, bound: Bound) {
        let replace = match (&self.upper, &bound) {
            (_, Bound::Unbounded) => false,
            (Bound::Unbounded, _) => true,
            (Bound::Inclusive(cur), Bound::Inclusive(new))
            | (Bound::Exclusive(cur), Bound::Exclusive(new)) => new < cur,
            (Bound::Inclusive(cur), Bound::Exclusive(new)) => new <= cur,
            (Bound::Exclusive(cur), Bound::Inclusive(new)) => new < cur,
        };
        if replace {
            self.upper = bound;
        }
    }

    /// Lowest release version inside the interval, if one exists
    fn min_version(&self) -> Option<Version> {
        let candidate = match &self.lower {
            Bound::Unbounded => Version::new(0, 0, 0),
            Bound::Inclusive(v) => v.clone(),
            Bound::Exclusive(v) if v.pre.is_empty() => next_patch(v.major, v.minor, v.patch)?,
            Bound::Exclusive(v) => Version::new(v.major, v.minor, v.patch),
        };
        if self.contains(&candidate) {
            Some(candidate)
        } else {
            None
        }
    }
}

/// A possibly-partial version as written in a range (`1`, `1.2`, `1.2.x`)
#[derive(Debug, Clone)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn parse(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('=').trim_start_matches('v');
        // Build metadata never affects precedence
        let s = s.split('+').next().unwrap_or_default();

        let (core, pre) = match s.split_once('-') {
            Some((core, pre)) => (core, pre),
            None => (s, ""),
        };

        let mut parts = core.split('.');
        let major = Self::component(parts.next(), s)?;
        let minor = Self::component(parts.next(), s)?;
        let patch = Self::component(parts.next(), s)?;
        if parts.next().is_some() {
            return Err(Error::RangeError(format!("Too many version components in '{}'", s)));
        }

        // Once a component is a wildcard, the rest are too
        let minor = major.and(minor);
        let patch = minor.and(patch);

        let pre = if pre.is_empty() || patch.is_none() {
            Prerelease::EMPTY
        } else {
            Prerelease::new(pre)
                .map_err(|e| Error::RangeError(format!("Invalid prerelease in '{}': {}", s, e)))?
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    fn component(part: Option<&str>, whole: &str) -> Result<Option<u64>> {
        match part {
            None | Some("x") | Some("X") | Some("*") | Some("") => Ok(None),
            Some(n) => n.parse::<u64>().map(Some).map_err(|_| {
                Error::RangeError(format!("Invalid version component '{}' in '{}'", n, whole))
            }),
        }
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// Fill missing components with zeros
    fn floor(&self) -> Version {
        let mut v = Version::new(
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
        );
        v.pre = self.pre.clone();
        v
    }

    /// First version past the wildcard span (`1.2` → `1.3.0`, `1` → `2.0.0`)
    ///
    /// `None` when the span is unbounded above.
    fn ceiling(&self) -> Option<Version> {
        next_release(self.major?, self.minor)
    }

    fn prerelease_tuple(&self) -> Option<(u64, u64, u64)> {
        if self.pre.is_empty() {
            return None;
        }
        Some((self.major?, self.minor?, self.patch?))
    }
}

/// First version above every `major.minor.*`, or every `major.*` without a minor
///
/// Components at `u64::MAX` carry into the next one; `None` means nothing
/// lies above.
fn next_release(major: u64, minor: Option<u64>) -> Option<Version> {
    match minor.and_then(|m| m.checked_add(1)) {
        Some(next) => Some(Version::new(major, next, 0)),
        None => major.checked_add(1).map(|m| Version::new(m, 0, 0)),
    }
}

fn next_patch(major: u64, minor: u64, patch: u64) -> Option<Version> {
    match patch.checked_add(1) {
        Some(next) => Some(Version::new(major, minor, next)),
        None => next_release(major, Some(minor)),
    }
}

/// Build the interval for a single comparator such as `>=1.2` or `^0.3.1`
fn comparator_interval(op: &str, partial: &Partial) -> Interval {
    let mut interval = Interval::any();
    if let Some(tuple) = partial.prerelease_tuple() {
        interval.prerelease_tuples.push(tuple);
    }
    if partial.major.is_none() {
        return match op {
            ">" | "<" => Interval::empty(),
            _ => interval,
        };
    }

    let floor = partial.floor();
    match op {
        "" | "=" => {
            if partial.is_full() {
                interval.lower = Bound::Inclusive(floor.clone());
                interval.upper = Bound::Inclusive(floor);
            } else {
                interval.lower = Bound::Inclusive(floor);
                interval.upper = partial.ceiling().map_or(Bound::Unbounded, Bound::Exclusive);
            }
        }
        ">" => {
            interval.lower = if partial.is_full() {
                Bound::Exclusive(floor)
            } else {
                match partial.ceiling() {
                    Some(ceiling) => Bound::Inclusive(ceiling),
                    None => return Interval::empty(),
                }
            };
        }
        ">=" => interval.lower = Bound::Inclusive(floor),
        "<" => interval.upper = Bound::Exclusive(floor),
        "<=" => {
            interval.upper = if partial.is_full() {
                Bound::Inclusive(floor)
            } else {
                partial.ceiling().map_or(Bound::Unbounded, Bound::Exclusive)
            };
        }
        "~" => {
            interval.lower = Bound::Inclusive(floor.clone());
            interval.upper = next_release(floor.major, partial.minor)
                .map_or(Bound::Unbounded, Bound::Exclusive);
        }
        "^" => {
            interval.lower = Bound::Inclusive(floor.clone());
            let upper = match (partial.major, partial.minor, partial.patch) {
                (Some(0), Some(0), Some(patch)) => next_patch(0, 0, patch),
                (Some(0), Some(minor), _) => next_release(0, Some(minor)),
                (Some(major), _, _) => next_release(major, None),
                (None, _, _) => return Interval::any(),
            };
            interval.upper = upper.map_or(Bound::Unbounded, Bound::Exclusive);
        }
        _ => {}
    }
    interval
}

/// Split a leading operator from a comparator token
fn split_operator(token: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<", "=", "^", "~"] {
        if let Some(rest) = token.strip_prefix(op) {
            // `~>` is accepted as an alias for `~`
            let rest = if op == "~" { rest.strip_prefix('>').unwrap_or(rest) } else { rest };
            return (op, rest);
        }
    }
    ("", token)
}

fn parse_comparator_set(set: &str) -> Result<Interval> {
    let normalized = set.replace(',', " ");
    let raw_tokens: Vec<&str> = normalized.split_whitespace().collect();

    // Re-attach operators written with a space (`>= 1.0`)
    let mut tokens: Vec<String> = Vec::with_capacity(raw_tokens.len());
    let mut i = 0;
    while i < raw_tokens.len() {
        let token = raw_tokens[i];
        let is_bare_op = matches!(token, ">=" | "<=" | ">" | "<" | "=" | "^" | "~" | "~>");
        if is_bare_op && i + 1 < raw_tokens.len() {
            tokens.push(format!("{}{}", token, raw_tokens[i + 1]));
            i += 2;
        } else {
            tokens.push(token.to_string());
            i += 1;
        }
    }

    if tokens.len() == 3 && tokens[1] == "-" {
        let from = Partial::parse(&tokens[0])?;
        let to = Partial::parse(&tokens[2])?;
        let mut interval = Interval::any();
        if from.major.is_some() {
            interval.lower = Bound::Inclusive(from.floor());
        }
        interval.upper = if to.is_full() {
            Bound::Inclusive(to.floor())
        } else {
            to.ceiling().map_or(Bound::Unbounded, Bound::Exclusive)
        };
        for tuple in [from.prerelease_tuple(), to.prerelease_tuple()].into_iter().flatten() {
            interval.prerelease_tuples.push(tuple);
        }
        return Ok(interval);
    }

    let mut interval = Interval::any();
    for token in &tokens {
        if token == "-" {
            return Err(Error::RangeError(format!("Malformed hyphen range '{}'", set.trim())));
        }
        let (op, version) = split_operator(token);
        let partial = Partial::parse(version)?;
        interval = interval.intersect(&comparator_interval(op, &partial));
    }
    Ok(interval)
}

/// A parsed npm-style version range
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    sets: Vec<Interval>,
}

impl VersionRange {
    /// Parse a range string
    ///
    /// Registry-external specifiers (`file:`, `git+…`, URLs, `workspace:`)
    /// are rejected since they cannot be compared against published versions.
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.contains(':') || raw.contains('/') {
            return Err(Error::RangeError(format!(
                "'{}' is not a registry version range",
                raw
            )));
        }

        if raw.is_empty() || raw == "latest" {
            return Ok(Self::any_with_raw(raw));
        }

        let mut sets = Vec::new();
        for set in raw.split("||") {
            if set.trim().is_empty() {
                sets.push(Interval::any());
            } else {
                sets.push(parse_comparator_set(set)?);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            sets,
        })
    }

    /// The range accepting any version
    pub fn any() -> Self {
        Self::any_with_raw("*")
    }

    fn any_with_raw(raw: &str) -> Self {
        Self {
            raw: if raw.is_empty() { "*".to_string() } else { raw.to_string() },
            sets: vec![Interval::any()],
        }
    }

    /// Caret range starting at a concrete version (`^1.2.3`)
    pub fn caret(version: &Version) -> Self {
        let partial = Partial {
            major: Some(version.major),
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        };
        Self {
            raw: format!("^{}", version),
            sets: vec![comparator_interval("^", &partial)],
        }
    }

    /// Exact range for a concrete version
    pub fn exact(version: &Version) -> Self {
        let partial = Partial {
            major: Some(version.major),
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        };
        Self {
            raw: version.to_string(),
            sets: vec![comparator_interval("=", &partial)],
        }
    }

    /// Check if a version satisfies this range
    pub fn satisfies(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| set.contains(version))
    }

    /// Check if some version could satisfy both ranges at once
    ///
    /// Prerelease admission is ignored here; the test is on interval bounds.
    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.sets
            .iter()
            .any(|a| other.sets.iter().any(|b| !a.intersect(b).is_empty()))
    }

    /// Lowest release version the range admits
    pub fn min_version(&self) -> Option<Version> {
        self.sets.iter().filter_map(Interval::min_version).min()
    }

    /// True if this range places no constraint at all
    pub fn is_any(&self) -> bool {
        self.sets
            .iter()
            .any(|s| s.lower == Bound::Unbounded && s.upper == Bound::Unbounded)
    }

    /// The range as originally written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Normalised intervals, one per `||` alternative
    pub fn intervals(&self) -> &[Interval] {
        &self.sets
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.sets == other.sets
    }
}

impl Eq for VersionRange {}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionRange::parse(&raw).map_err(serde::de::Error::custom)
    }
}
