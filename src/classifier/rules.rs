//! Data-driven classification rules.

use crate::config::ClassifierSettings;
use anyhow::{Context, Result};
use regex::Regex;

pub const DEFAULT_DOMAIN_GENRES: &[&str] = &[
    "k-pop",
    "korean pop",
    "korean",
    "korean hip hop",
    "korean r&b",
    "korean rock",
];

pub const DEFAULT_DOMAIN_NAME_KEYWORDS: &[&str] = &[
    "twice", "blackpink", "bts", "stray", "ateez", "itzy", "aespa", "ive", "newjeans",
    "sserafim", "gidle", "nmixx", "kep1er", "seventeen", "nct", "enhypen", "txt", "treasure",
    "the boyz",
];

/// Matched against the name as written; case matters for the acronym rule.
pub const DEFAULT_DOMAIN_NAME_PATTERNS: &[&str] = &[
    r"(?i)\b(girl|boy)s?\b",
    r"(?i)\b\d+(kids?|teens?)\b",
    r"^[A-Z]{2,8}$",
    r"(?i)[xz]{2,}",
];

pub const DEFAULT_LABEL_KEYWORDS: &[&str] = &[
    "entertainment",
    "records",
    "music",
    "label",
    "company",
    "corporation",
    "inc",
    "ltd",
    "production",
    "official",
];

pub const DEFAULT_SUSPICIOUS_NAME_PATTERNS: &[&str] = &[
    r"^\d",
    r"(?i)soundtrack",
    r"(?i)various",
    r"(?i)\bvol\.",
    r"(?i)\bpt\.",
    r"(?i)\bpart\b",
];

pub const DEFAULT_RELEASE_PLACEHOLDER_PATTERNS: &[&str] = &[
    r"(?i)^\s*\(null\)\s*$",
    r"(?i)^\s*null\s*$",
    r"(?i)^\s*undefined\s*$",
    r"(?i)karaoke\s+version",
    r"(?i)\(karaoke\)",
    r"(?i)soundtrack.*pt\.",
];

/// Exact names treated as placeholders when sweeping stored releases.
pub const PLACEHOLDER_RELEASE_NAMES: &[&str] = &["null", "(null)", "undefined"];

pub const DEFAULT_EXCLUDED_GROUPINGS: &[&str] = &["compilation", "appears_on"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    GroupName,
    /// Each declared genre is tested separately.
    Genre,
    ReleaseName,
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive substring of the field.
    Substring(Vec<String>),
    /// Case-insensitive whole word of the field.
    Word(Vec<String>),
    Pattern(Regex),
}

impl Matcher {
    fn words(keywords: &[String]) -> Self {
        Matcher::Word(keywords.iter().map(|k| k.to_lowercase()).collect())
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Substring(keywords) => {
                let lower = text.to_lowercase();
                keywords.iter().any(|k| lower.contains(k.as_str()))
            }
            Matcher::Word(keywords) => {
                let lower = text.to_lowercase();
                lower
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .any(|w| keywords.iter().any(|k| k == w))
            }
            Matcher::Pattern(regex) => regex.is_match(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEffect {
    /// Evidence that the candidate belongs to the harvested domain.
    DomainSignal,
    Reject(String),
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub field: RuleField,
    pub matcher: Matcher,
    pub effect: RuleEffect,
}

impl Rule {
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.matches(text)
    }
}

#[derive(Debug, Clone)]
pub struct Thresholds {
    pub min_name_length: usize,
    pub min_popularity: u32,
    /// Popularity above which a domain-looking name substitutes for a genre.
    pub domain_name_popularity: u32,
    pub min_track_count: u32,
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub thresholds: Thresholds,
    pub excluded_groupings: Vec<String>,
}

fn compile_patterns(
    patterns: &[String],
    field: RuleField,
    rule_prefix: &str,
    effect: &RuleEffect,
) -> Result<Vec<Rule>> {
    patterns
        .iter()
        .map(|pattern| {
            let regex = Regex::new(pattern)
                .with_context(|| format!("Invalid {} pattern: {}", rule_prefix, pattern))?;
            Ok(Rule {
                name: format!("{} {}", rule_prefix, pattern),
                field,
                matcher: Matcher::Pattern(regex),
                effect: effect.clone(),
            })
        })
        .collect()
}

impl RuleSet {
    pub fn new(settings: &ClassifierSettings) -> Result<Self> {
        let mut rules = vec![
            Rule {
                name: "domain genre".to_string(),
                field: RuleField::Genre,
                matcher: Matcher::Substring(
                    settings
                        .domain_genres
                        .iter()
                        .map(|g| g.to_lowercase())
                        .collect(),
                ),
                effect: RuleEffect::DomainSignal,
            },
            Rule {
                name: "domain name keyword".to_string(),
                field: RuleField::GroupName,
                matcher: Matcher::Substring(
                    settings
                        .domain_name_keywords
                        .iter()
                        .map(|k| k.to_lowercase())
                        .collect(),
                ),
                effect: RuleEffect::DomainSignal,
            },
            Rule {
                name: "label keyword".to_string(),
                field: RuleField::GroupName,
                matcher: Matcher::words(&settings.label_keywords),
                effect: RuleEffect::Reject("label or company name".to_string()),
            },
        ];
        rules.extend(compile_patterns(
            &settings.domain_name_patterns,
            RuleField::GroupName,
            "domain name",
            &RuleEffect::DomainSignal,
        )?);
        rules.extend(compile_patterns(
            &settings.suspicious_name_patterns,
            RuleField::GroupName,
            "suspicious name",
            &RuleEffect::Reject("suspicious name".to_string()),
        )?);
        rules.extend(compile_patterns(
            &settings.release_placeholder_patterns,
            RuleField::ReleaseName,
            "placeholder release",
            &RuleEffect::Reject("placeholder or suspect release name".to_string()),
        )?);

        Ok(Self {
            rules,
            thresholds: Thresholds {
                min_name_length: settings.min_name_length,
                min_popularity: settings.min_popularity,
                domain_name_popularity: settings.domain_name_popularity,
                min_track_count: settings.min_track_count,
            },
            excluded_groupings: settings
                .excluded_groupings
                .iter()
                .map(|g| g.to_lowercase())
                .collect(),
        })
    }

    fn for_field(&self, field: RuleField) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.field == field)
    }

    /// `true` if any domain-signal rule on `field` matches `text`.
    pub fn has_domain_signal(&self, field: RuleField, text: &str) -> bool {
        self.for_field(field)
            .any(|r| r.effect == RuleEffect::DomainSignal && r.matches(text))
    }

    /// The first rejecting rule on `field` that matches `text`.
    pub fn rejection(&self, field: RuleField, text: &str) -> Option<&Rule> {
        self.for_field(field)
            .find(|r| matches!(r.effect, RuleEffect::Reject(_)) && r.matches(text))
    }

    pub fn has_domain_genre(&self, genres: &[String]) -> bool {
        genres
            .iter()
            .any(|g| self.has_domain_signal(RuleField::Genre, g))
    }

    pub fn is_excluded_grouping(&self, grouping: &str) -> bool {
        let grouping = grouping.to_lowercase();
        self.excluded_groupings.iter().any(|g| *g == grouping)
    }
}
