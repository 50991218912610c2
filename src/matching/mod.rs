//! Team-name normalization and fuzzy matching.
//!
//! This module provides:
//! - `normalize`: canonical comparable form of a raw team name
//! - `similarity`: edit-distance ratio between two normalized strings
//! - `find_best_match`: best internal team for an external name
//! - `competition_similarity`: loose competition-label agreement
//!
//! The alias table and the generic prefix/suffix lists are configuration
//! data, built once per process. Matching itself never gates an update;
//! it only scores. Gating lives in the decision engine.

use std::collections::HashMap;
use std::sync::OnceLock;
use strsim::levenshtein;

use crate::types::{MatchMethod, TeamCandidate, TeamMatch};

pub mod candidates;

/// Known multi-form club names, keyed by their folded lower-case form.
/// Every canonical value must itself normalize to itself: either a
/// self-mapped key (required when stripping would mangle it, e.g.
/// "real madrid") or a name no prefix/suffix rule touches.
static CLUB_ALIASES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn club_aliases() -> &'static HashMap<&'static str, &'static str> {
    CLUB_ALIASES.get_or_init(|| {
        let mut map = HashMap::new();
        let entries: &[(&str, &str)] = &[
            ("inter", "inter milan"),
            ("internazionale", "inter milan"),
            ("internazionale milano", "inter milan"),
            ("fc internazionale milano", "inter milan"),
            ("inter milan", "inter milan"),
            ("paphos", "pafos"),
            ("paphos fc", "pafos"),
            ("pafos fc", "pafos"),
            ("pafos", "pafos"),
            ("man utd", "manchester"),
            ("man united", "manchester"),
            ("manchester utd", "manchester"),
            ("psg", "paris saint germain"),
            ("paris sg", "paris saint germain"),
            ("paris saint germain", "paris saint germain"),
            ("barca", "barcelona"),
            ("juve", "juventus"),
            ("spurs", "tottenham"),
            ("tottenham hotspur", "tottenham"),
            ("wolverhampton", "wolves"),
            ("wolverhampton wanderers", "wolves"),
            ("brighton and hove albion", "brighton"),
            ("brighton hove albion", "brighton"),
            ("bayern", "bayern munich"),
            ("bayern munchen", "bayern munich"),
            ("bayern munich", "bayern munich"),
            ("bvb", "borussia dortmund"),
            ("dortmund", "borussia dortmund"),
            ("borussia dortmund", "borussia dortmund"),
            ("atletico", "atletico madrid"),
            ("atletico de madrid", "atletico madrid"),
            ("atletico madrid", "atletico madrid"),
            ("real madrid", "real madrid"),
            ("real sociedad", "real sociedad"),
            ("real betis", "real betis"),
            ("real betis balompie", "real betis"),
            ("sporting clube de portugal", "sporting"),
            ("sporting cp", "sporting"),
            ("sporting lisbon", "sporting"),
            ("sporting", "sporting"),
        ];
        for (from, to) in entries {
            map.insert(*from, *to);
        }
        map
    })
}

/// Generic club-name prefixes, stripped when nothing in the alias table
/// claimed the name. Order matters only for readability; stripping loops
/// until no prefix applies.
const GENERIC_PREFIXES: &[&str] = &[
    "sporting clube de ",
    "club atletico ",
    "afc ",
    "fc ",
    "ac ",
    "as ",
    "ss ",
    "sc ",
    "cd ",
    "cf ",
    "rcd ",
    "rc ",
    "real ",
    "royal ",
    "club ",
];

/// Generic club-name suffixes, stripped the same way.
const GENERIC_SUFFIXES: &[&str] = &[
    " clube de portugal",
    " futebol clube",
    " united",
    " calcio",
    " afc",
    " fc",
    " cf",
    " sc",
    " cp",
    " bk",
    " if",
    " fk",
];

/// Words too generic to carry signal when comparing competition labels.
const COMPETITION_STOPWORDS: &[&str] = &["the", "of", "de", "la", "le", "del", "do", "da"];

/// Fold one lower-case character's diacritics to an ASCII equivalent.
fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'ř' => "r",
        'š' | 'ś' | 'ş' => "s",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ů' | 'ū' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ž' | 'ź' | 'ż' => "z",
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        _ => return None,
    };
    Some(folded)
}

/// Lower-case, fold accents, drop punctuation, collapse whitespace.
fn fold_and_collapse(s: &str) -> String {
    let mut folded = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match fold_char(c) {
            Some(ascii) => folded.push_str(ascii),
            None if c.is_alphanumeric() || c.is_whitespace() => folded.push(c),
            None => {}
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One round of prefix/suffix stripping. A name that would strip down to
/// nothing keeps its current form.
fn strip_affixes_round(name: &str) -> String {
    let mut next = name.to_string();
    for prefix in GENERIC_PREFIXES {
        if let Some(rest) = next.strip_prefix(prefix) {
            next = rest.to_string();
            break;
        }
    }
    for suffix in GENERIC_SUFFIXES {
        if let Some(rest) = next.strip_suffix(suffix) {
            next = rest.to_string();
            break;
        }
    }
    let next = next.trim();
    if next.is_empty() {
        name.to_string()
    } else {
        next.to_string()
    }
}

/// Canonicalize a raw team name into its comparable form.
///
/// Rules: accent folding, then alternating alias-table lookup and generic
/// prefix/suffix stripping until a fixpoint. The alias check runs again
/// after every stripping round, so a key reachable only once an affix is
/// gone ("FC Bayern Munchen" -> "bayern munchen" -> "bayern munich") still
/// resolves. Alias canonical forms are themselves fixpoints, keeping the
/// whole function deterministic, idempotent and total (empty -> empty).
pub fn normalize(raw: &str) -> String {
    let mut current = fold_and_collapse(raw);
    if current.is_empty() {
        return current;
    }
    loop {
        if let Some(canonical) = club_aliases().get(current.as_str()) {
            return (*canonical).to_string();
        }
        let stripped = strip_affixes_round(&current);
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Canonicalize a competition label: folding and collapsing only, no club
/// affix stripping.
pub fn normalize_label(raw: &str) -> String {
    fold_and_collapse(raw)
}

/// Edit-distance similarity between two normalized strings, in [0.0, 1.0].
///
/// `1 - levenshtein(a, b) / max(len(a), len(b))` over characters. Two
/// empty strings are defined as 1.0; one empty and one not, 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = levenshtein(a, b) as f64;
    let longer = a.chars().count().max(b.chars().count()) as f64;
    (1.0 - distance / longer).clamp(0.0, 1.0)
}

/// Fuzzy score for one candidate name: the weaker of the comparison on
/// canonical (stripped) forms and on folded-but-unstripped forms. Affix
/// stripping shortens stems, and a score that only survives on the
/// stripped pair is noise, not resemblance.
fn fuzzy_similarity(target_norm: &str, target_folded: &str, candidate_name: &str) -> f64 {
    let on_stripped = similarity(target_norm, &normalize(candidate_name));
    let on_folded = similarity(target_folded, &fold_and_collapse(candidate_name));
    on_stripped.min(on_folded)
}

/// Find the best internal team for an external name.
///
/// Exact normalized equality (against full or short name) wins outright at
/// score 1.0. Otherwise the candidate with the highest fuzzy score over
/// both its names wins; ties break first-seen in input order. Returns
/// `None` when nothing clears `floor` — the floor only rejects garbage,
/// tier gating happens downstream.
pub fn find_best_match(
    external_name: &str,
    candidates: &[TeamCandidate],
    floor: f64,
) -> Option<TeamMatch> {
    let target = normalize(external_name);
    if target.is_empty() {
        return None;
    }
    let target_folded = fold_and_collapse(external_name);

    for candidate in candidates {
        let name_norm = normalize(&candidate.name);
        let short_norm = candidate.short_name.as_deref().map(normalize);
        if name_norm == target || short_norm.as_deref() == Some(target.as_str()) {
            return Some(TeamMatch {
                team: candidate.clone(),
                score: 1.0,
                method: MatchMethod::ExactNormalized,
            });
        }
    }

    let mut best: Option<TeamMatch> = None;
    for candidate in candidates {
        let mut score = fuzzy_similarity(&target, &target_folded, &candidate.name);
        if let Some(short) = candidate.short_name.as_deref() {
            score = score.max(fuzzy_similarity(&target, &target_folded, short));
        }
        // Strictly-greater keeps the first-seen candidate on ties
        if score > best.as_ref().map(|b| b.score).unwrap_or(0.0) {
            best = Some(TeamMatch {
                team: candidate.clone(),
                score,
                method: MatchMethod::Fuzzy,
            });
        }
    }

    best.filter(|b| b.score >= floor && b.score > 0.0)
}

/// Similarity between two competition labels.
///
/// 1.0 for normalized equality, 0.8 when one contains the other, else the
/// fraction of shared significant words. Either side empty scores 0.0.
pub fn competition_similarity(a: &str, b: &str) -> f64 {
    let a_norm = normalize_label(a);
    let b_norm = normalize_label(b);
    if a_norm.is_empty() || b_norm.is_empty() {
        return 0.0;
    }
    if a_norm == b_norm {
        return 1.0;
    }
    if a_norm.contains(&b_norm) || b_norm.contains(&a_norm) {
        return 0.8;
    }

    let significant = |s: &str| -> Vec<String> {
        s.split_whitespace()
            .filter(|w| !COMPETITION_STOPWORDS.contains(w))
            .map(|w| w.to_string())
            .collect()
    };
    let a_words = significant(&a_norm);
    let b_words = significant(&b_norm);
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }
    let shared = a_words.iter().filter(|w| b_words.contains(w)).count();
    shared as f64 / a_words.len().max(b_words.len()) as f64
}
