// Filename parsing: a strict pattern pass, then a directory-aware fallback

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::LocalItem;

fn sxxexx_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<show>.*?)[\s._-]*\bs(?P<season>\d{1,2})[\s._-]?e(?P<episode>\d{1,3})(?:[\s._-]?-?e(?P<extra>\d{1,3}))?(?P<rest>.*)$",
        )
        .expect("valid SxxExx pattern")
    })
}

fn cross_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?P<show>.*?)[\s._-]*\b(?P<season>\d{1,2})x(?P<episode>\d{2,3})\b(?P<rest>.*)$")
            .expect("valid NxNN pattern")
    })
}

fn season_dir_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:season|series|s)[\s._-]*(?P<season>\d{1,2})$").expect("valid season pattern")
    })
}

fn loose_episode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[^a-z0-9])(?:episode|ep|e)[\s._-]*(?P<episode>\d{1,3})(?:$|[^0-9])")
            .expect("valid episode pattern")
    })
}

fn leading_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<episode>\d{1,3})(?:$|[^0-9])").expect("valid leading number pattern"))
}

/// Turn separator-heavy release text into words; empty text becomes None.
fn clean_words(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .map(|w| w.trim_matches(|c: char| c == '-' || c == '[' || c == ']' || c == '(' || c == ')'))
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn capture_u32(caps: &regex::Captures, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

/// Directory components between the root and the file, outermost first.
/// Decoded lossily; these only feed lookup hints and are never stored.
fn relative_dirs(root: &Path, path: &Path) -> Vec<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut dirs: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    dirs.pop();
    dirs
}

/// Primary strategy: `Show.Name.S01E02[E03].Title` or `Show Name 1x02 Title`.
pub fn parse_primary(path: &Path) -> LocalItem {
    let mut item = LocalItem {
        path: path.to_path_buf(),
        ..LocalItem::default()
    };

    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(s) => s,
        None => return item,
    };

    let caps = match sxxexx_regex().captures(stem).or_else(|| cross_regex().captures(stem)) {
        Some(c) => c,
        None => return item,
    };

    item.series_name = caps.name("show").and_then(|m| clean_words(m.as_str()));
    item.season_number = capture_u32(&caps, "season");
    item.episode_number = capture_u32(&caps, "episode");
    item.extra_episode_number = capture_u32(&caps, "extra");
    item.title_hint = caps.name("rest").and_then(|m| clean_words(m.as_str()));
    item
}

/// Fallback strategy: fill whatever the primary pass left empty from the
/// directory layout (`Show/Season 1/...`) and looser episode markers.
pub fn parse_fallback(root: &Path, item: &mut LocalItem) {
    let dirs = relative_dirs(root, &item.path);

    if item.series_name.is_none() {
        item.series_name = dirs.first().and_then(|d| clean_words(d));
    }

    if item.season_number.is_none() {
        item.season_number = dirs
            .iter()
            .rev()
            .find_map(|d| {
                if d.eq_ignore_ascii_case("specials") {
                    return Some(0);
                }
                season_dir_regex()
                    .captures(d.trim())
                    .and_then(|caps| capture_u32(&caps, "season"))
            });
    }

    if item.episode_number.is_none() {
        if let Some(stem) = item.path.file_stem().and_then(|s| s.to_str()) {
            let caps = loose_episode_regex()
                .captures(stem)
                .or_else(|| leading_number_regex().captures(stem));
            if let Some(caps) = caps {
                item.episode_number = capture_u32(&caps, "episode");
                if item.title_hint.is_none() {
                    let matched = caps.get(0).map(|m| m.end()).unwrap_or(0);
                    item.title_hint = clean_words(&stem[matched..]);
                }
            }
        }
    }
}

/// Parse one path: primary pattern first, fallback only when still incomplete.
pub fn parse_item(root: &Path, path: &Path) -> LocalItem {
    let mut item = parse_primary(path);
    if !item.is_fully_parsed() {
        log::debug!("Primary parse incomplete for {}, trying fallback", path.display());
        parse_fallback(root, &mut item);
    }
    item
}

/// Lazily parse a sequence of discovered paths.
pub fn parse_items<I>(root: &Path, paths: I) -> impl Iterator<Item = LocalItem>
where
    I: IntoIterator<Item = PathBuf>,
{
    let root = root.to_path_buf();
    paths.into_iter().map(move |path| parse_item(&root, &path))
}
