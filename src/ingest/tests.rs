// End-to-end reconciliation scenarios

use super::*;
use crate::db::query::Filter;
use crate::db::schema::{self, Episode, Season, Series};
use crate::remote::{JsonCatalog, LookupError, RemoteSeason, RemoteSeries};
use std::path::Path;
use tempfile::TempDir;

/// Lookup double driven by a closure.
struct FnLookup<F>(F);

fn lookup_with<F>(f: F) -> FnLookup<F>
where
    F: Fn(&LocalItem) -> std::result::Result<Option<RemoteEpisode>, LookupError>,
{
    FnLookup(f)
}

impl<F> EpisodeLookup for FnLookup<F>
where
    F: Fn(&LocalItem) -> std::result::Result<Option<RemoteEpisode>, LookupError>,
{
    fn lookup(&self, item: &LocalItem) -> std::result::Result<Option<RemoteEpisode>, LookupError> {
        (self.0)(item)
    }
}

/// Temp root with an initialized cache.
fn setup_session() -> (TempDir, SourceSession) {
    let tmp = TempDir::new().unwrap();
    let session = SourceSession::new(tmp.path());
    session.initialize_database().unwrap();
    (tmp, session)
}

fn local_item(root: &Path, relative: &str, season: u32, episode: u32) -> LocalItem {
    LocalItem {
        path: root.join(relative),
        series_name: Some("Show".to_string()),
        season_number: Some(season),
        episode_number: Some(episode),
        ..LocalItem::default()
    }
}

fn remote_episode(series_id: &str, season_id: &str, episode_id: &str, number: &str) -> RemoteEpisode {
    RemoteEpisode {
        id: episode_id.to_string(),
        episode_number: number.to_string(),
        name: Some(format!("Episode {}", number)),
        overview: Some("Things happen".to_string()),
        first_aired: Some("2011-04-17".to_string()),
        season: RemoteSeason {
            id: season_id.to_string(),
            number: "1".to_string(),
            series: RemoteSeries {
                id: series_id.to_string(),
                name: "Show".to_string(),
                overview: None,
                first_aired: Some("2011-04-17".to_string()),
                runtime: Some("60".to_string()),
                network: Some("HBO".to_string()),
            },
        },
    }
}

fn count(session: &SourceSession, table: &str) -> i64 {
    let conn = session.store().connect().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

fn always_found() -> FnLookup<impl Fn(&LocalItem) -> std::result::Result<Option<RemoteEpisode>, LookupError>> {
    lookup_with(|_: &LocalItem| Ok(Some(remote_episode("100", "200", "300", "1"))))
}

// ---------------------------------------------------------------
// One resolvable item produces exactly one row per entity
// ---------------------------------------------------------------
#[test]
fn test_single_success_writes_full_cascade() {
    let (tmp, session) = setup_session();
    let mut resolved = ResolvedItems::new();
    let items = vec![local_item(tmp.path(), "Show/Season 1/Show.S01E01.mkv", 1, 1)];

    let summary = run_reconcile(&session, &mut resolved, items, &always_found(), &ReconcileOptions::default()).unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.persisted, 1);
    assert!(summary.unresolved.is_empty());

    assert_eq!(count(&session, "series"), 1);
    assert_eq!(count(&session, "season"), 1);
    assert_eq!(count(&session, "episode"), 1);

    let episode: Episode = session.episode(300).unwrap().expect("episode 300");
    assert_eq!(episode.season_id, 200);
    assert_eq!(episode.file_path, "Show/Season 1/Show.S01E01.mkv");
    assert_eq!(episode.series_id, Some(100));

    let season: Season = session.season(episode.season_id).unwrap().expect("season 200");
    assert_eq!(season.series_id, 100);
    let series: Series = session.series(season.series_id).unwrap().expect("series 100");
    assert_eq!(series.runtime_minutes, Some(60));

    let item = resolved.get("Show/Season 1/Show.S01E01.mkv").expect("resolved item kept");
    assert_eq!(item.remote.as_ref().map(|r| r.id.as_str()), Some("300"));
}

// ---------------------------------------------------------------
// EpisodeNotFound ledgers the path and both ancestors
// ---------------------------------------------------------------
#[test]
fn test_lookup_failure_ledgers_ancestor_chain() {
    let (tmp, session) = setup_session();
    let mut resolved = ResolvedItems::new();
    let lookup = lookup_with(|_: &LocalItem| {
        Err(LookupError::EpisodeNotFound { show: "Show".to_string(), season: 1, episode: 1 })
    });
    let items = vec![local_item(tmp.path(), "Show/Season 1/ep01.mkv", 1, 1)];

    let summary = run_reconcile(&session, &mut resolved, items, &lookup, &ReconcileOptions::default()).unwrap();

    assert_eq!(summary.unresolved, vec!["Show/Season 1/ep01.mkv".to_string()]);
    assert!(resolved.is_empty());
    assert_eq!(count(&session, "episode"), 0);

    let rows = crate::ledger::list_all(session.store()).unwrap();
    let chain: Vec<(&str, Option<&str>)> = rows
        .iter()
        .map(|r| (r.child_path.as_str(), r.parent_path.as_deref()))
        .collect();
    assert_eq!(
        chain,
        vec![
            ("Show/Season 1/ep01.mkv", Some("Show/Season 1")),
            ("Show/Season 1", Some("Show")),
            ("Show", None),
        ]
    );

    assert_eq!(session.unresolved_under(None).unwrap().len(), 1);
    assert_eq!(session.unresolved_under(Some("Show/Season 1")).unwrap()[0].filename, "ep01.mkv");
}

// ---------------------------------------------------------------
// Re-running a successful pass is a no-op that does not crash
// ---------------------------------------------------------------
#[test]
fn test_rerun_is_idempotent() {
    let (tmp, session) = setup_session();
    let options = ReconcileOptions::default();
    let items = || vec![local_item(tmp.path(), "Show/Season 1/Show.S01E01.mkv", 1, 1)];

    let mut first = ResolvedItems::new();
    run_reconcile(&session, &mut first, items(), &always_found(), &options).unwrap();

    let mut second = ResolvedItems::new();
    let summary = run_reconcile(&session, &mut second, items(), &always_found(), &options).unwrap();

    assert_eq!(summary.persisted, 0);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.write_failed, 0);
    assert_eq!(count(&session, "episode"), 1);
    assert_eq!(count(&session, "series"), 1);
    assert_eq!(second.len(), 1);
}

// ---------------------------------------------------------------
// Recording the same failure twice keeps one row per path
// ---------------------------------------------------------------
#[test]
fn test_repeated_failure_is_not_duplicated() {
    let (tmp, session) = setup_session();
    let lookup = lookup_with(|item: &LocalItem| {
        Err(LookupError::ShowNotFound(item.series_name.clone().unwrap_or_default()))
    });
    let options = ReconcileOptions::default();

    for _ in 0..2 {
        let items = vec![local_item(tmp.path(), "Show/Season 1/ep01.mkv", 1, 1)];
        let summary = run_reconcile(&session, &mut ResolvedItems::new(), items, &lookup, &options).unwrap();
        assert_eq!(summary.unresolved.len(), 1);
    }

    assert_eq!(count(&session, "unparsed_episode"), 3);
    assert_eq!(session.unresolved_at("Show/Season 1/ep01.mkv").unwrap().len(), 1);
}

// ---------------------------------------------------------------
// Mixed batch: failures do not abort the pass, summary lists them
// ---------------------------------------------------------------
#[test]
fn test_mixed_batch_reports_failures() {
    let (tmp, session) = setup_session();
    let lookup = lookup_with(|item: &LocalItem| match item.episode_number {
        Some(1) => Ok(Some(remote_episode("100", "200", "300", "1"))),
        Some(2) => Err(LookupError::EpisodeNotFound { show: "Show".to_string(), season: 1, episode: 2 }),
        Some(3) => Ok(Some(remote_episode("100", "200", "302", "3"))),
        _ => Err(LookupError::SeasonNotFound { show: "Show".to_string(), season: 9 }),
    });
    let items = vec![
        local_item(tmp.path(), "Show/Season 1/e1.mkv", 1, 1),
        local_item(tmp.path(), "Show/Season 1/e2.mkv", 1, 2),
        local_item(tmp.path(), "Show/Season 1/e3.mkv", 1, 3),
        local_item(tmp.path(), "Show/Season 9/e1.mkv", 9, 4),
    ];

    let mut resolved = ResolvedItems::new();
    let summary = run_reconcile(&session, &mut resolved, items, &lookup, &ReconcileOptions::default()).unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.persisted, 2);
    assert_eq!(summary.unresolved, vec!["Show/Season 1/e2.mkv".to_string(), "Show/Season 9/e1.mkv".to_string()]);
    assert_eq!(
        summary.failure_report(),
        "2 item(s) could not be resolved:\nShow/Season 1/e2.mkv\nShow/Season 9/e1.mkv"
    );
    assert_eq!(resolved.len(), 2);

    // Both failures share the "Show" root entry
    assert_eq!(session.unresolved_under(None).unwrap().len(), 1);
    assert_eq!(session.unresolved_under(Some("Show")).unwrap().len(), 2);

    let season_one = session.episodes_where(&Filter::new().eq("season_id", 200i64)).unwrap();
    assert_eq!(season_one.len(), 2);
}

// ---------------------------------------------------------------
// A later successful run clears the ledger entry for that path
// ---------------------------------------------------------------
#[test]
fn test_later_success_clears_ledger() {
    let (tmp, session) = setup_session();
    let options = ReconcileOptions::default();
    let items = || vec![local_item(tmp.path(), "Show/Season 1/ep01.mkv", 1, 1)];

    let failing = lookup_with(|_: &LocalItem| Err(LookupError::ShowNotFound("Show".to_string())));
    run_reconcile(&session, &mut ResolvedItems::new(), items(), &failing, &options).unwrap();
    assert_eq!(count(&session, "unparsed_episode"), 3);

    let summary = run_reconcile(&session, &mut ResolvedItems::new(), items(), &always_found(), &options).unwrap();
    assert_eq!(summary.persisted, 1);
    assert_eq!(count(&session, "unparsed_episode"), 0);
}

// ---------------------------------------------------------------
// A lookup with nothing to attach keeps the item but writes nothing
// ---------------------------------------------------------------
#[test]
fn test_no_match_is_kept_but_not_written() {
    let (tmp, session) = setup_session();
    let lookup = lookup_with(|_: &LocalItem| Ok(None));
    let items = vec![local_item(tmp.path(), "Show/Season 1/ep01.mkv", 1, 1)];

    let mut resolved = ResolvedItems::new();
    let summary = run_reconcile(&session, &mut resolved, items, &lookup, &ReconcileOptions::default()).unwrap();

    assert_eq!(summary.no_match, 1);
    assert!(summary.unresolved.is_empty());
    assert_eq!(resolved.len(), 1);
    assert!(resolved.get("Show/Season 1/ep01.mkv").unwrap().remote.is_none());
    assert_eq!(count(&session, "series"), 0);
}

// ---------------------------------------------------------------
// Items the parser could not complete
// ---------------------------------------------------------------
#[test]
fn test_incomplete_items_ledgered_or_skipped() {
    let (tmp, session) = setup_session();
    let incomplete = || {
        vec![LocalItem {
            path: tmp.path().join("misc/clip.mkv"),
            ..LocalItem::default()
        }]
    };

    let skip = ReconcileOptions { ledger_incomplete: false, ..ReconcileOptions::default() };
    let summary = run_reconcile(&session, &mut ResolvedItems::new(), incomplete(), &always_found(), &skip).unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(count(&session, "unparsed_episode"), 0);

    let summary = run_reconcile(
        &session,
        &mut ResolvedItems::new(),
        incomplete(),
        &always_found(),
        &ReconcileOptions::default(),
    )
    .unwrap();
    assert_eq!(summary.unresolved, vec!["misc/clip.mkv".to_string()]);
    assert_eq!(count(&session, "unparsed_episode"), 2);
}

// ---------------------------------------------------------------
// Paths that cannot be stored faithfully are skipped, not ledgered
// ---------------------------------------------------------------
#[cfg(unix)]
#[test]
fn test_non_utf8_path_is_skipped() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (tmp, session) = setup_session();
    let mut item = local_item(tmp.path(), "Show/Season 1/e1.mkv", 1, 1);
    item.path = tmp.path().join("Show").join(OsStr::from_bytes(b"e\xff1.mkv"));

    let summary = run_reconcile(&session, &mut ResolvedItems::new(), vec![item], &always_found(), &ReconcileOptions::default()).unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.persisted, 0);
    assert_eq!(count(&session, "episode"), 0);
    assert_eq!(count(&session, "unparsed_episode"), 0);
}

// ---------------------------------------------------------------
// A bad provider payload fails that item's write only
// ---------------------------------------------------------------
#[test]
fn test_write_failure_does_not_abort_run() {
    let (tmp, session) = setup_session();
    let lookup = lookup_with(|item: &LocalItem| match item.episode_number {
        Some(1) => Ok(Some(remote_episode("not-a-number", "200", "300", "1"))),
        _ => Ok(Some(remote_episode("100", "200", "301", "2"))),
    });
    let items = vec![
        local_item(tmp.path(), "Show/Season 1/e1.mkv", 1, 1),
        local_item(tmp.path(), "Show/Season 1/e2.mkv", 1, 2),
    ];

    let summary = run_reconcile(&session, &mut ResolvedItems::new(), items, &lookup, &ReconcileOptions::default()).unwrap();
    assert_eq!(summary.write_failed, 1);
    assert_eq!(summary.persisted, 1);

    // The failed cascade left nothing behind
    let conn = session.store().connect().unwrap();
    assert!(!schema::episode_exists(&conn, 300).unwrap());
    assert!(schema::episode_exists(&conn, 301).unwrap());
}

// ---------------------------------------------------------------
// Refresh policy rewrites cached series metadata
// ---------------------------------------------------------------
#[test]
fn test_refresh_policy_updates_series() {
    let (tmp, session) = setup_session();
    let items = || vec![local_item(tmp.path(), "Show/Season 1/e1.mkv", 1, 1)];
    run_reconcile(&session, &mut ResolvedItems::new(), items(), &always_found(), &ReconcileOptions::default()).unwrap();

    let renamed = lookup_with(|_: &LocalItem| {
        let mut remote = remote_episode("100", "200", "300", "1");
        remote.season.series.name = "Show (US)".to_string();
        Ok(Some(remote))
    });

    run_reconcile(&session, &mut ResolvedItems::new(), items(), &renamed, &ReconcileOptions::default()).unwrap();
    assert_eq!(session.series(100).unwrap().unwrap().title, "Show");

    let refresh = ReconcileOptions { series_policy: SeriesPolicy::Refresh, ..ReconcileOptions::default() };
    run_reconcile(&session, &mut ResolvedItems::new(), items(), &renamed, &refresh).unwrap();
    assert_eq!(session.series(100).unwrap().unwrap().title, "Show (US)");
}

// ---------------------------------------------------------------
// Uninitialized cache fails the run before touching any item
// ---------------------------------------------------------------
#[test]
fn test_run_requires_initialized_cache() {
    let tmp = TempDir::new().unwrap();
    let session = SourceSession::new(tmp.path());
    let items = vec![local_item(tmp.path(), "Show/Season 1/e1.mkv", 1, 1)];

    let err = run_reconcile(&session, &mut ResolvedItems::new(), items, &always_found(), &ReconcileOptions::default())
        .unwrap_err();
    assert!(matches!(err, CacheError::NotInitialized(_)));
}

// ---------------------------------------------------------------
// Full pass over real files with the JSON catalog
// ---------------------------------------------------------------
#[test]
fn test_reconcile_root_with_catalog() {
    let (tmp, session) = setup_session();
    let root = tmp.path();
    for rel in [
        "Show/Season 1/Show.S01E01.Pilot.mkv",
        "Show/Season 1/ep02.mkv",
        "Show/Season 2/Show.S02E01.mkv",
        "Unknown Show/Season 1/Unknown.Show.S01E01.mkv",
        "Show/Season 1/notes.txt",
    ] {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"x").unwrap();
    }

    let catalog = JsonCatalog::from_json(
        r#"{ "series": [{
            "id": "100", "name": "Show", "first_aired": "2011-04-17", "runtime": "", "network": "HBO",
            "seasons": [{
                "id": "200", "number": "1",
                "episodes": [
                    { "id": "300", "number": "1", "name": "Pilot", "first_aired": "2011-04-17" },
                    { "id": "301", "number": "2", "name": "Second", "first_aired": "2011-04-24" }
                ]
            }]
        }] }"#,
    )
    .unwrap();

    let mut resolved = ResolvedItems::new();
    let summary = reconcile_root(&session, &mut resolved, &catalog, &ReconcileOptions::default()).unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.persisted, 2);
    assert_eq!(
        summary.unresolved,
        vec![
            "Show/Season 2/Show.S02E01.mkv".to_string(),
            "Unknown Show/Season 1/Unknown.Show.S01E01.mkv".to_string(),
        ]
    );

    let series = session.series(100).unwrap().unwrap();
    assert_eq!(series.runtime_minutes, None, "blank runtime is stored as NULL");

    let episodes = session
        .episodes_where(&Filter::new().eq("series_id", 100i64).eq("season_number", 1i64))
        .unwrap();
    let paths: Vec<&str> = episodes.iter().map(|e| e.file_path.as_str()).collect();
    assert_eq!(paths, vec!["Show/Season 1/Show.S01E01.Pilot.mkv", "Show/Season 1/ep02.mkv"]);

    let roots: Vec<String> = session
        .unresolved_under(None)
        .unwrap()
        .into_iter()
        .map(|r| r.child_path)
        .collect();
    assert_eq!(roots, vec!["Show".to_string(), "Unknown Show".to_string()]);
}
