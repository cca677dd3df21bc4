use std::{collections::HashMap, path::Path};

use tempfile::TempDir;

use super::*;

fn write_list(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn service(lists: &[(&str, Vec<String>)]) -> BlocklistService {
    let denylists: HashMap<String, Vec<String>> = lists.iter().map(|(g, l)| (g.to_string(), l.clone())).collect();
    BlocklistService::new(&denylists).unwrap()
}

#[tokio::test]
async fn test_nothing_blocked_before_refresh() {
    let dir = TempDir::new().unwrap();
    let ads = write_list(dir.path(), "ads.txt", "ads.example.com\n");
    let service = service(&[("ads", vec![ads])]);

    assert!(service.is_configured());
    assert_eq!(service.blocked_group(&["ads".into()], "ads.example.com"), None);
}

#[tokio::test]
async fn test_refresh_and_lookup_by_group() {
    let dir = TempDir::new().unwrap();
    let ads = write_list(dir.path(), "ads.txt", "# ads\nads.example.com\n0.0.0.0 tracker.net\n");
    let kids = write_list(dir.path(), "kids.txt", "games.com\n");
    let service = service(&[("ads", vec![ads]), ("kids", vec![kids])]);

    service.refresh_lists().await.unwrap();

    let all = vec!["ads".to_string(), "kids".to_string()];
    assert_eq!(service.blocked_group(&all, "sub.ads.example.com"), Some("ads"));
    assert_eq!(service.blocked_group(&all, "tracker.net"), Some("ads"));
    assert_eq!(service.blocked_group(&all, "games.com"), Some("kids"));
    assert_eq!(service.blocked_group(&["ads".into()], "games.com"), None);
    assert_eq!(service.blocked_group(&all, "example.org"), None);
    assert_eq!(service.group_names(), all);
    assert_eq!(service.entry_count("ads"), 2);
}

#[tokio::test]
async fn test_invalid_entries_are_skipped() {
    let dir = TempDir::new().unwrap();
    let ads = write_list(dir.path(), "ads.txt", "bad..entry\nfine.com\n");
    let service = service(&[("ads", vec![ads])]);

    service.refresh_lists().await.unwrap();
    assert_eq!(service.entry_count("ads"), 1);
    assert_eq!(service.blocked_group(&["ads".into()], "fine.com"), Some("ads"));
}

#[tokio::test]
async fn test_failed_source_keeps_others() {
    let dir = TempDir::new().unwrap();
    let ads = write_list(dir.path(), "ads.txt", "ads.example.com\n");
    let missing = dir.path().join("missing.txt").to_str().unwrap().to_string();
    let service = service(&[("ads", vec![missing, ads])]);

    service.refresh_lists().await.unwrap();
    assert_eq!(service.blocked_group(&["ads".into()], "ads.example.com"), Some("ads"));
}

#[tokio::test]
async fn test_failed_group_keeps_previous_lists() {
    let dir = TempDir::new().unwrap();
    let ads = write_list(dir.path(), "ads.txt", "ads.example.com\n");
    let service = service(&[("ads", vec![ads.clone()])]);

    service.refresh_lists().await.unwrap();
    std::fs::remove_file(&ads).unwrap();

    let err = service.refresh_lists().await.unwrap_err();
    assert!(err.to_string().contains("ads"));
    assert_eq!(service.blocked_group(&["ads".into()], "ads.example.com"), Some("ads"));
}

#[tokio::test]
async fn test_refresh_picks_up_changes() {
    let dir = TempDir::new().unwrap();
    let ads = write_list(dir.path(), "ads.txt", "old.com\n");
    let service = service(&[("ads", vec![ads.clone()])]);

    service.refresh_lists().await.unwrap();
    std::fs::write(&ads, "new.com\n").unwrap();
    service.refresh_lists().await.unwrap();

    let groups = vec!["ads".to_string()];
    assert_eq!(service.blocked_group(&groups, "old.com"), None);
    assert_eq!(service.blocked_group(&groups, "new.com"), Some("ads"));
}
