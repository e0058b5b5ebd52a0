use std::path::Path;
use std::process::Command;

use blueprint_git::{GitError, GitNavigator};

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test Author")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test Author")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .expect("failed to run git");
    assert!(status.success(), "git {args:?} failed");
}

/// A repo with two commits on main and one extra commit on a feature branch.
fn fixture_repo() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    git(root, &["init", "--initial-branch=main"]);
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "user.name", "Test Author"]);

    std::fs::write(root.join("service.py"), "class UserService:\n    pass\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-m", "add user service"]);

    std::fs::write(root.join("api.py"), "class UserApi:\n    pass\n").unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-m", "add api layer"]);

    git(root, &["checkout", "-b", "feature"]);
    std::fs::remove_file(root.join("api.py")).unwrap();
    std::fs::write(root.join("service.py"), "class UserService:\n    def save(self):\n        pass\n").unwrap();
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "drop api, extend service"]);
    git(root, &["checkout", "main"]);

    tmp
}

#[test]
fn test_open_rejects_non_repo() {
    let tmp = tempfile::tempdir().unwrap();
    let err = GitNavigator::open(tmp.path()).unwrap_err();
    assert!(matches!(err, GitError::NotARepository(_)));

    let err = GitNavigator::open(tmp.path().join("missing")).unwrap_err();
    assert!(matches!(err, GitError::RepoNotFound(_)));
}

#[test]
fn test_list_commits() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let commits = nav.list_commits(50, None).unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].message, "add api layer");
    assert_eq!(commits[0].short_hash.len(), 8);
    assert!(commits[0].author.contains("Test Author"));
    assert!(commits[0].date >= commits[1].date);

    let capped = nav.list_commits(1, None).unwrap();
    assert_eq!(capped.len(), 1);

    let feature = nav.list_commits(50, Some("feature")).unwrap();
    assert_eq!(feature.len(), 3);
    assert_eq!(feature[0].message, "drop api, extend service");
}

#[test]
fn test_list_branches() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let branches = nav.list_branches(true).unwrap();
    let names: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
    assert!(names.contains(&"main"));
    assert!(names.contains(&"feature"));
    assert!(branches.iter().all(|b| !b.is_remote));
    assert!(branches.iter().all(|b| b.head_commit.len() == 8));
}

#[test]
fn test_resolve_ref() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let hash = nav.resolve_ref("main").unwrap();
    assert_eq!(hash.len(), 40);
    assert_eq!(nav.resolve_ref(&hash).unwrap(), hash);

    let err = nav.resolve_ref("no-such-branch").unwrap_err();
    assert!(matches!(err, GitError::InvalidRef(_)));
}

#[test]
fn test_changed_files() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let changed = nav.changed_files("main", "feature").unwrap();
    assert_eq!(changed.modified, vec!["service.py"]);
    assert_eq!(changed.deleted, vec!["api.py"]);
    assert!(changed.added.is_empty());

    // Reverse direction flips the classification.
    let reversed = nav.changed_files("feature", "main").unwrap();
    assert_eq!(reversed.added, vec!["api.py"]);
}

#[test]
fn test_commit_info_for_invalid_ref() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();
    assert!(matches!(
        nav.commit_info("bogus").unwrap_err(),
        GitError::InvalidRef(_)
    ));
}

#[tokio::test]
async fn test_checkout_to_temp_isolates_versions() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let main_dir = nav.checkout_to_temp("main").await.unwrap();
    let feature_dir = nav.checkout_to_temp("feature").await.unwrap();

    assert!(main_dir.join("api.py").exists());
    assert!(!feature_dir.join("api.py").exists());
    // The original working tree is untouched.
    assert!(repo.path().join("api.py").exists());

    nav.close();
    assert!(!main_dir.exists());
    assert!(!feature_dir.exists());
    // close is idempotent.
    nav.close();
}

#[tokio::test]
async fn test_checkout_of_invalid_ref_cleans_up() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let err = nav.checkout_to_temp("no-such-ref").await.unwrap_err();
    assert!(matches!(err, GitError::InvalidRef(_)));

    // The failed checkout left no tracked scratch dir behind.
    nav.close();
}

#[tokio::test]
async fn test_drop_removes_scratch_checkouts() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let main_dir = nav.checkout_to_temp("main").await.unwrap();
    let feature_dir = nav.checkout_to_temp("feature").await.unwrap();
    assert!(main_dir.exists() && feature_dir.exists());

    // Bailing out after a checkout, as a failed snapshot build would, drops
    // the navigator without an explicit close.
    drop(nav);
    assert!(!main_dir.exists());
    assert!(!feature_dir.exists());
}

#[tokio::test]
async fn test_concurrent_checkouts() {
    let repo = fixture_repo();
    let nav = GitNavigator::open(repo.path()).unwrap();

    let (base, target) = tokio::join!(nav.checkout_to_temp("main"), nav.checkout_to_temp("feature"));
    let base = base.unwrap();
    let target = target.unwrap();
    assert_ne!(base, target);
    assert!(base.exists() && target.exists());
}
