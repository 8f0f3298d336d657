//! Fixture repositories built with git2 for the end-to-end tests
#![allow(dead_code)]

use git2::{Repository, Signature, Time};
use std::path::Path;
use std::process::Command;

/// The crawler shells out to `git`; tests needing it bail out when it is missing
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Initialize a repository at `path` with one commit per `(author, email, message)`
///
/// Commits are spaced one hour apart starting at a fixed timestamp so the
/// resulting history is deterministic apart from the SHAs.
pub fn init_repo(path: &Path, commits: &[(&str, &str, &str)]) -> Repository {
    std::fs::create_dir_all(path).unwrap();
    let repo = Repository::init(path).unwrap();
    for (index, (name, email, message)) in commits.iter().enumerate() {
        commit_file(&repo, &format!("file_{}.txt", index), name, email, message, index as i64);
    }
    repo
}

/// Write a file, stage it and commit on HEAD
pub fn commit_file(
    repo: &Repository,
    file_name: &str,
    name: &str,
    email: &str,
    message: &str,
    hour: i64,
) -> git2::Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(file_name), format!("{}\n", message)).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file_name)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let time = Time::new(1_700_000_000 + hour * 3600, 60);
    let signature = Signature::new(name, email, &time).unwrap();

    let parent = repo
        .head()
        .ok()
        .and_then(|head| head.target())
        .map(|oid| repo.find_commit(oid).unwrap());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap()
}

/// SHA of the repository's root commit
pub fn root_commit(repo: &Repository) -> String {
    let mut walk = repo.revwalk().unwrap();
    walk.push_head().unwrap();
    let mut last = None;
    for oid in walk {
        last = Some(oid.unwrap());
    }
    last.unwrap().to_string()
}

/// Clone `source` into `target` through libgit2's local transport
pub fn clone_repo(source: &Path, target: &Path) -> Repository {
    Repository::clone(&source.to_string_lossy(), target).unwrap()
}
