// ctree - current tree reconciliation for data archives
// Copyright (C) 2026 ctree Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! End-to-end runs of the publish workflow against in-memory stores.

use async_trait::async_trait;
use ctree_archive::{ArchiveOp, ArchiveStore, FailOn, MockArchive};
use ctree_core::{
    ReconcileError, RunCheckpoint, RunRequest, SyncOutcome, SyncSummary, SyncWorkflow,
    WorkflowState,
};
use ctree_metastore::{FileField, FileRecord, MemoryStore, MetadataStore, MetastoreResult, StoreOp};
use ctree_test_utils::{record, seed_published, TestWorkspace};

const CHANGELOG: &str = "2020-01-01\n\nInitial release\n\n";

const PUBLISHED: &[(&str, &str)] = &[
    ("ftp/data/a.cram", "h1"),
    ("ftp/data/b.cram", "h2"),
    ("ftp/data/c.vcf.gz", "h3"),
    ("ftp/data/keep.bam", "h4"),
];

/// a.cram replaced, b.cram moved, c.vcf.gz withdrawn, d.crai new
const CURRENT: &[(&str, &str)] = &[
    ("ftp/data/a.cram", "h1x"),
    ("ftp/moved/b.cram", "h2"),
    ("ftp/data/keep.bam", "h4"),
    ("ftp/data/d.crai", "h5"),
];

async fn setup(ws: &TestWorkspace, current: &[(&str, &str)]) -> (MemoryStore, MockArchive) {
    let store = MemoryStore::new();
    let archive = MockArchive::new();
    let tree = ws.write_prod_tree(PUBLISHED);
    ws.write_changelog(CHANGELOG);
    seed_published(ws.config(), &store, &archive, &tree, CHANGELOG).await;
    store
        .seed(current.iter().map(|(path, md5)| record(path, md5, "DATA")))
        .await;
    (store, archive)
}

fn request(ws: &TestWorkspace) -> RunRequest {
    RunRequest::new(ws.staging_tree(), ws.prod_tree(), ws.changelog())
}

fn published(outcome: SyncOutcome) -> SyncSummary {
    match outcome {
        SyncOutcome::Published(summary) => summary,
        SyncOutcome::NoChanges => panic!("expected a published run"),
    }
}

#[tokio::test]
async fn test_no_changes_is_a_no_op() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, PUBLISHED).await;
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let outcome = workflow.run(&request(&ws)).await.unwrap();

    assert_eq!(outcome, SyncOutcome::NoChanges);
    assert!(store.journal().await.is_empty());
    assert!(archive.journal().await.is_empty());
    assert!(!ws.staging_tree().exists());
    assert!(RunCheckpoint::load(&ws.config().ctree.scratch_dir)
        .await
        .unwrap()
        .is_none());
    assert_eq!(ws.read_text_file("CHANGELOG"), CHANGELOG);
}

#[tokio::test]
async fn test_full_run_publishes_everything() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, CURRENT).await;
    let old_tree = archive.objects().await[1].clone();
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let summary = published(workflow.run(&request(&ws)).await.unwrap());

    assert_eq!(summary.changes.to_string(), "new: 1, withdrawn: 1, moved: 1, replaced: 1");
    assert!(!summary.dry_run);
    assert_eq!(summary.detail_files.len(), 4);
    assert_eq!(summary.pushed.len(), 6);
    assert_eq!(summary.pushed[4], "ftp/CHANGELOG");
    assert_eq!(summary.pushed[5], "ftp/current.tree");

    // Remote: four detail uploads, then delete + upload for change-log and tree.
    let journal = archive.journal().await;
    assert_eq!(journal.len(), 8);
    for (op, kind) in journal[..4].iter().zip(["new", "withdrawn", "moved", "replaced"]) {
        match op {
            ArchiveOp::Upload { remote_path, .. } => {
                assert!(remote_path.starts_with("ftp/changelog_details/changelog_details_"));
                assert!(remote_path.ends_with(kind));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert!(matches!(&journal[4], ArchiveOp::Delete { .. }));
    assert!(matches!(&journal[5], ArchiveOp::Upload { remote_path, .. } if remote_path == "ftp/CHANGELOG"));
    assert_eq!(journal[6], ArchiveOp::Delete { fire_oid: old_tree.fire_oid.clone() });
    assert!(matches!(&journal[7], ArchiveOp::Upload { remote_path, .. } if remote_path == "ftp/current.tree"));

    // Published tree is the staging tree.
    let staging = std::fs::read(ws.staging_tree()).unwrap();
    assert_eq!(archive.content("ftp/current.tree").await.unwrap(), staging);
    let staging = String::from_utf8(staging).unwrap();
    assert!(staging.contains("ftp/moved/b.cram\tfile\t100\t"));
    assert!(!staging.contains("current.tree"));

    // Change-log: new entry on top of the old one.
    let changelog = ws.read_text_file("CHANGELOG");
    assert!(changelog.ends_with(CHANGELOG));
    assert!(changelog.contains("Modification to: crai\n"));
    assert!(changelog.contains("Modification to: vcf\n"));
    assert!(changelog.contains("Modification to: cram\n"));
    assert!(changelog.contains("Details can be found in\nchangelog_details/changelog_details_"));
    assert_eq!(archive.content("ftp/CHANGELOG").await.unwrap(), changelog.as_bytes());

    // Metadata rows: detail files renamed to their published paths, digests updated.
    let first_detail = summary.detail_files[0].file_name().unwrap().to_string_lossy();
    let detail = store
        .fetch_by_basename(&first_detail)
        .await
        .unwrap()
        .unwrap();
    assert!(detail.name.starts_with("/nfs/vol1/ftp/changelog_details/changelog_details_"));
    assert_eq!(detail.file_type, "CHANGELOG");

    let changelog_row = store.fetch_row("/nfs/vol1/ftp/CHANGELOG").await.unwrap().unwrap();
    assert_eq!(changelog_row.size, changelog.len() as u64);
    let tree_row = store.fetch_row("/nfs/vol1/ftp/current.tree").await.unwrap().unwrap();
    assert_eq!(tree_row.size, staging.len() as u64);

    let store_ops = store.journal().await;
    assert_eq!(store_ops.len(), 12);
    assert!(matches!(&store_ops[0], StoreOp::Insert { .. }));
    assert!(matches!(&store_ops[1], StoreOp::Update { field: FileField::Name, .. }));

    // Backups of both replaced objects are kept; the checkpoint is gone.
    assert_eq!(summary.backups.len(), 2);
    assert_eq!(std::fs::read_to_string(&summary.backups[0]).unwrap(), CHANGELOG);
    assert!(summary.backups[1]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("current.tree."));
    assert!(RunCheckpoint::load(&ws.config().ctree.scratch_dir)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_dry_run_changes_nothing_and_matches_real_counts() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, CURRENT).await;
    let rows_before = store.rows().await;
    let objects_before = archive.objects().await;
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let dry = published(workflow.run(&request(&ws).dry_run(true)).await.unwrap());

    assert!(dry.dry_run);
    assert!(dry.backups.is_empty());
    assert_eq!(store.rows().await, rows_before);
    assert_eq!(archive.objects().await, objects_before);
    assert!(store.journal().await.is_empty());
    assert!(archive.journal().await.is_empty());
    assert_eq!(ws.read_text_file("CHANGELOG"), CHANGELOG);
    assert!(RunCheckpoint::load(&ws.config().ctree.scratch_dir)
        .await
        .unwrap()
        .is_none());

    let real = published(workflow.run(&request(&ws)).await.unwrap());
    assert_eq!(real.changes, dry.changes);
    assert_eq!(real.pushed, dry.pushed);
}

#[tokio::test]
async fn test_missing_changelog_row_fails_before_mutating() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, CURRENT).await;
    let row = store.fetch_row("/nfs/vol1/ftp/CHANGELOG").await.unwrap().unwrap();
    store.delete_row(&row, false).await.unwrap();
    let journal_len = store.journal().await.len();

    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);
    let err = workflow.run(&request(&ws)).await.unwrap_err();

    assert!(matches!(err, ReconcileError::MissingRecord(ref name) if name == "/nfs/vol1/ftp/CHANGELOG"));
    assert_eq!(store.journal().await.len(), journal_len);
    assert!(archive.journal().await.is_empty());
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_repeating_steps() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, CURRENT).await;
    archive.fail_on(FailOn::Upload("current.tree")).await;
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let err = workflow.run(&request(&ws)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Archive { step: "publish tree", .. }));
    assert!(archive.fetch_metadata("ftp/current.tree").await.unwrap().is_none());

    let scratch = ws.config().ctree.scratch_dir.clone();
    let checkpoint = RunCheckpoint::load(&scratch).await.unwrap().unwrap();
    assert_eq!(checkpoint.state, WorkflowState::ChangelogUpdated);
    assert_eq!(checkpoint.backups.len(), 2);

    // A plain rerun refuses to start over.
    let err = workflow.run(&request(&ws)).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::UnfinishedRun { state: WorkflowState::ChangelogUpdated, .. }
    ));

    archive.clear_failures().await;
    let uploads_before = archive.journal().await.len();
    let summary = published(workflow.run(&request(&ws).resume(true)).await.unwrap());

    assert_eq!(summary.run_id, checkpoint.run_id);
    // Only the tree upload was left to do.
    let journal = archive.journal().await;
    assert_eq!(journal.len(), uploads_before + 1);
    assert!(matches!(journal.last(), Some(ArchiveOp::Upload { remote_path, .. }) if remote_path == "ftp/current.tree"));

    // The change-log entry was written once.
    let changelog = ws.read_text_file("CHANGELOG");
    assert_eq!(changelog.matches("Modification to: crai").count(), 1);
    assert!(RunCheckpoint::load(&scratch).await.unwrap().is_none());
}

#[tokio::test]
async fn test_backups_removed_when_not_kept() {
    let mut ws = TestWorkspace::new();
    ws.config_mut().ctree.keep_backups = false;
    let (store, archive) = setup(&ws, CURRENT).await;
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let summary = published(workflow.run(&request(&ws)).await.unwrap());

    assert!(summary.backups.is_empty());
    let leftovers = std::fs::read_dir(&ws.config().ctree.backup_dir)
        .unwrap()
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_diff_only_writes_staging_tree() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, CURRENT).await;
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let changes = workflow
        .diff(&ws.staging_tree(), &ws.prod_tree(), Default::default(), None)
        .await
        .unwrap();

    assert_eq!(changes.size(), 4);
    assert_eq!(
        changes.moved.get("ftp/data/b.cram").map(String::as_str),
        Some("ftp/moved/b.cram")
    );
    assert!(ws.staging_tree().exists());
    assert!(store.journal().await.is_empty());
    assert!(archive.journal().await.is_empty());
}

fn detail_rows(rows: &[FileRecord]) -> Vec<&FileRecord> {
    rows.iter()
        .filter(|r| r.name.contains("changelog_details_"))
        .collect()
}

#[tokio::test]
async fn test_second_run_on_the_same_day_replaces_detail_file() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, CURRENT).await;
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);
    let first = published(workflow.run(&request(&ws)).await.unwrap());
    let remote = first.pushed[0].clone();
    assert!(remote.ends_with("_new"));
    let first_content = archive.content(&remote).await.unwrap();

    // The tree published by the first run is the input of the second.
    std::fs::copy(ws.staging_tree(), ws.prod_tree()).unwrap();
    store.seed([record("ftp/data/e.cram", "h6", "DATA")]).await;

    let dry = published(workflow.run(&request(&ws).dry_run(true)).await.unwrap());
    let second = published(workflow.run(&request(&ws)).await.unwrap());

    assert_eq!(second.changes.to_string(), "new: 1, withdrawn: 0, moved: 0, replaced: 0");
    assert_eq!(second.pushed[0], remote);
    assert_eq!(dry.pushed, second.pushed);

    let local = std::fs::read(&second.detail_files[0]).unwrap();
    assert_ne!(local, first_content);
    assert_eq!(archive.content(&remote).await.unwrap(), local);
    assert!(String::from_utf8(local).unwrap().contains("ftp/data/e.cram"));

    // The earlier detail file was backed up before being replaced.
    let backup = second
        .backups
        .iter()
        .find(|b| b.file_name().unwrap().to_string_lossy().starts_with("changelog_details_"))
        .unwrap();
    assert_eq!(std::fs::read(backup).unwrap(), first_content);

    // One row per published detail file, all at their published paths.
    let rows = store.rows().await;
    let details = detail_rows(&rows);
    assert_eq!(details.len(), 4);
    assert!(details.iter().all(|r| r.name.starts_with("/nfs/vol1/ftp/changelog_details/")));
    let row = store
        .fetch_row(&format!("/nfs/vol1/{}", remote))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.size, std::fs::metadata(&second.detail_files[0]).unwrap().len());
}

#[tokio::test]
async fn test_resume_after_detail_rows_were_renamed() {
    let ws = TestWorkspace::new();
    let (store, archive) = setup(&ws, CURRENT).await;
    archive.fail_on(FailOn::Upload("CHANGELOG")).await;
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let err = workflow.run(&request(&ws)).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Archive { step: "publish change-log", .. }));

    // Rewind to where a crash right after the last rename leaves the run.
    let scratch = ws.config().ctree.scratch_dir.clone();
    let mut checkpoint = RunCheckpoint::load(&scratch).await.unwrap().unwrap();
    checkpoint.state = WorkflowState::Diffed;
    checkpoint.pushed.clear();
    checkpoint.backups.clear();
    checkpoint.save(&scratch).await.unwrap();

    archive.clear_failures().await;
    let journal_len = archive.journal().await.len();
    let summary = published(workflow.run(&request(&ws).resume(true)).await.unwrap());

    assert_eq!(summary.run_id, checkpoint.run_id);
    // Detail files were not uploaded again; only the change-log and tree were.
    let uploads: Vec<String> = archive.journal().await[journal_len..]
        .iter()
        .filter_map(|op| match op {
            ArchiveOp::Upload { remote_path, .. } => Some(remote_path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(uploads, vec!["ftp/CHANGELOG".to_string(), "ftp/current.tree".to_string()]);

    let rows = store.rows().await;
    let details = detail_rows(&rows);
    assert_eq!(details.len(), 4);
    assert!(details.iter().all(|r| r.name.starts_with("/nfs/vol1/ftp/changelog_details/")));
    assert_eq!(ws.read_text_file("CHANGELOG").matches("Modification to: crai").count(), 1);
}

/// Store that acknowledges inserts without keeping the row
#[derive(Debug)]
struct ForgetfulStore(MemoryStore);

#[async_trait]
impl MetadataStore for ForgetfulStore {
    async fn fetch_row(&self, path: &str) -> MetastoreResult<Option<FileRecord>> {
        self.0.fetch_row(path).await
    }

    async fn fetch_by_basename(&self, basename: &str) -> MetastoreResult<Option<FileRecord>> {
        self.0.fetch_by_basename(basename).await
    }

    async fn insert_row(&self, _record: &FileRecord, _dry_run: bool) -> MetastoreResult<Option<i64>> {
        Ok(Some(0))
    }

    async fn update_field(
        &self,
        field: FileField,
        value: &str,
        match_path: &str,
        dry_run: bool,
    ) -> MetastoreResult<usize> {
        self.0.update_field(field, value, match_path, dry_run).await
    }

    async fn delete_row(&self, record: &FileRecord, dry_run: bool) -> MetastoreResult<usize> {
        self.0.delete_row(record, dry_run).await
    }

    async fn list_rows(&self, limit: Option<usize>) -> MetastoreResult<Vec<FileRecord>> {
        self.0.list_rows(limit).await
    }
}

#[tokio::test]
async fn test_rename_of_missing_detail_row_fails() {
    let ws = TestWorkspace::new();
    let (inner, archive) = setup(&ws, CURRENT).await;
    let store = ForgetfulStore(inner);
    let workflow = SyncWorkflow::new(ws.config(), &store, &archive);

    let err = workflow.run(&request(&ws)).await.unwrap_err();

    assert!(matches!(err, ReconcileError::MissingRecord(ref name) if name.ends_with("_new")));
    assert!(store.0.fetch_row("/nfs/vol1/ftp/CHANGELOG").await.unwrap().is_some());
    // The change-log was never touched.
    assert_eq!(ws.read_text_file("CHANGELOG"), CHANGELOG);
}
