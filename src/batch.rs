// src/batch.rs
//! Groups input files into articles and runs each group through the
//! assembler on the blocking pool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::assembler::{DocumentAssembler, DocumentInput, StructuredDocument};
use crate::config::Config;
use crate::document::{load_document, TreeBuilder};
use crate::extractors::table::split_table_file_stem;
use crate::utils::error::DocumentError;

/// One article plus its separately supplied table files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentGroup {
    pub id: String,
    pub main: Option<PathBuf>,
    pub linked_tables: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct GroupOutcome {
    pub group: DocumentGroup,
    pub result: Result<StructuredDocument, DocumentError>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Groups `<stem>.<ext>` with every `<stem>_table_<n>.<ext>` in the same
/// directory. Table files without a main article form a group of their own.
pub fn group_inputs(paths: &[PathBuf]) -> Vec<DocumentGroup> {
    let mut groups: BTreeMap<(PathBuf, String), (Option<PathBuf>, Vec<(u32, PathBuf)>)> = BTreeMap::new();

    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!("Skipping input without a usable file name: {}", path.display());
            continue;
        };
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        match split_table_file_stem(stem) {
            Some((base, number)) => {
                let entry = groups.entry((dir, base.to_string())).or_default();
                entry.1.push((number, path.clone()));
            }
            None => {
                let entry = groups.entry((dir, stem.to_string())).or_default();
                if let Some(previous) = &entry.0 {
                    tracing::warn!(
                        "Two main files for group {}: keeping {}, ignoring {}",
                        stem,
                        previous.display(),
                        path.display()
                    );
                    continue;
                }
                entry.0 = Some(path.clone());
            }
        }
    }

    groups
        .into_iter()
        .map(|((_, id), (main, mut tables))| {
            tables.sort();
            DocumentGroup {
                id,
                main,
                linked_tables: tables.into_iter().map(|(_, path)| path).collect(),
            }
        })
        .collect()
}

/// Loads and assembles one group synchronously.
pub fn process_group(config: &Config, group: &DocumentGroup) -> Result<StructuredDocument, DocumentError> {
    let (main_file, main) = match &group.main {
        Some(path) => (file_name(path), load_document(path)?),
        None => {
            tracing::warn!("Group {} has table files but no main article", group.id);
            (String::new(), TreeBuilder::new().finish())
        }
    };

    let mut input = DocumentInput::new(group.id.clone(), main_file, main);
    for path in &group.linked_tables {
        input.linked_tables.push((file_name(path), load_document(path)?));
    }

    DocumentAssembler::new(config).assemble(&input)
}

/// Processes every group with at most `jobs` running at once. Outcomes come
/// back in input order; a failing or panicking group only affects its own
/// outcome.
pub async fn run_batch(config: Arc<Config>, groups: Vec<DocumentGroup>, jobs: usize) -> Vec<GroupOutcome> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut set = JoinSet::new();

    for (index, group) in groups.iter().cloned().enumerate() {
        let config = Arc::clone(&config);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    let task_group = group.clone();
                    tokio::task::spawn_blocking(move || process_group(&config, &task_group))
                        .await
                        .unwrap_or_else(|e| Err(DocumentError::Task(e.to_string())))
                }
                Err(e) => Err(DocumentError::Task(e.to_string())),
            };
            (index, GroupOutcome { group, result })
        });
    }

    let mut outcomes = Vec::with_capacity(groups.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => tracing::error!("Batch task failed to join: {}", e),
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);

    // Tasks only fail to join if aborted; report those groups as failed too.
    if outcomes.len() < groups.len() {
        let seen: Vec<usize> = outcomes.iter().map(|(index, _)| *index).collect();
        for (index, group) in groups.into_iter().enumerate() {
            if !seen.contains(&index) {
                outcomes.push((
                    index,
                    GroupOutcome {
                        group,
                        result: Err(DocumentError::Task("task did not complete".to_string())),
                    },
                ));
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);
    }

    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}
