use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::PlanError;

use super::rewrite::Layout;
use super::{ChangeSet, ChangeSetBuilder, ContentSource, OperationKind, Planner};

/// Move behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOptions {
    /// Replace existing files that are not themselves moving.
    pub overwrite: bool,
}

impl Planner {
    /// Plan moving every `(from, to)` pair at once.
    ///
    /// A destination written with a trailing `/`, or naming an existing
    /// directory, keeps the source file name. Swaps and chains among the
    /// moved files are legal: contents are captured in the plan.
    ///
    /// # Errors
    /// `UnknownSource` for a source outside the snapshot, `OutsideCorpus` for
    /// a destination outside the root, `DuplicateDestination` when two
    /// sources share a destination and `DestinationCollision` when a
    /// destination exists, is not moving away and `overwrite` is off.
    pub fn plan_move(
        &self,
        pairs: &[(PathBuf, PathBuf)],
        options: &MoveOptions,
    ) -> Result<ChangeSet, PlanError> {
        let corpus = self.corpus();
        let mut moves: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        let mut claimed: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

        for (from, to) in pairs {
            let from = corpus.absolute(from);
            if !corpus.contains(&from) {
                return Err(PlanError::UnknownSource(from));
            }
            let to = self.move_destination(&from, to)?;
            if to == from {
                tracing::debug!(path = %from.display(), "move onto itself skipped");
                continue;
            }
            if let Some(first) = claimed.insert(to.clone(), from.clone()) {
                return Err(PlanError::DuplicateDestination {
                    destination: to,
                    first,
                    second: from,
                });
            }
            if moves.insert(from.clone(), to).is_some() {
                return Err(PlanError::InvalidStrategy(format!(
                    "{} is moved twice",
                    from.display()
                )));
            }
        }

        for to in claimed.keys() {
            if corpus.is_directory(to) {
                return Err(PlanError::DestinationCollision(to.clone()));
            }
            if corpus.contains(to) && !moves.contains_key(to) && !options.overwrite {
                return Err(PlanError::DestinationCollision(to.clone()));
            }
        }

        let vacated: BTreeSet<PathBuf> = moves.keys().cloned().collect();
        let layout = Layout::after(corpus, &vacated, moves.values().cloned());
        let relocate = |path: &Path, fragment: Option<&str>| {
            moves
                .get(path)
                .map(|to| (to.clone(), fragment.map(str::to_string)))
        };

        let mut builder = ChangeSetBuilder::new();
        for (from, to) in &moves {
            let replaces = corpus.contains(to);
            let content = match corpus.document(from) {
                Some(doc) => ContentSource::Text(doc.content.clone()),
                None => ContentSource::CopyOf(from.clone()),
            };
            if replaces {
                builder.modify(to, content)?;
            } else {
                builder.create(to, content)?;
            }
            if let Some(doc) = corpus.document(from) {
                for (index, link) in doc.links.iter().enumerate() {
                    if let Some(raw) = self.relink(doc, index, to, &relocate, &layout) {
                        builder.update_link(to, link.span, &link.raw, &raw);
                    }
                }
            }
            if !claimed.contains_key(from) {
                builder.delete(from);
            }
        }

        let mut skip = vacated;
        skip.extend(claimed.keys().cloned());
        self.relink_referrers(&skip, &relocate, &layout, &mut builder);

        let set = builder.build(OperationKind::Move, corpus.clone())?;
        tracing::info!(moves = moves.len(), changes = set.len(), "planned move");
        Ok(set)
    }

    fn move_destination(&self, from: &Path, to: &Path) -> Result<PathBuf, PlanError> {
        let written = to.to_string_lossy();
        let into_dir = written.ends_with('/') || written.ends_with('\\');
        let to = self.scoped(to)?;
        if into_dir || self.corpus().is_directory(&to) {
            let name = from
                .file_name()
                .ok_or_else(|| PlanError::UnknownSource(from.to_path_buf()))?;
            return self.scoped(&to.join(name));
        }
        Ok(to)
    }
}
