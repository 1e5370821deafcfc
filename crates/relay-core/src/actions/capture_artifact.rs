use super::{ActionArgs, ActionContext, ActionHandler, ActionOutcome, CaptureArtifactArgs};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `capture_artifact`: glob for a file and remember its absolute path.
///
/// Relative patterns are rooted at the context's working directory and may
/// use `**`. `*` and `?` do not match a leading `.`, so hidden files are only
/// found when the pattern spells out the dot. When several paths match, the
/// lexicographically smallest wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureArtifactAction;

#[async_trait]
impl ActionHandler for CaptureArtifactAction {
    fn parse_args(&self, raw: Value) -> crate::Result<ActionArgs> {
        ActionArgs::decode("capture_artifact", raw).map(ActionArgs::CaptureArtifact)
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext<'_>,
        args: ActionArgs,
    ) -> crate::Result<Option<ActionOutcome>> {
        let CaptureArtifactArgs {
            pattern,
            artifact_name,
        } = match args {
            ActionArgs::CaptureArtifact(args) => args,
            other => return Err(other.mismatch("capture_artifact")),
        };

        let Some(path) = first_match(&ctx.working_dir, &pattern)? else {
            debug!(session_id = %ctx.session_id, pattern = %pattern, "No files matched artifact pattern");
            return Ok(None);
        };

        if let Some(name) = artifact_name {
            ctx.state
                .set_artifact(name, path.to_string_lossy().into_owned());
        }

        Ok(Some(ActionOutcome::Captured(path)))
    }
}

fn first_match(root: &Path, pattern: &str) -> crate::Result<Option<PathBuf>> {
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        // The root is literal text; only the caller's pattern may contain wildcards
        let root = glob::Pattern::escape(&root.to_string_lossy());
        Path::new(&root).join(pattern).to_string_lossy().into_owned()
    };

    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let mut matches: Vec<PathBuf> = glob::glob_with(&full_pattern, options)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable glob entry");
                None
            }
        })
        .collect();
    matches.sort();

    match matches.into_iter().next() {
        Some(path) => Ok(Some(std::path::absolute(path)?)),
        None => Ok(None),
    }
}
