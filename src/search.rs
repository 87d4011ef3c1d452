//! # Candidate Search Module
//!
//! The two numerical strategies behind size-constrained optimization.
//!
//! ## Scale search (`fit_to_budget`)
//!
//! Finds the largest integer scale (<= 100%) whose rendered output fits a
//! byte budget. Probes scale 100 first (fits -> done, nothing is lost to
//! downscaling), then scale 1 (still too big -> best effort, return it),
//! then bisects the integer range. Every probe spawns an external encoder,
//! so probes are memoized and the worst case stays at the two boundary
//! probes plus O(log 100) bisection steps.
//!
//! The bisection assumes output size is monotonically non-decreasing in
//! scale. Real encoders do not guarantee this for every content/quality
//! combination; on a non-monotonic curve the search still terminates and
//! returns a fitting scale, just not necessarily the largest one. Known
//! limitation, accepted.
//!
//! ## Quality search (`pick_smallest`)
//!
//! Renders a small fixed set of quality presets and keeps the smallest
//! output. No shortcuts: the quality -> size relationship is content
//! dependent and not assumed monotonic, so every level is tried.
//!
//! Both searches own the candidate lifecycle: the chosen candidate is
//! promoted (renamed) onto the output path and every other rendered
//! candidate is deleted, on success and on error alike. An operation never
//! leaves a rejected candidate behind.

use crate::file_manager::FileManager;
use anyhow::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A rendered scratch output: where it landed and how big it came out
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
}

/// Render `scale` at most once, reusing the memoized candidate otherwise
async fn probe<F, Fut>(
    probes: &mut BTreeMap<u32, Candidate>,
    scale: u32,
    render_at_scale: &mut F,
) -> Result<u64>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Candidate>>,
{
    if let Some(candidate) = probes.get(&scale) {
        return Ok(candidate.size);
    }
    let candidate = render_at_scale(scale).await?;
    debug!("Probed scale {} -> {} bytes", scale, candidate.size);
    let size = candidate.size;
    probes.insert(scale, candidate);
    Ok(size)
}

async fn largest_fitting_scale<F, Fut>(
    probes: &mut BTreeMap<u32, Candidate>,
    budget: u64,
    render_at_scale: &mut F,
) -> Result<u32>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Candidate>>,
{
    let full = probe(probes, 100, render_at_scale).await?;
    if full <= budget {
        return Ok(100);
    }

    let floor = probe(probes, 1, render_at_scale).await?;
    if floor > budget {
        // The budget is unachievable; the smallest scale is the best effort
        return Ok(1);
    }

    // low always fits, high never does
    let mut low = 1u32;
    let mut high = 100u32;
    while high - low > 1 {
        let mid = (low + high) / 2;
        let size = probe(probes, mid, render_at_scale).await?;
        if size <= budget {
            low = mid;
        } else {
            high = mid;
        }
    }
    Ok(low)
}

/// Find the largest scale whose output fits `budget`, promote its candidate
/// onto `output` and delete every other probed candidate. Returns the size
/// of the promoted file.
pub async fn fit_to_budget<F, Fut>(output: &Path, budget: u64, mut render_at_scale: F) -> Result<u64>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Candidate>>,
{
    let mut probes: BTreeMap<u32, Candidate> = BTreeMap::new();
    let searched = largest_fitting_scale(&mut probes, budget, &mut render_at_scale).await;

    match searched {
        Ok(best_scale) => {
            let chosen = probes
                .remove(&best_scale)
                .ok_or_else(|| anyhow::anyhow!("scale {} was never rendered", best_scale))?;
            let renamed = fs::rename(&chosen.path, output).await;
            for candidate in probes.values() {
                FileManager::remove_scratch(&candidate.path).await;
            }
            if renamed.is_err() {
                FileManager::remove_scratch(&chosen.path).await;
            }
            renamed?;
            debug!("Kept scale {} ({} bytes)", best_scale, chosen.size);
            Ok(chosen.size)
        }
        Err(error) => {
            for candidate in probes.values() {
                FileManager::remove_scratch(&candidate.path).await;
            }
            Err(error)
        }
    }
}

/// Render every quality level, promote the smallest candidate onto
/// `output` (ties keep the first encountered) and delete the rest.
/// Returns the size of the promoted file.
pub async fn pick_smallest<F, Fut>(output: &Path, levels: &[u32], mut render: F) -> Result<u64>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Candidate>>,
{
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut best: Option<usize> = None;

    for &level in levels {
        match render(level).await {
            Ok(candidate) => {
                debug!("Quality {} -> {} bytes", level, candidate.size);
                if best.map_or(true, |index| candidate.size < candidates[index].size) {
                    best = Some(candidates.len());
                }
                candidates.push(candidate);
            }
            Err(error) => {
                for candidate in &candidates {
                    FileManager::remove_scratch(&candidate.path).await;
                }
                return Err(error);
            }
        }
    }

    let Some(best_index) = best else {
        anyhow::bail!("no quality candidates were produced");
    };

    let renamed = fs::rename(&candidates[best_index].path, output).await;
    for (index, candidate) in candidates.iter().enumerate() {
        if index != best_index || renamed.is_err() {
            FileManager::remove_scratch(&candidate.path).await;
        }
    }
    renamed?;
    Ok(candidates[best_index].size)
}
