use rand::seq::index;
use rand::Rng;
use tracing::info;

use crate::{
    ClassEpisode, DatasetError, DatasetResult, Episode, ManifestIndex, Mode, NO_CLASS_ID,
};

/// Episode-sampling parameters.
///
/// [`sample`] runs eagerly, once, and returns exactly `episode_num` episodes.
/// Per episode it draws `way_num` distinct classes; per class, `shot_num`
/// distinct support images and up to `query_num` query images, support and
/// query always disjoint. A class with exactly `shot_num` images yields an
/// empty query set; that is not an error.
///
/// The random source is an explicit handle so callers can seed it for
/// reproducible schedules.
///
/// [`sample`]: EpisodeSampler::sample
#[derive(Debug, Clone, Copy)]
pub struct EpisodeSampler {
    pub episode_num: usize,
    pub way_num: usize,
    pub shot_num: usize,
    pub query_num: usize,
}

impl EpisodeSampler {
    pub fn sample<R: Rng + ?Sized>(
        &self,
        manifest: &ManifestIndex,
        mode: Mode,
        num_class: usize,
        rng: &mut R,
    ) -> DatasetResult<Vec<Episode>> {
        if manifest.num_classes() < self.way_num {
            return Err(DatasetError::InsufficientClasses {
                way_num: self.way_num,
                available: manifest.num_classes(),
            });
        }

        let mut episodes = Vec::with_capacity(self.episode_num);
        for _ in 0..self.episode_num {
            episodes.push(self.sample_episode(manifest, mode, rng)?);
        }

        // Train mode declares the split's class count up front; verify it
        // against what the manifest actually contained.
        if mode == Mode::Train && manifest.num_classes() != num_class {
            return Err(DatasetError::ClassCountMismatch {
                declared: num_class,
                found: manifest.num_classes(),
            });
        }

        info!(
            mode = mode.as_str(),
            episodes = episodes.len(),
            way = self.way_num,
            shot = self.shot_num,
            "generated episode schedule"
        );

        Ok(episodes)
    }

    fn sample_episode<R: Rng + ?Sized>(
        &self,
        manifest: &ManifestIndex,
        mode: Mode,
        rng: &mut R,
    ) -> DatasetResult<Episode> {
        let entries = manifest.entries();
        let draw = index::sample(rng, entries.len(), self.way_num);

        let mut classes = Vec::with_capacity(self.way_num);
        for (label, class_id) in draw.into_iter().enumerate() {
            let entry = &entries[class_id];
            let pool = &entry.images;

            if pool.len() < self.shot_num {
                return Err(DatasetError::InsufficientShots {
                    class: entry.name.clone(),
                    shot_num: self.shot_num,
                    available: pool.len(),
                });
            }

            let support: Vec<String> = index::sample(rng, pool.len(), self.shot_num)
                .into_iter()
                .map(|i| pool[i].clone())
                .collect();

            let candidates: Vec<&str> = pool
                .iter()
                .filter(|id| !support.iter().any(|s| s == *id))
                .map(String::as_str)
                .collect();

            let query: Vec<String> = if candidates.len() > self.query_num {
                index::sample(rng, candidates.len(), self.query_num)
                    .into_iter()
                    .map(|i| candidates[i].to_owned())
                    .collect()
            } else {
                candidates.into_iter().map(str::to_owned).collect()
            };

            // Manifest ids are assigned in entry order, so the entry index
            // is the global class id.
            let original_class_id = match mode {
                Mode::Train => class_id as i64,
                _ => NO_CLASS_ID,
            };

            classes.push(ClassEpisode {
                support_ids: support,
                query_ids: query,
                episode_label: label as i64,
                original_class_id,
            });
        }

        Ok(Episode { classes })
    }
}
