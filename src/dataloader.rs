use ndarray::{Array2, Array5, Axis};
use rand::seq::SliceRandom;

use crate::{Dataset, DatasetResult, EpisodeBatch, EpisodeDataset};

/// Merges a group of resolved episodes into one training batch.
pub trait Batcher: Send + Sync {
    type Output;
    fn batch(&self, items: Vec<EpisodeBatch>) -> DatasetResult<Self::Output>;
}

/// A group of episodes stacked along a new leading axis: images become
/// `(B, N, C, H, W)`, labels `(B, N)`. Stacking requires all episodes of the
/// group to agree on their per-episode shapes.
#[derive(Debug, Clone)]
pub struct StackedEpisodes {
    pub support_images: Array5<f32>,
    pub query_images: Array5<f32>,
    pub support_labels: Array2<i64>,
    pub query_labels: Array2<i64>,
    pub original_labels: Option<Array2<i64>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EpisodeStackBatcher;

impl Batcher for EpisodeStackBatcher {
    type Output = StackedEpisodes;

    fn batch(&self, items: Vec<EpisodeBatch>) -> DatasetResult<StackedEpisodes> {
        let support: Vec<_> = items.iter().map(|b| b.support_images.view()).collect();
        let query: Vec<_> = items.iter().map(|b| b.query_images.view()).collect();
        let support_labels: Vec<_> = items.iter().map(|b| b.support_labels.view()).collect();
        let query_labels: Vec<_> = items.iter().map(|b| b.query_labels.view()).collect();

        let original: Vec<_> = items
            .iter()
            .filter_map(|b| b.original_labels.as_ref().map(|a| a.view()))
            .collect();
        let original_labels = if !items.is_empty() && original.len() == items.len() {
            Some(ndarray::stack(Axis(0), &original)?)
        } else {
            None
        };

        Ok(StackedEpisodes {
            support_images: ndarray::stack(Axis(0), &support)?,
            query_images: ndarray::stack(Axis(0), &query)?,
            support_labels: ndarray::stack(Axis(0), &support_labels)?,
            query_labels: ndarray::stack(Axis(0), &query_labels)?,
            original_labels,
        })
    }
}

/// Iterates an episode dataset in groups of `batch_size`, optionally in
/// shuffled order. This is the outer batching consumer the episode logic
/// itself stays agnostic of; a trailing group smaller than `batch_size` is
/// yielded as-is.
pub struct EpisodeLoader<D, B>
where
    D: Dataset<Item = DatasetResult<EpisodeBatch>>,
    B: Batcher,
{
    dataset: D,
    batcher: B,
    batch_size: usize,
    shuffle: bool,
}

pub struct EpisodeLoaderIter<'a, D, B>
where
    D: Dataset<Item = DatasetResult<EpisodeBatch>>,
    B: Batcher,
{
    loader: &'a EpisodeLoader<D, B>,
    cursor: usize,
    indices: Vec<usize>,
}

impl<D, B> EpisodeLoader<D, B>
where
    D: Dataset<Item = DatasetResult<EpisodeBatch>>,
    B: Batcher,
{
    pub fn new(dataset: D, batcher: B, batch_size: usize, shuffle: bool) -> Self {
        Self {
            dataset,
            batcher,
            batch_size,
            shuffle,
        }
    }

    /// Number of full groups one pass yields.
    pub fn batch_count(&self) -> usize {
        self.dataset.len() / self.batch_size
    }

    pub fn iter(&self) -> EpisodeLoaderIter<'_, D, B> {
        let indices = self.get_iter_indices();
        EpisodeLoaderIter {
            loader: self,
            cursor: 0,
            indices,
        }
    }

    fn get_iter_indices(&self) -> Vec<usize> {
        let len = self.dataset.len();
        let mut indices: Vec<usize> = (0..len).collect();

        if self.shuffle {
            let mut rng = rand::rng();
            indices.shuffle(&mut rng);
        }

        indices
    }
}

impl EpisodeLoader<EpisodeDataset, EpisodeStackBatcher> {
    /// Wraps a dataset with the stacking batcher, taking the group size from
    /// the dataset's configured `batch_size`.
    pub fn from_dataset(dataset: EpisodeDataset, shuffle: bool) -> Self {
        let batch_size = dataset.batch_size();
        Self::new(dataset, EpisodeStackBatcher, batch_size, shuffle)
    }
}

impl<'a, D, B> Iterator for EpisodeLoaderIter<'a, D, B>
where
    D: Dataset<Item = DatasetResult<EpisodeBatch>>,
    B: Batcher,
{
    type Item = DatasetResult<B::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        let begin = self.cursor;
        if begin >= self.loader.dataset.len() {
            return None;
        }
        let end = (begin + self.loader.batch_size).min(self.loader.dataset.len());
        self.cursor = end;

        let mut items = Vec::with_capacity(end - begin);
        for slot in begin..end {
            match self.loader.dataset.get(self.indices[slot])? {
                Ok(item) => items.push(item),
                Err(err) => return Some(Err(err)),
            }
        }

        Some(self.loader.batcher.batch(items))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{EpisodeConfig, EpisodeDataset, Mode};
    use crate::loader::DefaultLoader;
    use image::{Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;
    use std::path::Path;

    fn fixture(dir: &Path, classes: &[&str], images_per_class: usize) {
        let image_dir = dir.join("images");
        std::fs::create_dir_all(&image_dir).unwrap();

        let mut manifest = std::fs::File::create(dir.join("train.csv")).unwrap();
        writeln!(manifest, "filename,label").unwrap();
        for (c, class) in classes.iter().enumerate() {
            for i in 0..images_per_class {
                let name = format!("{class}_{i}.png");
                RgbImage::from_pixel(2, 2, Rgb([c as u8, i as u8, 0]))
                    .save(image_dir.join(&name))
                    .unwrap();
                writeln!(manifest, "{name},{class}").unwrap();
            }
        }
    }

    fn dataset(dir: &Path, episode_num: usize, batch_size: usize) -> EpisodeDataset {
        let config = EpisodeConfig {
            data_dir: dir.to_path_buf(),
            mode: Mode::Train,
            batch_size,
            episode_num,
            way_num: 2,
            shot_num: 2,
            query_num: 3,
            num_class: 3,
            ..EpisodeConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(17);
        EpisodeDataset::with_loader(config, Box::new(DefaultLoader), None, &mut rng).unwrap()
    }

    #[test]
    fn stacks_groups_along_a_new_axis() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), &["A", "B", "C"], 6);

        let loader = EpisodeLoader::from_dataset(dataset(dir.path(), 4, 2), false);
        assert_eq!(loader.batch_count(), 2);

        let batches: Vec<_> = loader.iter().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 2);
        for stacked in &batches {
            // 2 episodes x (2-way 2-shot, 3 query, 2x2 RGB)
            assert_eq!(stacked.support_images.shape(), [2, 4, 3, 2, 2]);
            assert_eq!(stacked.query_images.shape(), [2, 6, 3, 2, 2]);
            assert_eq!(stacked.support_labels.shape(), [2, 4]);
            assert_eq!(stacked.query_labels.shape(), [2, 6]);
            assert_eq!(
                stacked.original_labels.as_ref().map(|a| a.shape().to_vec()),
                Some(vec![2, 6])
            );
        }
    }

    #[test]
    fn trailing_partial_group_is_yielded() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), &["A", "B", "C"], 6);

        let loader = EpisodeLoader::from_dataset(dataset(dir.path(), 5, 2), false);
        let batches: Vec<_> = loader.iter().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].support_images.shape()[0], 1);
    }

    #[test]
    fn shuffle_covers_every_episode_once() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), &["A", "B", "C"], 6);

        let loader = EpisodeLoader::from_dataset(dataset(dir.path(), 6, 3), true);
        let total: usize = loader
            .iter()
            .map(|b| b.unwrap().support_images.shape()[0])
            .sum();
        assert_eq!(total, 6);
    }
}
