use std::path::PathBuf;

use ndarray::{Array1, Array3, Array4, Axis};
use rand::Rng;
use tracing::trace;

use crate::loader::{DefaultLoader, ImageLoader};
use crate::transform::{self, Transform};
use crate::{
    Dataset, DatasetError, DatasetResult, Episode, EpisodeSampler, ManifestIndex, Mode,
};

/// Construction parameters for an [`EpisodeDataset`].
///
/// Defaults follow the usual miniImageNet setup: 5-way 5-shot, 15 query
/// images per class, 84-pixel images, 64 training classes.
#[derive(Debug, Clone)]
pub struct EpisodeConfig {
    pub data_dir: PathBuf,
    pub mode: Mode,
    pub image_size: u32,
    /// Episodes per group yielded by [`EpisodeLoader`](crate::EpisodeLoader);
    /// the episode logic itself ignores it.
    pub batch_size: usize,
    pub episode_num: usize,
    pub way_num: usize,
    pub shot_num: usize,
    pub query_num: usize,
    /// Expected class count of the train split, verified after generation.
    /// Ignored outside train mode.
    pub num_class: usize,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            mode: Mode::Train,
            image_size: 84,
            batch_size: 2,
            episode_num: 10000,
            way_num: 5,
            shot_num: 5,
            query_num: 15,
            num_class: 64,
        }
    }
}

impl EpisodeConfig {
    /// The conventional pipeline for this config's image size: resize,
    /// scale to `[0, 1]`, normalize with mean/std 0.5.
    pub fn standard_transform(&self) -> Box<dyn Transform> {
        Box::new(transform::ResizeNormalize::new(self.image_size))
    }
}

/// One resolved episode: stacked image tensors plus parallel label vectors.
///
/// `support_labels`/`query_labels` carry the within-episode labels
/// (`0..way_num`). `original_labels` is `Some` exactly in train mode and
/// repeats each class's global manifest id once per query image.
#[derive(Debug, Clone)]
pub struct EpisodeBatch {
    pub support_images: Array4<f32>,
    pub query_images: Array4<f32>,
    pub support_labels: Array1<i64>,
    pub query_labels: Array1<i64>,
    pub original_labels: Option<Array1<i64>>,
}

/// A fixed-length sequence of pre-generated episodes.
///
/// Episodes are sampled once at construction and never re-sampled: `get(i)`
/// always resolves the same image identifiers, re-decoding the pixels on
/// every call. Retrieval reads only immutable state, so distinct indices may
/// be fetched concurrently.
pub struct EpisodeDataset {
    episodes: Vec<Episode>,
    data_dir: PathBuf,
    mode: Mode,
    batch_size: usize,
    loader: Box<dyn ImageLoader>,
    transform: Option<Box<dyn Transform>>,
}

impl std::fmt::Debug for EpisodeDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeDataset")
            .field("episodes", &self.episodes)
            .field("data_dir", &self.data_dir)
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl EpisodeDataset {
    /// Builds the dataset with the default decoder and the process rng.
    pub fn new(config: EpisodeConfig, transform: Option<Box<dyn Transform>>) -> DatasetResult<Self> {
        Self::with_loader(config, Box::new(DefaultLoader), transform, &mut rand::rng())
    }

    /// Full-control constructor: explicit decoder and random source. Seeding
    /// the rng makes the episode schedule reproducible.
    pub fn with_loader<R: Rng + ?Sized>(
        config: EpisodeConfig,
        loader: Box<dyn ImageLoader>,
        transform: Option<Box<dyn Transform>>,
        rng: &mut R,
    ) -> DatasetResult<Self> {
        let manifest = ManifestIndex::load(config.mode.manifest_path(&config.data_dir))?;
        let sampler = EpisodeSampler {
            episode_num: config.episode_num,
            way_num: config.way_num,
            shot_num: config.shot_num,
            query_num: config.query_num,
        };
        let episodes = sampler.sample(&manifest, config.mode, config.num_class, rng)?;

        Ok(Self {
            episodes,
            data_dir: config.data_dir,
            mode: config.mode,
            batch_size: config.batch_size,
            loader,
            transform,
        })
    }

    /// Resolves the episode at `index` to decoded image tensors.
    ///
    /// Traversal order is per class, then per episode: all query images of
    /// the episode's first class, then its second, and so on; support images
    /// independently in the same class order. Decode and transform failures
    /// propagate unmodified.
    pub fn get(&self, index: usize) -> DatasetResult<EpisodeBatch> {
        let episode = self
            .episodes
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.episodes.len(),
            })?;
        trace!(index, "resolving episode");

        let mut query_images = Vec::new();
        let mut support_images = Vec::new();
        let mut query_labels = Vec::new();
        let mut support_labels = Vec::new();
        let mut original_labels = Vec::new();

        for class in &episode.classes {
            for id in &class.query_ids {
                query_images.push(self.load_image(id)?);
            }
            for id in &class.support_ids {
                support_images.push(self.load_image(id)?);
            }

            query_labels.extend(std::iter::repeat(class.episode_label).take(class.query_ids.len()));
            support_labels
                .extend(std::iter::repeat(class.episode_label).take(class.support_ids.len()));
            original_labels
                .extend(std::iter::repeat(class.original_class_id).take(class.query_ids.len()));
        }

        Ok(EpisodeBatch {
            support_images: stack_images(&support_images)?,
            query_images: stack_images(&query_images)?,
            support_labels: Array1::from_vec(support_labels),
            query_labels: Array1::from_vec(query_labels),
            original_labels: (self.mode == Mode::Train)
                .then(|| Array1::from_vec(original_labels)),
        })
    }

    fn load_image(&self, id: &str) -> DatasetResult<Array3<f32>> {
        let path = self.data_dir.join("images").join(id);
        let decoded = self.loader.load(&path)?;
        Ok(match &self.transform {
            Some(t) => t.apply(&decoded),
            None => transform::to_tensor(&decoded),
        })
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Dataset for EpisodeDataset {
    type Item = DatasetResult<EpisodeBatch>;

    fn get(&self, index: usize) -> Option<Self::Item> {
        if index < self.episodes.len() {
            Some(EpisodeDataset::get(self, index))
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.episodes.len()
    }
}

fn stack_images(images: &[Array3<f32>]) -> DatasetResult<Array4<f32>> {
    let views: Vec<_> = images.iter().map(Array3::view).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}
