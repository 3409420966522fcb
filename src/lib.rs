//! Episodic batch construction for few-shot image classification.
//!
//! A CSV split manifest maps image identifiers to class names. From it the
//! crate pre-generates a fixed schedule of N-way K-shot *episodes* (a support
//! set and a query set per sampled class, with labels remapped into the
//! episode's own `0..way_num` space) and resolves them to decoded, transformed
//! image tensors on demand.
//!
//! ```no_run
//! use fewshot_dataset::{EpisodeConfig, EpisodeDataset, EpisodeLoader, Mode};
//!
//! let config = EpisodeConfig {
//!     data_dir: "dataset/miniImageNet".into(),
//!     mode: Mode::Train,
//!     episode_num: 10000,
//!     ..EpisodeConfig::default()
//! };
//! let transform = config.standard_transform();
//! let dataset = EpisodeDataset::new(config, Some(transform)).unwrap();
//! let loader = EpisodeLoader::from_dataset(dataset, false);
//! for batch in loader.iter() {
//!     let batch = batch.unwrap();
//!     println!("{:?}", batch.support_images.shape());
//! }
//! ```

mod dataloader;
mod dataset;
mod episode;
mod error;
mod manifest;
mod sampler;
pub mod loader;
pub mod transform;

pub use dataloader::*;
pub use dataset::*;
pub use episode::*;
pub use error::*;
pub use manifest::*;
pub use sampler::*;

pub trait Dataset: Send + Sync {
    type Item;

    /// Gets the item at the given index.
    fn get(&self, index: usize) -> Option<Self::Item>;

    /// Gets the number of items in the dataset.
    fn len(&self) -> usize;

    /// Checks if the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the dataset.
    fn iter(&self) -> DatasetIterator<'_, Self::Item>
    where
        Self: Sized,
    {
        DatasetIterator::new(self)
    }
}

//===========================================================//
//                Iter
//===========================================================//

pub struct DatasetIterator<'a, I> {
    current: usize,
    dataset: &'a dyn Dataset<Item = I>,
}

impl<'a, I> DatasetIterator<'a, I> {
    /// Creates a new dataset iterator.
    pub fn new<D>(dataset: &'a D) -> Self
    where
        D: Dataset<Item = I>,
    {
        DatasetIterator {
            current: 0,
            dataset,
        }
    }
}

impl<I> Iterator for DatasetIterator<'_, I> {
    type Item = I;

    fn next(&mut self) -> Option<I> {
        let item = self.dataset.get(self.current);
        self.current += 1;
        item
    }
}
