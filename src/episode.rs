use std::path::{Path, PathBuf};

/// Class id carried outside train mode, where global ids are unused.
pub const NO_CLASS_ID: i64 = -1;

/// Which split manifest a dataset reads. One CSV file per mode lives
/// directly under the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Val,
    Test,
}

impl Mode {
    pub fn manifest_file_name(&self) -> &'static str {
        match self {
            Self::Train => "train.csv",
            Self::Val => "val.csv",
            Self::Test => "test.csv",
        }
    }

    pub fn manifest_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.manifest_file_name())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

/// One sampled class within an episode: disjoint support/query image ids and
/// the class's label in the episode's own `0..way_num` label space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEpisode {
    pub support_ids: Vec<String>,
    pub query_ids: Vec<String>,
    /// Position of this class in the episode's draw. Consistent only within
    /// one episode; this is the classification target.
    pub episode_label: i64,
    /// Global manifest class id in train mode, [`NO_CLASS_ID`] otherwise.
    pub original_class_id: i64,
}

/// An N-way K-shot episode: exactly `way_num` sampled classes, in draw order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub classes: Vec<ClassEpisode>,
}

impl Episode {
    pub fn way_num(&self) -> usize {
        self.classes.len()
    }
}
