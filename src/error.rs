use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("manifest file not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("manifest line {line} has {fields} fields, expected `image_id,class_name`")]
    ManifestFormat { line: usize, fields: usize },

    #[error("cannot sample {way_num} classes from a manifest with {available}")]
    InsufficientClasses { way_num: usize, available: usize },

    #[error("class `{class}` has {available} images, cannot sample {shot_num} support shots")]
    InsufficientShots {
        class: String,
        shot_num: usize,
        available: usize,
    },

    #[error("manifest holds {found} classes, configuration declares {declared}")]
    ClassCountMismatch { declared: usize, found: usize },

    #[error("episode index {index} out of range for {len} episodes")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

pub type DatasetResult<T> = std::result::Result<T, DatasetError>;
