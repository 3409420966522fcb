use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::{DatasetError, DatasetResult};

/// One class as listed in a split manifest: its name and image identifiers,
/// in the order the manifest names them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassManifestEntry {
    pub name: String,
    pub images: Vec<String>,
}

/// Immutable class index parsed from one split manifest.
///
/// Classes keep their first-seen manifest order, and each class's integer id
/// is its position in that order. The index is built once by [`load`] and
/// never mutated afterwards.
///
/// [`load`]: ManifestIndex::load
#[derive(Debug, Clone)]
pub struct ManifestIndex {
    entries: Vec<ClassManifestEntry>,
    ids: HashMap<String, usize>,
}

impl ManifestIndex {
    /// Parses a manifest file: a header row (skipped unconditionally)
    /// followed by `image_id,class_name` rows. Blank lines are tolerated.
    pub fn load<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::ManifestNotFound(path.to_path_buf()));
        }

        let f = File::open(path)?;
        let reader = BufReader::new(f);

        let mut entries: Vec<ClassManifestEntry> = Vec::new();
        let mut ids: HashMap<String, usize> = HashMap::new();

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            // header row
            if line_idx == 0 {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 2 {
                return Err(DatasetError::ManifestFormat {
                    line: line_idx + 1,
                    fields: fields.len(),
                });
            }
            let (image_id, class_name) = (fields[0], fields[1]);

            match ids.get(class_name) {
                Some(&id) => entries[id].images.push(image_id.to_owned()),
                None => {
                    ids.insert(class_name.to_owned(), entries.len());
                    entries.push(ClassManifestEntry {
                        name: class_name.to_owned(),
                        images: vec![image_id.to_owned()],
                    });
                }
            }
        }

        debug!(
            manifest = %path.display(),
            classes = entries.len(),
            "parsed split manifest"
        );

        Ok(Self { entries, ids })
    }

    /// Builds an index directly from class entries, for callers whose split
    /// listing does not come from a CSV file. Ids follow entry order.
    pub fn from_entries(entries: Vec<ClassManifestEntry>) -> Self {
        let ids = entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (entry.name.clone(), id))
            .collect();
        Self { entries, ids }
    }

    /// Class entries in first-seen order; a class's id is its index here.
    pub fn entries(&self) -> &[ClassManifestEntry] {
        &self.entries
    }

    pub fn num_classes(&self) -> usize {
        self.entries.len()
    }

    pub fn id_of(&self, class_name: &str) -> Option<usize> {
        self.ids.get(class_name).copied()
    }

    pub fn images_of(&self, class_name: &str) -> Option<&[String]> {
        self.id_of(class_name)
            .map(|id| self.entries[id].images.as_slice())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_manifest(dir: &Path, name: &str, rows: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        write!(f, "{}", rows).unwrap();
        path
    }

    #[test]
    fn parses_classes_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "train.csv",
            "filename,label\na1.png,A\nb1.png,B\na2.png,A\nc1.png,C\nb2.png,B\n",
        );

        let index = ManifestIndex::load(&path).unwrap();
        assert_eq!(index.num_classes(), 3);
        assert_eq!(index.entries()[0].name, "A");
        assert_eq!(index.entries()[1].name, "B");
        assert_eq!(index.entries()[2].name, "C");
        assert_eq!(index.id_of("A"), Some(0));
        assert_eq!(index.id_of("C"), Some(2));
        assert_eq!(index.images_of("A").unwrap(), ["a1.png", "a2.png"]);
        assert_eq!(index.images_of("B").unwrap(), ["b1.png", "b2.png"]);
        assert_eq!(index.images_of("D"), None);
    }

    #[test]
    fn header_is_skipped_even_when_it_looks_like_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "val.csv", "x.png,X\na1.png,A\n");

        let index = ManifestIndex::load(&path).unwrap();
        assert_eq!(index.num_classes(), 1);
        assert_eq!(index.entries()[0].name, "A");
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManifestIndex::load(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::ManifestNotFound(_)));
    }

    #[test]
    fn malformed_row_is_reported_with_its_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "train.csv",
            "filename,label\na1.png,A\na2.png,A,extra\n",
        );

        let err = ManifestIndex::load(&path).unwrap_err();
        match err {
            DatasetError::ManifestFormat { line, fields } => {
                assert_eq!(line, 3);
                assert_eq!(fields, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trailing_blank_line_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "test.csv", "filename,label\na1.png,A\n\n");

        let index = ManifestIndex::load(&path).unwrap();
        assert_eq!(index.images_of("A").unwrap().len(), 1);
    }

    #[test]
    fn from_entries_assigns_ids_in_order() {
        let index = ManifestIndex::from_entries(vec![
            ClassManifestEntry {
                name: "dog".into(),
                images: vec!["d1".into()],
            },
            ClassManifestEntry {
                name: "cat".into(),
                images: vec!["c1".into(), "c2".into()],
            },
        ]);
        assert_eq!(index.id_of("dog"), Some(0));
        assert_eq!(index.id_of("cat"), Some(1));
        assert_eq!(index.images_of("cat").unwrap().len(), 2);
    }
}
