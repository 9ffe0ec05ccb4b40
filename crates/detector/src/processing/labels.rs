use crate::error::{DetectorError, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Class names of the 80-category COCO dataset, in model output order.
pub const COCO_LABELS: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub id: usize,
    pub name: Arc<str>,
}

/// Ordered, immutable set of class labels. Ids are positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: Arc<[Label]>,
}

impl LabelCatalog {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = names
            .into_iter()
            .enumerate()
            .map(|(id, name)| Label {
                id,
                name: Arc::from(name.as_ref()),
            })
            .collect();
        Self { labels }
    }

    pub fn coco() -> Self {
        Self::from_names(COCO_LABELS)
    }

    /// One label per line, blank lines skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| DetectorError::LabelFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::from_names(
            contents.lines().map(str::trim).filter(|line| !line.is_empty()),
        ))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    /// Every label needs a class channel after the four box channels.
    pub fn validate(&self, output_dimension: usize) -> Result<()> {
        if self.len() + 4 > output_dimension {
            return Err(DetectorError::LabelCapacity {
                labels: self.len(),
                output_dimension,
            });
        }
        Ok(())
    }
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self::coco()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Test the default table is COCO in order
    #[test]
    fn test_default_catalog_is_coco() {
        let catalog = LabelCatalog::default();

        assert_eq!(catalog.len(), 80);
        assert_eq!(catalog.get(0).map(|l| &*l.name), Some("person"));
        assert_eq!(catalog.get(63).map(|l| &*l.name), Some("laptop"));
        assert_eq!(catalog.get(79).map(|l| &*l.name), Some("toothbrush"));
        assert!(catalog.get(80).is_none(), "Lookup past the end returns None");
    }

    /// Test custom lists get positional ids
    #[test]
    fn test_custom_labels_are_positional() {
        let catalog = LabelCatalog::from_names(["helmet", "vest", "boots"]);

        let ids: Vec<usize> = catalog.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(catalog.get(1).map(|l| &*l.name), Some("vest"));
    }

    /// Test capacity validation against the model output width
    #[test]
    fn test_validate_capacity() {
        let labels: Vec<String> = (0..77).map(|i| format!("class_{i}")).collect();
        let catalog = LabelCatalog::from_names(&labels);

        let err = catalog.validate(80).expect_err("77 + 4 > 80 must fail");
        assert!(matches!(
            err,
            DetectorError::LabelCapacity {
                labels: 77,
                output_dimension: 80
            }
        ));

        assert!(catalog.validate(81).is_ok(), "77 + 4 == 81 fits exactly");
        assert!(LabelCatalog::coco().validate(85).is_ok());
        assert!(LabelCatalog::coco().validate(84).is_ok());
        assert!(LabelCatalog::coco().validate(83).is_err());
    }

    /// Test loading a newline-separated label file
    #[test]
    fn test_from_file_skips_blank_lines() {
        let path = std::env::temp_dir().join(format!("labels_{}.txt", std::process::id()));
        {
            let mut file = fs::File::create(&path).unwrap();
            writeln!(file, "cat\n\n  dog  \r\nbird\n").unwrap();
        }

        let catalog = LabelCatalog::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        let names: Vec<&str> = catalog.iter().map(|l| &*l.name).collect();
        assert_eq!(names, vec!["cat", "dog", "bird"]);
    }

    /// Test a missing label file reports the path
    #[test]
    fn test_from_file_missing() {
        let err = LabelCatalog::from_file("/nonexistent/labels.txt").unwrap_err();
        assert!(matches!(err, DetectorError::LabelFile { .. }));
        assert!(err.is_configuration());
    }

    /// Test clones share the same backing storage
    #[test]
    fn test_clone_shares_storage() {
        let catalog = LabelCatalog::coco();
        let copy = catalog.clone();
        assert!(Arc::ptr_eq(&catalog.labels, &copy.labels));
    }
}
