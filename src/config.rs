use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::error::MotionvizResult;

/// Default bucket/prefix of the Waymo Open Motion scenario shards.
pub const DEFAULT_BUCKET: &str = "waymo_open_dataset_motion_v_1_1_0";
pub const DEFAULT_PREFIX: &str = "uncompressed/scenario/training";

/// On-disk layout rooted at a single directory.
///
/// ```text
/// <root>/data/vid/    final animations
/// <root>/data/thumb/  thumbnail variants
/// <root>/data/status.json
/// <root>/tmp/         per-item scratch space
/// ```
#[derive(Clone, Debug)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn vid_dir(&self) -> PathBuf {
        self.data_dir().join("vid")
    }

    pub fn thumb_dir(&self) -> PathBuf {
        self.data_dir().join("thumb")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_dir().join("status.json")
    }

    /// Create every directory of the layout that does not exist yet.
    pub fn ensure_dirs(&self) -> MotionvizResult<()> {
        for dir in [
            self.data_dir(),
            self.vid_dir(),
            self.thumb_dir(),
            self.scratch_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create directory '{}'", dir.display()))?;
        }
        Ok(())
    }
}

/// Optional JSON config file; every field may be omitted and is then taken
/// from CLI flags or the built-in defaults.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> MotionvizResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config '{}'", path.display()))?;
        Ok(cfg)
    }
}
