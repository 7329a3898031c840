use std::path::{Path, PathBuf};

use rand::{SeedableRng as _, rngs::StdRng, seq::SliceRandom as _};

use crate::{
    config::DataLayout,
    encode_gif::{GifConfig, encode_gif},
    error::{MotionvizError, MotionvizResult},
    ledger::StatusLedger,
    remote::{RemoteItem, RemoteStore},
    render::{RenderSettings, render_animation},
    scenario::{ScenarioDecoder, ScenarioSnapshot},
    simplify::{SimplifiedScenario, simplify_scenario},
};

/// Per-item working state shared by every processor touching the item.
///
/// Download, decode and simplification each run at most once per item, on
/// first demand; later calls return the memoized result. The context is
/// rebuilt (and its scratch directory wiped) for every item, so nothing
/// leaks between items.
pub struct ItemContext<'a> {
    store: &'a dyn RemoteStore,
    decoder: &'a dyn ScenarioDecoder,
    item: &'a RemoteItem,
    scratch: PathBuf,
    downloaded: Option<PathBuf>,
    snapshot: Option<ScenarioSnapshot>,
    simplified: Option<SimplifiedScenario>,
}

impl<'a> ItemContext<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        decoder: &'a dyn ScenarioDecoder,
        item: &'a RemoteItem,
        scratch: PathBuf,
    ) -> Self {
        Self {
            store,
            decoder,
            item,
            scratch,
            downloaded: None,
            snapshot: None,
            simplified: None,
        }
    }

    pub fn item(&self) -> &RemoteItem {
        self.item
    }

    /// Path for a scratch artifact of this item.
    pub fn scratch_path(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.scratch.join(file_name)
    }

    /// Local copy of the remote object, downloading it on first call.
    pub fn downloaded(&mut self) -> MotionvizResult<&Path> {
        if self.downloaded.is_none() {
            let dest = self.scratch.join(self.item.local_name());
            let name = self.item.name.clone();
            // Inline percentage on stderr, stepped so a large file does not
            // spam the terminal.
            let mut last_pct = u64::MAX;
            let mut progress = |done: u64, total: u64| {
                if total == 0 {
                    return;
                }
                let pct = done * 100 / total;
                if last_pct == u64::MAX || pct >= last_pct + 5 || pct == 100 {
                    last_pct = pct;
                    eprint!("\r{name}: {pct}%");
                    if pct == 100 {
                        eprintln!();
                    }
                }
            };
            self.store.download(self.item, &dest, &mut progress)?;
            self.downloaded = Some(dest);
        }
        self.downloaded
            .as_deref()
            .ok_or_else(|| MotionvizError::validation("downloaded path missing after fetch"))
    }

    /// First decoded scenario of the file, decoding on first call.
    pub fn snapshot(&mut self) -> MotionvizResult<&ScenarioSnapshot> {
        if self.snapshot.is_none() {
            let path = self.downloaded()?.to_path_buf();
            let mut snapshots = self.decoder.decode(&path)?;
            if snapshots.is_empty() {
                return Err(MotionvizError::decode(format!(
                    "'{}' contains no scenario records",
                    self.item.name
                )));
            }
            // One animation per file: only the first record is visualized.
            self.snapshot = Some(snapshots.swap_remove(0));
        }
        self.snapshot
            .as_ref()
            .ok_or_else(|| MotionvizError::validation("snapshot missing after decode"))
    }

    /// Simplified geometry of the first scenario, computed on first call.
    pub fn simplified(&mut self) -> MotionvizResult<&SimplifiedScenario> {
        if self.simplified.is_none() {
            let simple = simplify_scenario(self.snapshot()?)?;
            self.simplified = Some(simple);
        }
        self.simplified
            .as_ref()
            .ok_or_else(|| MotionvizError::validation("simplified scenario missing"))
    }
}

/// One stage of per-item work. Processors are consulted up front so items
/// nobody wants are never downloaded.
pub trait Processor {
    fn name(&self) -> &str;

    /// Whether this processor still has work to do for the item. Must be
    /// cheap; it runs against the full listing.
    fn needs_processing(&self, item: &RemoteItem) -> bool;

    fn process(&mut self, ctx: &mut ItemContext<'_>) -> MotionvizResult<()>;
}

/// Renders each item's first scenario to a looping GIF plus thumbnail and
/// tracks completion in the status ledger.
pub struct VideoRenderProcessor {
    layout: DataLayout,
    ledger: StatusLedger,
    settings: RenderSettings,
}

impl VideoRenderProcessor {
    pub fn new(layout: &DataLayout) -> MotionvizResult<Self> {
        Ok(Self {
            layout: layout.clone(),
            ledger: StatusLedger::load(layout.status_path())?,
            settings: RenderSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl Processor for VideoRenderProcessor {
    fn name(&self) -> &str {
        "video-render"
    }

    fn needs_processing(&self, item: &RemoteItem) -> bool {
        !self.ledger.contains(&item.name)
    }

    fn process(&mut self, ctx: &mut ItemContext<'_>) -> MotionvizResult<()> {
        let local = ctx.item().local_name();
        let remote_name = ctx.item().name.clone();

        let frames = render_animation(ctx.simplified()?, &self.settings)?;

        // Encode into scratch first; the vid/thumb directories only ever
        // hold complete artifacts.
        let scratch_gif = ctx.scratch_path(format!("{local}.gif"));
        let scratch_thumb = ctx.scratch_path(format!("{local}.thumb.gif"));
        let cfg = GifConfig::new(&scratch_gif).with_thumb(&scratch_thumb);
        encode_gif(&frames, &cfg)?;

        let gif_name = format!("{local}.gif");
        move_into_place(&scratch_gif, &self.layout.vid_dir().join(&gif_name))?;
        move_into_place(&scratch_thumb, &self.layout.thumb_dir().join(&gif_name))?;

        self.ledger.record(remote_name);
        self.ledger.flush()?;
        Ok(())
    }
}

/// Move a finished artifact to its final path. Falls back to copy+remove
/// when rename fails (scratch and data on different filesystems).
fn move_into_place(from: &Path, to: &Path) -> MotionvizResult<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| {
        MotionvizError::validation(format!(
            "copy '{}' to '{}': {e}",
            from.display(),
            to.display()
        ))
    })?;
    std::fs::remove_file(from).map_err(|e| {
        MotionvizError::validation(format!("remove '{}': {e}", from.display()))
    })?;
    Ok(())
}

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Items in the remote listing.
    pub listed: usize,
    /// Items no processor wanted (already complete).
    pub skipped: usize,
    /// Items every interested processor finished.
    pub succeeded: usize,
    /// `(item name, error)` for items where a processor failed.
    pub failed: Vec<(String, String)>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineOptions {
    /// Visit pending items in random order instead of listing order.
    pub shuffle: bool,
}

/// List the remote store and run every interested processor over each
/// pending item. A failing item is logged, counted and skipped; it never
/// aborts the run.
pub fn run_pipeline(
    store: &dyn RemoteStore,
    decoder: &dyn ScenarioDecoder,
    layout: &DataLayout,
    processors: &mut [Box<dyn Processor>],
    options: PipelineOptions,
) -> MotionvizResult<RunSummary> {
    layout.ensure_dirs()?;

    let items = store.list()?;
    let mut summary = RunSummary {
        listed: items.len(),
        ..RunSummary::default()
    };

    let mut pending: Vec<&RemoteItem> = items
        .iter()
        .filter(|item| processors.iter().any(|p| p.needs_processing(item)))
        .collect();
    summary.skipped = summary.listed - pending.len();

    if options.shuffle {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        pending.shuffle(&mut StdRng::seed_from_u64(seed));
    }

    tracing::info!(
        listed = summary.listed,
        pending = pending.len(),
        "starting pipeline run"
    );

    let scratch = layout.scratch_dir();
    for item in pending {
        reset_scratch(&scratch)?;

        let mut ctx = ItemContext::new(store, decoder, item, scratch.clone());
        let result = processors
            .iter_mut()
            .filter(|p| p.needs_processing(item))
            .try_for_each(|p| {
                tracing::info!(item = %item.name, processor = p.name(), "processing");
                p.process(&mut ctx)
            });

        match result {
            Ok(()) => summary.succeeded += 1,
            Err(err) => {
                tracing::error!(item = %item.name, error = %err, "item failed");
                summary.failed.push((item.name.clone(), err.to_string()));
            }
        }
    }

    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        skipped = summary.skipped,
        "pipeline run finished"
    );
    Ok(summary)
}

fn reset_scratch(scratch: &Path) -> MotionvizResult<()> {
    if scratch.exists() {
        std::fs::remove_dir_all(scratch).map_err(|e| {
            MotionvizError::validation(format!("clear scratch '{}': {e}", scratch.display()))
        })?;
    }
    std::fs::create_dir_all(scratch).map_err(|e| {
        MotionvizError::validation(format!("create scratch '{}': {e}", scratch.display()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::scenario::{ObjectTrack, ObjectType, TrackState};

    struct FakeStore {
        items: Vec<RemoteItem>,
        downloads: RefCell<Vec<String>>,
    }

    impl FakeStore {
        fn new(names: &[&str]) -> Self {
            Self {
                items: names
                    .iter()
                    .map(|n| RemoteItem {
                        name: (*n).to_string(),
                        size: 4,
                    })
                    .collect(),
                downloads: RefCell::new(Vec::new()),
            }
        }
    }

    impl RemoteStore for FakeStore {
        fn list(&self) -> MotionvizResult<Vec<RemoteItem>> {
            Ok(self.items.clone())
        }

        fn download(
            &self,
            item: &RemoteItem,
            dest: &Path,
            progress: crate::remote::ProgressFn<'_>,
        ) -> MotionvizResult<()> {
            self.downloads.borrow_mut().push(item.name.clone());
            std::fs::write(dest, b"blob").map_err(|e| MotionvizError::remote(e.to_string()))?;
            progress(4, item.size);
            Ok(())
        }
    }

    fn moving_snapshot() -> ScenarioSnapshot {
        let states = (0..3)
            .map(|i| TrackState {
                x: f64::from(i),
                y: 0.0,
                valid: true,
            })
            .collect();
        ScenarioSnapshot {
            scenario_id: "s".to_string(),
            map_features: vec![],
            tracks: vec![ObjectTrack {
                id: 1,
                object_type: ObjectType::Vehicle,
                states,
            }],
        }
    }

    struct FakeDecoder {
        decodes: RefCell<usize>,
        fail_for: Option<String>,
    }

    impl FakeDecoder {
        fn new() -> Self {
            Self {
                decodes: RefCell::new(0),
                fail_for: None,
            }
        }
    }

    impl ScenarioDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> MotionvizResult<Vec<ScenarioSnapshot>> {
            *self.decodes.borrow_mut() += 1;
            if let Some(bad) = &self.fail_for {
                let local = bad.replace('/', "_");
                if path.file_name().is_some_and(|n| n == local.as_str()) {
                    return Err(MotionvizError::decode("corrupt record"));
                }
            }
            Ok(vec![moving_snapshot()])
        }
    }

    fn small_settings() -> RenderSettings {
        RenderSettings {
            size_px: 32,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn item_context_memoizes_every_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FakeStore::new(&["a"]);
        let decoder = FakeDecoder::new();
        let item = store.items[0].clone();

        let mut ctx = ItemContext::new(&store, &decoder, &item, tmp.path().to_path_buf());
        ctx.downloaded().unwrap();
        ctx.downloaded().unwrap();
        ctx.snapshot().unwrap();
        assert_eq!(ctx.simplified().unwrap().frame_count(), 3);
        ctx.simplified().unwrap();

        assert_eq!(store.downloads.borrow().len(), 1);
        assert_eq!(*decoder.decodes.borrow(), 1);
    }

    #[test]
    fn completed_items_are_never_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();

        let mut ledger = StatusLedger::load(layout.status_path()).unwrap();
        ledger.record("done");
        ledger.flush().unwrap();

        let store = FakeStore::new(&["done", "todo"]);
        let decoder = FakeDecoder::new();
        let mut processors: Vec<Box<dyn Processor>> = vec![Box::new(
            VideoRenderProcessor::new(&layout)
                .unwrap()
                .with_settings(small_settings()),
        )];

        let summary = run_pipeline(
            &store,
            &decoder,
            &layout,
            &mut processors,
            PipelineOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.listed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 1);
        assert!(summary.failed.is_empty());
        assert_eq!(*store.downloads.borrow(), vec!["todo".to_string()]);
        assert!(layout.vid_dir().join("todo.gif").is_file());
        assert!(layout.thumb_dir().join("todo.gif").is_file());
    }

    #[test]
    fn one_bad_item_does_not_abort_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();

        let store = FakeStore::new(&["good-1", "bad", "good-2"]);
        let mut decoder = FakeDecoder::new();
        decoder.fail_for = Some("bad".to_string());

        let mut processors: Vec<Box<dyn Processor>> = vec![Box::new(
            VideoRenderProcessor::new(&layout)
                .unwrap()
                .with_settings(small_settings()),
        )];

        let summary = run_pipeline(
            &store,
            &decoder,
            &layout,
            &mut processors,
            PipelineOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "bad");
        assert!(layout.vid_dir().join("good-1.gif").is_file());
        assert!(layout.vid_dir().join("good-2.gif").is_file());
        assert!(!layout.vid_dir().join("bad.gif").exists());

        // The ledger only records the successes.
        let ledger = StatusLedger::load(layout.status_path()).unwrap();
        assert!(ledger.contains("good-1"));
        assert!(ledger.contains("good-2"));
        assert!(!ledger.contains("bad"));
    }

    #[test]
    fn move_into_place_copies_across_failed_rename() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("a.gif");
        let to = tmp.path().join("nested/b.gif");
        std::fs::write(&from, b"gif").unwrap();
        std::fs::create_dir_all(to.parent().unwrap()).unwrap();
        move_into_place(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"gif");
    }
}
